//! Deferred mutations one person schedules onto another.
//!
//! Effects are plain values so policies and tests can inspect them; the
//! `Custom` variant keeps an escape hatch for one-off mutations.

use crate::error::SimError;
use crate::person::Person;
use chrono::{DateTime, Utc};
use matrix_env::PersonId;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Operation applied to a bounded attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectOp {
    /// Replace the value (clamped)
    Set(f64),
    /// Add a delta to the value (clamped)
    Move(f64),
}

/// A mutation of a person's state.
#[derive(Clone)]
pub enum Effect {
    /// Mutate a named bounded attribute
    Attribute { name: String, op: EffectOp },

    /// Write a key into the policy memory
    Remember { key: String, value: Value },

    /// Arbitrary mutation, labelled for logs
    Custom {
        label: String,
        apply: Rc<dyn Fn(&mut Person) -> Result<(), SimError>>,
    },
}

impl Effect {
    pub fn set(name: impl Into<String>, value: f64) -> Self {
        Effect::Attribute {
            name: name.into(),
            op: EffectOp::Set(value),
        }
    }

    pub fn shift(name: impl Into<String>, delta: f64) -> Self {
        Effect::Attribute {
            name: name.into(),
            op: EffectOp::Move(delta),
        }
    }

    pub fn remember(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Effect::Remember {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn custom<F>(label: impl Into<String>, apply: F) -> Self
    where
        F: Fn(&mut Person) -> Result<(), SimError> + 'static,
    {
        Effect::Custom {
            label: label.into(),
            apply: Rc::new(apply),
        }
    }

    /// Applies the effect to `person`.
    ///
    /// Unknown attributes are an error: the policy addressed state that was never declared.
    pub fn apply(&self, person: &mut Person) -> Result<(), SimError> {
        match self {
            Effect::Attribute { name, op } => {
                let attribute = person
                    .attribute_mut(name)
                    .ok_or_else(|| SimError::UnknownAttribute(name.clone()))?;
                match op {
                    EffectOp::Set(value) => attribute.set(*value),
                    EffectOp::Move(delta) => attribute.shift(*delta),
                }
                Ok(())
            }
            Effect::Remember { key, value } => {
                person.remember(key.clone(), value.clone());
                Ok(())
            }
            Effect::Custom { apply, .. } => apply(person),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Attribute { name, op } => f
                .debug_struct("Attribute")
                .field("name", name)
                .field("op", op)
                .finish(),
            Effect::Remember { key, value } => f
                .debug_struct("Remember")
                .field("key", key)
                .field("value", value)
                .finish(),
            Effect::Custom { label, .. } => f.debug_struct("Custom").field("label", label).finish(),
        }
    }
}

/// An effect waiting in a person's queue.
#[derive(Debug, Clone)]
pub struct ScheduledEffect {
    pub at: DateTime<Utc>,
    pub effect: Effect,
}

/// Addressee of an outgoing effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTarget {
    /// Every amenable neighbor of the source in its cluster
    Neighbors,
    /// A single person, if still amenable
    Person(PersonId),
}

/// An effect a running person addressed to others, delivered after its turn.
#[derive(Debug, Clone)]
pub struct OutgoingEffect {
    pub target: EffectTarget,
    pub at: DateTime<Utc>,
    pub effect: Effect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_person;
    use crate::Bounded;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_attribute_effects_clamp() {
        let mut person = test_person(1);
        person.declare_attribute("need", Bounded::unit(0.5));

        Effect::shift("need", 0.9).apply(&mut person).unwrap();
        assert_relative_eq!(person.attribute("need").unwrap(), 1.0);

        Effect::set("need", -3.0).apply(&mut person).unwrap();
        assert_relative_eq!(person.attribute("need").unwrap(), 0.0);
    }

    #[test]
    fn test_unknown_attribute_is_error() {
        let mut person = test_person(1);
        let result = Effect::shift("missing", 0.1).apply(&mut person);
        assert!(matches!(result, Err(SimError::UnknownAttribute(name)) if name == "missing"));
    }

    #[test]
    fn test_remember_and_custom() {
        let mut person = test_person(1);
        Effect::remember("file", "abc").apply(&mut person).unwrap();
        assert_eq!(person.memory("file"), Some(&json!("abc")));

        let effect = Effect::custom("forget", |person: &mut Person| {
            person.forget("file");
            Ok(())
        });
        assert_eq!(format!("{:?}", effect), "Custom { label: \"forget\" }");
        effect.apply(&mut person).unwrap();
        assert!(person.memory("file").is_none());
    }
}
