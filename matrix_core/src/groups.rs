//! Matrix-wide group property store.

use matrix_env::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Group state keyed by group type, then group key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStore {
    groups: BTreeMap<String, BTreeMap<String, Properties>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `properties` into the group, keeping keys the update does not mention.
    pub fn update(&mut self, group_type: &str, group_key: &str, properties: &Properties) {
        let group = self
            .groups
            .entry(group_type.to_string())
            .or_default()
            .entry(group_key.to_string())
            .or_default();
        group.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn get(&self, group_type: &str, group_key: &str) -> Option<&Properties> {
        self.groups.get(group_type)?.get(group_key)
    }

    /// Iterates `(group type, group key, properties)` in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Properties)> {
        self.groups.iter().flat_map(|(group_type, keys)| {
            keys.iter()
                .map(move |(group_key, properties)| (group_type.as_str(), group_key.as_str(), properties))
        })
    }

    /// Number of distinct groups across all types.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_update_is_non_destructive() {
        let mut store = GroupStore::new();
        store.update("account", "a1", &props(json!({"name": "Acme", "plan": "free"})));
        store.update("account", "a1", &props(json!({"plan": "pro"})));

        assert_eq!(
            store.get("account", "a1"),
            Some(&props(json!({"name": "Acme", "plan": "pro"})))
        );
    }

    #[test]
    fn test_len_and_iter() {
        let mut store = GroupStore::new();
        assert!(store.is_empty());
        store.update("account", "b", &Properties::new());
        store.update("account", "a", &Properties::new());
        store.update("project", "p", &Properties::new());

        assert_eq!(store.len(), 3);
        let keys: Vec<_> = store.iter().map(|(t, k, _)| format!("{}/{}", t, k)).collect();
        assert_eq!(keys, vec!["account/a", "account/b", "project/p"]);
        assert!(store.get("account", "missing").is_none());
    }
}
