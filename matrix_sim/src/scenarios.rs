//! Scenario catalogue.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// One pageview a week, every week
    Weekly,

    /// File-sharing SaaS with signups, teams, plans and a signup page experiment
    Hedgebox,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::Weekly, ScenarioId::Hedgebox]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Weekly => "weekly",
            ScenarioId::Hedgebox => "hedgebox",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Weekly => "Reference policy: every person views one page once a week",
            ScenarioId::Hedgebox => "Hedgebox online drive: personal users, company teams, plan changes",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" | "weekly_pageviews" => Ok(ScenarioId::Weekly),
            "hedgebox" => Ok(ScenarioId::Hedgebox),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert!(!scenario.description().is_empty());
        }
        assert_eq!("HedgeBox".parse::<ScenarioId>(), Ok(ScenarioId::Hedgebox));
    }

    #[test]
    fn test_unknown_scenario() {
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
