use serde::{Deserialize, Serialize};

use super::action::Action;

/// Declarative filter over the event stream plus an optional action.
///
/// Either `custom_statement` holds a full query, or the three patterns and the
/// condition are spliced into one. A match without `action` raises an alarm.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub resource_uri: Option<String>,
    #[serde(default)]
    pub resource_type_uri: Option<String>,
    #[serde(default)]
    pub metric_uri: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub custom_statement: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_resource_uri(mut self, pattern: &str) -> Self {
        self.resource_uri = Some(pattern.to_string());
        self
    }

    pub fn with_resource_type_uri(mut self, pattern: &str) -> Self {
        self.resource_type_uri = Some(pattern.to_string());
        self
    }

    pub fn with_metric_uri(mut self, pattern: &str) -> Self {
        self.metric_uri = Some(pattern.to_string());
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn with_custom_statement(mut self, statement: &str) -> Self {
        self.custom_statement = Some(statement.to_string());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }
}
