use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Corrective action requested by a rule or a decision maker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_uri: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Action {
    pub fn new(action_uri: &str) -> Self {
        Self {
            action_uri: action_uri.to_string(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }
}

/// Outcome of one executed action, published to execution listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExecution {
    pub request_id: Uuid,
    pub action: Action,
    pub success: bool,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
