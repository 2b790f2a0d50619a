use serde::{Deserialize, Serialize};

use crate::core::{ChangeRecord, Tier};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    pub tool_version: String,
    pub timestamp: String,
    pub os_type: String,
    pub tier: Tier,
    pub changes: Vec<ChangeRecord>,
}

impl RunReport {
    pub fn new(timestamp: String, os_type: String, tier: Tier, changes: Vec<ChangeRecord>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            os_type,
            tier,
            changes,
        }
    }
}
