use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(query: impl Into<String>) -> Self {
        Self::at(query, Utc::now())
    }

    pub fn at(query: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            timestamp,
        }
    }
}
