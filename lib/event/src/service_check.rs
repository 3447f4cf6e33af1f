use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Tags;

/// Status values understood by the agent, numeric values match the
/// agent's own enum.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ServiceCheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl fmt::Display for ServiceCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceCheckStatus::Ok => "OK",
            ServiceCheckStatus::Warning => "WARNING",
            ServiceCheckStatus::Critical => "CRITICAL",
            ServiceCheckStatus::Unknown => "UNKNOWN",
        };

        f.write_str(s)
    }
}

/// A health signal, distinct from numeric metrics.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ServiceCheck {
    pub name: String,

    pub status: ServiceCheckStatus,

    pub tags: Tags,

    /// Empty unless the status needs explaining.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ServiceCheck {
    pub fn new(
        name: impl Into<String>,
        status: ServiceCheckStatus,
        tags: Tags,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            tags,
            message: message.into(),
            timestamp: None,
        }
    }

    #[inline]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
