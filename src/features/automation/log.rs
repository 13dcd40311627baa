//! Automation log entries.
//!
//! One entry is written per executed rule, whatever the outcome. Entries are
//! append-only.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeskError;

/// What an action ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    Ticket(i64),
    Task(i64),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(id) => write!(f, "ticket:{id}"),
            Self::Task(id) => write!(f, "task:{id}"),
        }
    }
}

/// Outcome of one rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failed,
    /// The action would not have changed anything
    Skipped,
}

impl LogStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(DeskError::Parse(format!("unknown log status: {s}"))),
        }
    }
}

/// A record of one rule execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationLog {
    /// Set once stored
    pub id: Option<i64>,
    pub rule_id: i64,
    pub ticket_id: Option<i64>,
    pub task_id: Option<i64>,
    pub status: LogStatus,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AutomationLog {
    fn new(rule_id: i64, status: LogStatus, message: String, at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            rule_id,
            ticket_id: None,
            task_id: None,
            status,
            message,
            metadata: Value::Object(serde_json::Map::new()),
            created_at: at,
        }
    }

    #[must_use]
    pub fn success(rule_id: i64, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(rule_id, LogStatus::Success, message.into(), at)
    }

    #[must_use]
    pub fn failed(rule_id: i64, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(rule_id, LogStatus::Failed, message.into(), at)
    }

    #[must_use]
    pub fn skipped(rule_id: i64, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(rule_id, LogStatus::Skipped, message.into(), at)
    }

    /// Record what the action ran against.
    ///
    /// Task targets keep the ticket they belong to.
    #[must_use]
    pub fn for_target(mut self, target: Target, ticket_id: Option<i64>) -> Self {
        match target {
            Target::Ticket(id) => self.ticket_id = Some(id),
            Target::Task(id) => {
                self.task_id = Some(id);
                self.ticket_id = ticket_id;
            }
        }
        self
    }

    /// Replace the metadata object.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, LogStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let log = AutomationLog::success(3, "tagged", at)
            .for_target(Target::Ticket(7), None)
            .with_metadata(json!({"tag": "vip"}));

        assert!(log.is_success());
        assert_eq!(log.ticket_id, Some(7));
        assert_eq!(log.task_id, None);
        assert_eq!(log.metadata["tag"], "vip");

        let log = AutomationLog::failed(3, "boom", at).for_target(Target::Task(2), Some(7));
        assert_eq!(log.status, LogStatus::Failed);
        assert_eq!(log.task_id, Some(2));
        assert_eq!(log.ticket_id, Some(7));
    }

    #[test]
    fn test_status_parse() {
        for status in [LogStatus::Success, LogStatus::Failed, LogStatus::Skipped] {
            assert_eq!(status.as_str().parse::<LogStatus>().unwrap(), status);
        }
        assert!("meh".parse::<LogStatus>().is_err());
    }
}
