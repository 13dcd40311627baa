//! Ticket audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Ticket;

/// Who made a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    User,
    Rule(i64),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User => f.write_str("user"),
            Self::Rule(id) => write!(f, "rule:{id}"),
        }
    }
}

/// One changed field on a ticket. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Option<i64>,
    pub ticket_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub fn new(
        ticket_id: i64,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
        actor: Actor,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            ticket_id,
            field: field.into(),
            old_value,
            new_value,
            actor: actor.to_string(),
            created_at,
        }
    }

    /// Records for every tracked field that differs between two states.
    #[must_use]
    pub fn diff(before: &Ticket, after: &Ticket, actor: Actor, at: DateTime<Utc>) -> Vec<Self> {
        let fields: [(&str, Option<String>, Option<String>); 12] = [
            ("status", Some(before.status.to_string()), Some(after.status.to_string())),
            ("priority", Some(before.priority.to_string()), Some(after.priority.to_string())),
            ("assignee_id", before.assignee_id.clone(), after.assignee_id.clone()),
            ("tags", join_tags(&before.tags), join_tags(&after.tags)),
            ("sla_profile_id", before.sla_profile_id.map(|v| v.to_string()), after.sla_profile_id.map(|v| v.to_string())),
            ("sla_response_due", before.sla_response_due.map(|v| v.to_rfc3339()), after.sla_response_due.map(|v| v.to_rfc3339())),
            ("sla_resolution_due", before.sla_resolution_due.map(|v| v.to_rfc3339()), after.sla_resolution_due.map(|v| v.to_rfc3339())),
            ("sla_response_met", before.sla_response_met.map(|v| v.to_string()), after.sla_response_met.map(|v| v.to_string())),
            ("sla_resolution_met", before.sla_resolution_met.map(|v| v.to_string()), after.sla_resolution_met.map(|v| v.to_string())),
            ("first_response_at", before.first_response_at.map(|v| v.to_rfc3339()), after.first_response_at.map(|v| v.to_rfc3339())),
            ("resolved_at", before.resolved_at.map(|v| v.to_rfc3339()), after.resolved_at.map(|v| v.to_rfc3339())),
            ("title", Some(before.title.clone()), Some(after.title.clone())),
        ];

        fields
            .into_iter()
            .filter(|(_, old, new)| old != new)
            .map(|(field, old, new)| Self::new(after.id, field, old, new, actor, at))
            .collect()
    }
}

fn join_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        let mut sorted = tags.to_vec();
        sorted.sort();
        Some(sorted.join(","))
    }
}
