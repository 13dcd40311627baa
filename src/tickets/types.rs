//! Ticket and task types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// Ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Pending,
        Self::InProgress,
        Self::Waiting,
        Self::Resolved,
        Self::Closed,
    ];

    /// Stable name used in storage and rule conditions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Resolved or closed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Still being worked on.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DeskError::Parse(format!("unknown ticket status: {s}")))
    }
}

/// Ticket priority, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Numeric rank used for ordering comparisons in rule conditions.
    #[must_use]
    pub const fn rank(&self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// One step up, saturating at critical.
    #[must_use]
    pub const fn raised(&self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| DeskError::Parse(format!("unknown priority: {s}")))
    }
}

/// A helpdesk ticket with its SLA state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    /// Human-facing number, monotonic and never reused
    pub ticket_number: i64,
    pub title: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub organization_id: Option<String>,
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub sla_profile_id: Option<i64>,
    pub sla_response_due: Option<DateTime<Utc>>,
    pub sla_resolution_due: Option<DateTime<Utc>>,
    pub sla_response_met: Option<bool>,
    pub sla_resolution_met: Option<bool>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by every save
    #[serde(default)]
    pub version: i64,
}

impl Ticket {
    /// A fresh, unsaved ticket. Storage assigns `id` and `ticket_number`.
    #[must_use]
    pub fn new(title: impl Into<String>, priority: Priority, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            ticket_number: 0,
            title: title.into(),
            status: TicketStatus::Open,
            priority,
            organization_id: None,
            assignee_id: None,
            tags: Vec::new(),
            sla_profile_id: None,
            sla_response_due: None,
            sla_resolution_due: None,
            sla_response_met: None,
            sla_resolution_met: None,
            first_response_at: None,
            resolved_at: None,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether either SLA clock is still undecided.
    #[must_use]
    pub const fn has_open_sla(&self) -> bool {
        (self.sla_response_due.is_some() && self.sla_response_met.is_none())
            || (self.sla_resolution_due.is_some() && self.sla_resolution_met.is_none())
    }
}

/// Input for creating a ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    pub organization_id: Option<String>,
    pub assignee_id: Option<String>,
    /// Explicit profile; the default profile is used when absent or unknown
    pub sla_profile_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(DeskError::Parse(format!("unknown task status: {other}"))),
        }
    }
}

/// A unit of work, optionally linked to a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub ticket_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// Set once a `task_due` event has been emitted
    pub due_notified: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Whether the task is past due and has not been announced yet.
    #[must_use]
    pub fn is_newly_due(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done
            && !self.due_notified
            && self.due_at.is_some_and(|due| due <= now)
    }
}
