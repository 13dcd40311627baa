//! Events produced by ticket mutations and the sweep.
//!
//! Events are never stored. They are handed to the rule evaluator within the
//! same operation that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Task, Ticket, TicketStatus};
use crate::features::automation::TriggerType;

/// Which SLA clock an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaClock {
    Response,
    Resolution,
}

impl SlaClock {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Resolution => "resolution",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TicketCreated,
    TicketUpdated,
    StatusChanged { from: TicketStatus, to: TicketStatus },
    SlaBreach { clock: SlaClock },
    Scheduled,
    TaskDue,
}

impl EventKind {
    /// The rule trigger type this event activates.
    #[must_use]
    pub const fn trigger_type(&self) -> TriggerType {
        match self {
            Self::TicketCreated => TriggerType::TicketCreated,
            Self::TicketUpdated => TriggerType::TicketUpdated,
            Self::StatusChanged { .. } => TriggerType::StatusChanged,
            Self::SlaBreach { .. } => TriggerType::SlaBreach,
            Self::Scheduled => TriggerType::Scheduled,
            Self::TaskDue => TriggerType::TaskDue,
        }
    }
}

/// A ticket or task event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Ticket state after the mutation
    pub ticket: Option<Ticket>,
    /// Ticket state before the mutation; `None` on creation
    pub previous: Option<Ticket>,
    /// The task, for `task_due`
    pub task: Option<Task>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn created(ticket: Ticket, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::TicketCreated,
            ticket: Some(ticket),
            previous: None,
            task: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn updated(ticket: Ticket, previous: Ticket, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::TicketUpdated,
            ticket: Some(ticket),
            previous: Some(previous),
            task: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn status_changed(ticket: Ticket, previous: Ticket, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::StatusChanged {
                from: previous.status,
                to: ticket.status,
            },
            ticket: Some(ticket),
            previous: Some(previous),
            task: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn sla_breach(
        clock: SlaClock,
        ticket: Ticket,
        previous: Ticket,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EventKind::SlaBreach { clock },
            ticket: Some(ticket),
            previous: Some(previous),
            task: None,
            timestamp,
        }
    }

    /// Context for a scheduled rule scanning one ticket.
    #[must_use]
    pub fn scheduled(ticket: Ticket, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Scheduled,
            ticket: Some(ticket),
            previous: None,
            task: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn task_due(task: Task, ticket: Option<Ticket>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::TaskDue,
            ticket,
            previous: None,
            task: Some(task),
            timestamp,
        }
    }

    #[must_use]
    pub fn ticket_id(&self) -> Option<i64> {
        self.ticket.as_ref().map(|t| t.id)
    }

    #[must_use]
    pub fn task_id(&self) -> Option<i64> {
        self.task.as_ref().map(|t| t.id)
    }
}
