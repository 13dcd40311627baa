//! Storage layer for deskflow.
//!
//! The engine talks to persistence only through [`Storage`]. [`Database`] is
//! the SQLite implementation, holding:
//! - SLA profiles and agents
//! - Tickets, tags and their audit history
//! - Tasks
//! - Automation rules and their append-only logs

mod database;
mod migrations;

use chrono::{DateTime, Utc};

pub use database::{Agent, Database};

use crate::error::DeskError;
use crate::features::automation::{AutomationLog, Rule};
use crate::features::sla::SlaProfile;
use crate::tickets::{HistoryRecord, Task, Ticket};

/// Persistence operations the engine needs.
pub trait Storage: Send + Sync {
    /// Load a ticket with its tags.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if there is no such ticket.
    fn load_ticket(&self, id: i64) -> Result<Ticket, DeskError>;

    /// Insert a new ticket, assigning `id`, `ticket_number` and `version`.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn insert_ticket(&self, ticket: &mut Ticket) -> Result<(), DeskError>;

    /// Save a ticket and its history records in one transaction.
    ///
    /// The write only succeeds if the stored version still equals
    /// `ticket.version`; the version is then bumped.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Conflict` if another writer saved first.
    fn save_ticket(&self, ticket: &mut Ticket, history: &[HistoryRecord]) -> Result<(), DeskError>;

    /// All tickets, or only those not resolved or closed.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn list_tickets(&self, active_only: bool) -> Result<Vec<Ticket>, DeskError>;

    /// Active rules in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn load_active_rules(&self) -> Result<Vec<Rule>, DeskError>;

    /// Move a rule's `last_run_at` from `expected` to `now`.
    ///
    /// Returns false if someone else claimed the window first.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn claim_rule_window(
        &self,
        rule_id: i64,
        expected: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn append_history(&self, records: &[HistoryRecord]) -> Result<(), DeskError>;

    /// Append a log entry and set its id.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn append_automation_log(&self, log: &mut AutomationLog) -> Result<(), DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn load_sla_profile(&self, id: i64) -> Result<Option<SlaProfile>, DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn default_sla_profile(&self) -> Result<Option<SlaProfile>, DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn agent_exists(&self, agent_id: &str) -> Result<bool, DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if there is no such task.
    fn load_task(&self, id: i64) -> Result<Task, DeskError>;

    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn save_task(&self, task: &Task) -> Result<(), DeskError>;

    /// Open tasks past due that have not been announced.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, DeskError>;

    /// Flag a task as announced. Returns false if it already was.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Database` on failure.
    fn mark_task_notified(&self, task_id: i64) -> Result<bool, DeskError>;
}
