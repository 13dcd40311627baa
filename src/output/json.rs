//! JSON output formatting for deskflow.

use serde::Serialize;
use serde_json::json;

use crate::error::DeskError;
use crate::features::automation::{AutomationLog, Rule};
use crate::features::sla::SlaProfile;
use crate::storage::Agent;
use crate::tickets::{HistoryRecord, Task, Ticket};

/// Format any list as a `{count, items}` object.
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_list_json<T: Serialize>(items: &[T]) -> Result<String, DeskError> {
    let output = json!({
        "count": items.len(),
        "items": items
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format tickets as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_tickets_json(tickets: &[Ticket]) -> Result<String, DeskError> {
    format_list_json(tickets)
}

/// Format a ticket with its history as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_ticket_json(ticket: &Ticket, history: &[HistoryRecord]) -> Result<String, DeskError> {
    let output = json!({
        "ticket": ticket,
        "history": history
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format automation logs as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_logs_json(logs: &[AutomationLog]) -> Result<String, DeskError> {
    format_list_json(logs)
}

/// Format rules as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_rules_json(rules: &[Rule]) -> Result<String, DeskError> {
    format_list_json(rules)
}

/// Format SLA profiles as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_profiles_json(profiles: &[SlaProfile]) -> Result<String, DeskError> {
    format_list_json(profiles)
}

/// Format tasks as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_tasks_json(tasks: &[Task]) -> Result<String, DeskError> {
    format_list_json(tasks)
}

/// Format agents as JSON
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_agents_json(agents: &[Agent]) -> Result<String, DeskError> {
    format_list_json(agents)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, DeskError> {
    Ok(serde_json::to_string_pretty(value)?)
}
