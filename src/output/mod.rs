//! Output formatting for deskflow.
//!
//! This module provides formatters for displaying desk data in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::desk::{SweepReport, TicketOutcome};
use crate::error::DeskError;
use crate::features::automation::{AutomationLog, Rule};
use crate::features::sla::SlaProfile;
use crate::storage::Agent;
use crate::tickets::{HistoryRecord, Task, Ticket};

pub use json::*;
pub use pretty::*;

/// Format tickets based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_tickets(tickets: &[Ticket], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_tickets_pretty(tickets)),
        OutputFormat::Json => format_tickets_json(tickets),
    }
}

/// Format a ticket and its history based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_ticket(
    ticket: &Ticket,
    history: &[HistoryRecord],
    format: OutputFormat,
) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => {
            let mut output = format_ticket_pretty(ticket);
            if !history.is_empty() {
                output.push('\n');
                output.push_str(&format_history_pretty(history));
            }
            Ok(output)
        }
        OutputFormat::Json => format_ticket_json(ticket, history),
    }
}

/// Format the result of a ticket operation based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_outcome(outcome: &TicketOutcome, format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_outcome_pretty(outcome)),
        OutputFormat::Json => to_json(outcome),
    }
}

/// Format ticket history based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_history(records: &[HistoryRecord], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_history_pretty(records)),
        OutputFormat::Json => format_list_json(records),
    }
}

/// Format SLA profiles based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_profiles(profiles: &[SlaProfile], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_profiles_pretty(profiles)),
        OutputFormat::Json => format_profiles_json(profiles),
    }
}

/// Format automation rules based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_rules(rules: &[Rule], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_rules_pretty(rules)),
        OutputFormat::Json => format_rules_json(rules),
    }
}

/// Format automation logs based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_logs(logs: &[AutomationLog], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_logs_pretty(logs)),
        OutputFormat::Json => format_logs_json(logs),
    }
}

/// Format tasks based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_tasks(tasks: &[Task], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_tasks_pretty(tasks)),
        OutputFormat::Json => format_tasks_json(tasks),
    }
}

/// Format agents based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_agents(agents: &[Agent], format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_agents_pretty(agents)),
        OutputFormat::Json => format_agents_json(agents),
    }
}

/// Format a sweep report based on output format
///
/// # Errors
///
/// Returns `DeskError::Parse` if JSON serialization fails.
pub fn format_sweep(report: &SweepReport, format: OutputFormat) -> Result<String, DeskError> {
    match format {
        OutputFormat::Pretty => Ok(format_sweep_pretty(report)),
        OutputFormat::Json => to_json(report),
    }
}
