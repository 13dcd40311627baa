//! Ticket and task command implementations.

use chrono::{Duration, Utc};
use colored::Colorize;

use super::AppContext;
use crate::cli::args::{OutputFormat, TaskCommands, TicketCommands};
use crate::core::{TaskCreator, TaskSpec};
use crate::error::DeskError;
use crate::output::{format_history, format_outcome, format_ticket, format_tickets, format_tasks, to_json};
use crate::storage::Storage;
use crate::tickets::NewTicket;

/// Execute ticket subcommands.
///
/// # Errors
///
/// Returns an error if the operation is rejected or the database fails.
pub fn ticket(ctx: &AppContext, cmd: TicketCommands, format: OutputFormat) -> Result<String, DeskError> {
    match cmd {
        TicketCommands::Create {
            title,
            priority,
            profile,
            assignee,
            org,
            tags,
        } => {
            let outcome = ctx.desk()?.create_ticket(NewTicket {
                title,
                priority,
                organization_id: org,
                assignee_id: assignee,
                sla_profile_id: profile,
                tags,
            })?;
            format_outcome(&outcome, format)
        }
        TicketCommands::List { all } => format_tickets(&ctx.database.list_tickets(!all)?, format),
        TicketCommands::Show { id } => {
            let ticket = ctx.database.load_ticket(id)?;
            let history = ctx.database.ticket_history(id)?;
            format_ticket(&ticket, &history, format)
        }
        TicketCommands::Status { id, status } => {
            format_outcome(&ctx.desk()?.change_status(id, status)?, format)
        }
        TicketCommands::Priority { id, priority } => {
            format_outcome(&ctx.desk()?.change_priority(id, priority)?, format)
        }
        TicketCommands::Respond { id } => {
            format_outcome(&ctx.desk()?.mark_first_response(id)?, format)
        }
        TicketCommands::Reassign { id, profile } => {
            format_outcome(&ctx.desk()?.reassign_sla_profile(id, profile)?, format)
        }
        TicketCommands::History { id } => {
            // Fail on unknown tickets instead of printing an empty trail
            ctx.database.load_ticket(id)?;
            format_history(&ctx.database.ticket_history(id)?, format)
        }
    }
}

/// Execute task subcommands.
///
/// # Errors
///
/// Returns an error if the linked ticket or assignee is unknown, or the
/// database fails.
pub fn task(ctx: &AppContext, cmd: TaskCommands, format: OutputFormat) -> Result<String, DeskError> {
    match cmd {
        TaskCommands::Add {
            title,
            ticket,
            priority,
            assignee,
            due_in,
            description,
        } => {
            if title.trim().is_empty() {
                return Err(DeskError::InvalidArgument("task title must not be empty".to_string()));
            }
            if let Some(id) = ticket {
                ctx.database.load_ticket(id)?;
            }
            if let Some(agent) = &assignee {
                if !ctx.database.agent_exists(agent)? {
                    return Err(DeskError::InvalidArgument(format!("unknown assignee '{agent}'")));
                }
            }

            let now = Utc::now();
            let spec = TaskSpec {
                ticket_id: ticket,
                title,
                description,
                priority,
                assignee_id: assignee,
                due_at: due_in.map(|m| now + Duration::minutes(m)),
            };
            let id = ctx.database.create_task(&spec, now)?;

            match format {
                OutputFormat::Json => to_json(&ctx.database.load_task(id)?),
                OutputFormat::Pretty => Ok(format!("{} Added task [{id}] {}", "✓".green(), spec.title.bold())),
            }
        }
        TaskCommands::List { ticket } => format_tasks(&ctx.database.list_tasks(ticket)?, format),
    }
}
