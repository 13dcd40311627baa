use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::desk::{SweepReport, TicketOutcome};
use crate::features::automation::{AutomationLog, LogStatus, Rule, Target};
use crate::features::sla::SlaProfile;
use crate::storage::Agent;
use crate::tickets::{HistoryRecord, Priority, Task, TaskStatus, Ticket, TicketStatus};

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn status_label(status: TicketStatus) -> ColoredString {
    match status {
        TicketStatus::Open => status.as_str().white(),
        TicketStatus::Pending | TicketStatus::Waiting => status.as_str().yellow(),
        TicketStatus::InProgress => status.as_str().blue(),
        TicketStatus::Resolved => status.as_str().green(),
        TicketStatus::Closed => status.as_str().dimmed(),
    }
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::Critical => priority.as_str().red().bold(),
        Priority::High => priority.as_str().red(),
        Priority::Medium => priority.as_str().yellow(),
        Priority::Low => priority.as_str().dimmed(),
    }
}

/// `met`, `breached`, `due <time>` or `-`.
fn sla_label(due: Option<DateTime<Utc>>, met: Option<bool>) -> ColoredString {
    match (due, met) {
        (_, Some(true)) => "met".green(),
        (_, Some(false)) => "breached".red().bold(),
        (Some(due), None) => format!("due {}", stamp(due)).yellow(),
        (None, None) => "-".dimmed(),
    }
}

/// Format a list of tickets as a pretty table
pub fn format_tickets_pretty(tickets: &[Ticket]) -> String {
    if tickets.is_empty() {
        return "Tickets (0)\n  No tickets".to_string();
    }

    let mut output = format!("Tickets ({})\n", tickets.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for ticket in tickets {
        let mut line = format!(
            "{} {}  [{}] [{}]",
            format!("#{}", ticket.ticket_number).dimmed(),
            ticket.title.bold(),
            status_label(ticket.status),
            priority_label(ticket.priority)
        );

        if let Some(assignee) = &ticket.assignee_id {
            line.push_str(&format!("  @{assignee}"));
        }

        if ticket.sla_response_met == Some(false) || ticket.sla_resolution_met == Some(false) {
            line.push_str(&format!("  {}", "SLA breached".red()));
        }

        if !ticket.tags.is_empty() {
            let tags_str = ticket
                .tags
                .iter()
                .map(|t| format!("#{t}"))
                .collect::<Vec<_>>()
                .join(" ");
            line.push_str(&format!("  {}", tags_str.cyan()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format a single ticket as pretty output
pub fn format_ticket_pretty(ticket: &Ticket) -> String {
    let mut output = format!(
        "{} {}\n",
        format!("#{}", ticket.ticket_number).dimmed(),
        ticket.title.bold()
    );
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), ticket.id));
    output.push_str(&format!("  {}: {}\n", "Status".dimmed(), status_label(ticket.status)));
    output.push_str(&format!(
        "  {}: {}\n",
        "Priority".dimmed(),
        priority_label(ticket.priority)
    ));

    if let Some(assignee) = &ticket.assignee_id {
        output.push_str(&format!("  {}: {}\n", "Assignee".dimmed(), assignee));
    }

    if let Some(org) = &ticket.organization_id {
        output.push_str(&format!("  {}: {}\n", "Organization".dimmed(), org));
    }

    if !ticket.tags.is_empty() {
        output.push_str(&format!("  {}: {}\n", "Tags".dimmed(), ticket.tags.join(", ")));
    }

    match ticket.sla_profile_id {
        Some(profile) => {
            output.push_str(&format!("  {}: {}\n", "SLA profile".dimmed(), profile));
            output.push_str(&format!(
                "  {}: {}\n",
                "Response".dimmed(),
                sla_label(ticket.sla_response_due, ticket.sla_response_met)
            ));
            output.push_str(&format!(
                "  {}: {}\n",
                "Resolution".dimmed(),
                sla_label(ticket.sla_resolution_due, ticket.sla_resolution_met)
            ));
        }
        None => output.push_str(&format!("  {}: {}\n", "SLA profile".dimmed(), "none".dimmed())),
    }

    if let Some(at) = ticket.first_response_at {
        output.push_str(&format!("  {}: {}\n", "First response".dimmed(), stamp(at)));
    }

    if let Some(at) = ticket.resolved_at {
        output.push_str(&format!("  {}: {}\n", "Resolved".dimmed(), stamp(at)));
    }

    output.push_str(&format!("  {}: {}\n", "Created".dimmed(), stamp(ticket.created_at)));

    output
}

/// Format a ticket operation: the ticket, then what the rules did
pub fn format_outcome_pretty(outcome: &TicketOutcome) -> String {
    let mut output = format_ticket_pretty(&outcome.ticket);

    if !outcome.logs.is_empty() {
        output.push('\n');
        output.push_str(&format_logs_pretty(&outcome.logs));
    }

    output
}

/// Format ticket history
pub fn format_history_pretty(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "History (0)\n  No changes recorded".to_string();
    }

    let mut output = format!("History ({})\n", records.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for record in records {
        output.push_str(&format!(
            "  {}  {:<20} {} → {}  {}\n",
            stamp(record.created_at).dimmed(),
            record.field.bold(),
            record.old_value.as_deref().unwrap_or("∅"),
            record.new_value.as_deref().unwrap_or("∅"),
            record.actor.dimmed()
        ));
    }

    output
}

/// Format SLA profiles
pub fn format_profiles_pretty(profiles: &[SlaProfile]) -> String {
    if profiles.is_empty() {
        return "SLA profiles (0)\n  No profiles".to_string();
    }

    let mut output = format!("SLA profiles ({})\n", profiles.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for profile in profiles {
        let mut line = format!(
            "  {} {}  response {}m, resolution {}m",
            format!("[{}]", profile.id).dimmed(),
            profile.name.bold(),
            profile.response_time_minutes,
            profile.resolution_time_minutes
        );

        if profile.business_hours_only {
            line.push_str(&format!("  {}", "business hours".cyan()));
        }

        if !profile.priority_multipliers.is_empty() {
            let multipliers = profile
                .priority_multipliers
                .iter()
                .map(|(p, m)| format!("{p}×{m}"))
                .collect::<Vec<_>>()
                .join(" ");
            line.push_str(&format!("  {}", multipliers.dimmed()));
        }

        if profile.is_default {
            line.push_str(&format!("  {}", "(default)".green()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format automation rules
pub fn format_rules_pretty(rules: &[Rule]) -> String {
    if rules.is_empty() {
        return "Rules (0)\n  No automation rules".to_string();
    }

    let mut output = format!("Rules ({})\n", rules.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for rule in rules {
        let status = if rule.is_active { "●".green() } else { "○".dimmed() };
        let id = rule.id.map_or_else(|| "-".to_string(), |id| id.to_string());

        output.push_str(&format!(
            "{} {} {}\n",
            status,
            format!("[{id}]").dimmed(),
            rule.name.bold()
        ));
        output.push_str(&format!(
            "    {} {} → {}\n",
            "on".dimmed(),
            rule.trigger_type.display_name(),
            rule.action.action_type().display_name()
        ));

        if let Some(cron) = &rule.schedule_cron {
            output.push_str(&format!("    {} {}\n", "cron".dimmed(), cron));
        }

        for condition in &rule.conditions {
            output.push_str(&format!(
                "    {} {} {} {}\n",
                "if".dimmed(),
                condition.field,
                condition.operator,
                condition.value
            ));
        }

        if let Some(desc) = &rule.description {
            output.push_str(&format!("    {}\n", desc.dimmed()));
        }
    }

    output
}

/// Format automation log entries
pub fn format_logs_pretty(logs: &[AutomationLog]) -> String {
    if logs.is_empty() {
        return "Automation log (0)\n  No entries".to_string();
    }

    let mut output = format!("Automation log ({})\n", logs.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for log in logs {
        let status = match log.status {
            LogStatus::Success => "✓".green(),
            LogStatus::Skipped => "○".yellow(),
            LogStatus::Failed => "✗".red(),
        };
        let target = match (log.task_id, log.ticket_id) {
            (Some(task), _) => Target::Task(task).to_string(),
            (None, Some(ticket)) => Target::Ticket(ticket).to_string(),
            (None, None) => "-".to_string(),
        };

        output.push_str(&format!(
            "{} {}  {} {}  {}\n",
            status,
            stamp(log.created_at).dimmed(),
            format!("rule:{}", log.rule_id).dimmed(),
            target,
            log.message
        ));
    }

    output
}

/// Format tasks
pub fn format_tasks_pretty(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "Tasks (0)\n  No tasks".to_string();
    }

    let mut output = format!("Tasks ({})\n", tasks.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for task in tasks {
        let status_icon = match task.status {
            TaskStatus::Todo => "[ ]".white(),
            TaskStatus::InProgress => "[~]".blue(),
            TaskStatus::Done => "[x]".green(),
        };

        let mut line = format!(
            "{} {} {}  [{}]",
            status_icon,
            format!("[{}]", task.id).dimmed(),
            task.title.bold(),
            priority_label(task.priority)
        );

        if let Some(ticket) = task.ticket_id {
            line.push_str(&format!("  {}", format!("ticket {ticket}").dimmed()));
        }

        if let Some(assignee) = &task.assignee_id {
            line.push_str(&format!("  @{assignee}"));
        }

        if let Some(due) = task.due_at {
            line.push_str(&format!("  {}", stamp(due).yellow()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format agents
pub fn format_agents_pretty(agents: &[Agent]) -> String {
    if agents.is_empty() {
        return "Agents (0)\n  No agents".to_string();
    }

    let mut output = format!("Agents ({})\n", agents.len());
    output.push_str(&"─".repeat(40));
    output.push('\n');

    for agent in agents {
        output.push_str(&format!("  {}  {}\n", agent.id.bold(), agent.name));
    }

    output
}

/// Format a sweep report
pub fn format_sweep_pretty(report: &SweepReport) -> String {
    let when = report.swept_at.map_or_else(String::new, stamp);

    if report.is_quiet() {
        return format!("Sweep {when}\n  Nothing to do");
    }

    let mut output = format!("Sweep {when}\n");
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for breach in &report.breaches {
        output.push_str(&format!(
            "  {} #{} {} deadline\n",
            "breach".red().bold(),
            breach.ticket_number,
            breach.clock.as_str()
        ));
    }

    for task in &report.due_tasks {
        output.push_str(&format!("  {} task {}\n", "due".yellow(), task));
    }

    for rule in &report.scheduled_rules {
        output.push_str(&format!("  {} rule {}\n", "scheduled".cyan(), rule));
    }

    if !report.logs.is_empty() {
        output.push('\n');
        output.push_str(&format_logs_pretty(&report.logs));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::BreachNotice;
    use crate::features::automation::{Action, Condition, TriggerType};
    use crate::tickets::SlaClock;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn make_ticket(title: &str) -> Ticket {
        let mut ticket = Ticket::new(title, Priority::High, now());
        ticket.ticket_number = 7;
        ticket
    }

    #[test]
    fn test_format_tickets_pretty_empty() {
        let output = format_tickets_pretty(&[]);
        assert!(output.contains("Tickets (0)"));
        assert!(output.contains("No tickets"));
    }

    #[test]
    fn test_format_tickets_pretty_marks_breaches() {
        let mut breached = make_ticket("Outage");
        breached.sla_response_met = Some(false);
        breached.tags = vec!["vip".to_string()];
        let output = format_tickets_pretty(&[breached, make_ticket("Printer")]);

        assert!(output.contains("Tickets (2)"));
        assert!(output.contains("Outage"));
        assert!(output.contains("SLA breached"));
        assert!(output.contains("#vip"));
    }

    #[test]
    fn test_format_ticket_pretty_sla_lines() {
        let mut ticket = make_ticket("VPN down");
        ticket.sla_profile_id = Some(1);
        ticket.sla_response_due = Some(now());
        ticket.sla_resolution_met = Some(true);
        ticket.assignee_id = Some("lead".to_string());

        let output = format_ticket_pretty(&ticket);
        assert!(output.contains("VPN down"));
        assert!(output.contains("due 2024-01-01 09:00"));
        assert!(output.contains("met"));
        assert!(output.contains("lead"));
    }

    #[test]
    fn test_format_rules_pretty() {
        let mut rule = Rule::new("Escalate VIP", TriggerType::SlaBreach, Action::escalate())
            .with_condition(Condition::has_tag("vip"));
        rule.id = Some(3);
        let output = format_rules_pretty(&[rule]);

        assert!(output.contains("[3]"));
        assert!(output.contains("Escalate VIP"));
        assert!(output.contains("tags contains vip"));
    }

    #[test]
    fn test_format_logs_pretty() {
        let log = AutomationLog::skipped(2, "tag 'vip' already present", now())
            .for_target(Target::Ticket(5), Some(5));
        let output = format_logs_pretty(&[log]);

        assert!(output.contains("Automation log (1)"));
        assert!(output.contains("rule:2"));
        assert!(output.contains("already present"));
    }

    #[test]
    fn test_format_sweep_pretty() {
        let quiet = SweepReport {
            swept_at: Some(now()),
            ..SweepReport::default()
        };
        assert!(format_sweep_pretty(&quiet).contains("Nothing to do"));

        let busy = SweepReport {
            swept_at: Some(now()),
            breaches: vec![BreachNotice {
                ticket_id: 1,
                ticket_number: 7,
                clock: SlaClock::Resolution,
            }],
            ..SweepReport::default()
        };
        let output = format_sweep_pretty(&busy);
        assert!(output.contains("#7 resolution deadline"));
    }

    #[test]
    fn test_format_history_pretty() {
        let record = crate::tickets::HistoryRecord::new(
            1,
            "status",
            Some("open".to_string()),
            Some("resolved".to_string()),
            crate::tickets::Actor::User,
            now(),
        );
        let output = format_history_pretty(&[record]);
        assert!(output.contains("open → resolved"));
        assert!(output.contains("user"));
    }
}
