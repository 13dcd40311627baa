//! Action execution.
//!
//! The executor applies one matched rule's action to its target and appends
//! exactly one automation log entry for it. Ticket mutations are computed on
//! a copy and saved together with their history, so a failed action leaves
//! nothing behind. Storage failures propagate; anything else becomes a
//! `failed` log entry.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::action::{Action, TemplateContext};
use super::log::{AutomationLog, LogStatus, Target};
use super::rule::Rule;
use crate::config::AutomationConfig;
use crate::core::{create_task_bounded, send_bounded, Notifier, TaskCreator, TaskSpec};
use crate::error::DeskError;
use crate::features::sla::SlaCalculator;
use crate::storage::Storage;
use crate::tickets::{Actor, HistoryRecord, StatusMachine, Task, Ticket};

/// What an action did to its target.
#[derive(Debug, Clone, PartialEq)]
enum Change {
    Applied { message: String, metadata: Value },
    Skipped(String),
}

impl Change {
    fn applied(message: impl Into<String>, metadata: Value) -> Self {
        Self::Applied {
            message: message.into(),
            metadata,
        }
    }
}

/// Executes rule actions against tickets and tasks.
pub struct ActionExecutor<'a> {
    storage: &'a dyn Storage,
    tasks: &'a Arc<dyn TaskCreator>,
    notifier: &'a Arc<dyn Notifier>,
    machine: &'a StatusMachine,
    calculator: &'a SlaCalculator,
    notifier_timeout: StdDuration,
    task_timeout: StdDuration,
    default_channel: &'a str,
    conflict_retries: u32,
}

impl<'a> ActionExecutor<'a> {
    #[must_use]
    pub fn new(
        storage: &'a dyn Storage,
        tasks: &'a Arc<dyn TaskCreator>,
        notifier: &'a Arc<dyn Notifier>,
        machine: &'a StatusMachine,
        calculator: &'a SlaCalculator,
        config: &'a AutomationConfig,
    ) -> Self {
        Self {
            storage,
            tasks,
            notifier,
            machine,
            calculator,
            notifier_timeout: config.notifier_timeout(),
            task_timeout: config.task_timeout(),
            default_channel: &config.default_channel,
            conflict_retries: config.conflict_retries,
        }
    }

    /// Run `rule`'s action against `target` and log the outcome.
    ///
    /// # Errors
    ///
    /// Returns storage errors, including a version conflict that persisted
    /// through every retry. Action failures are logged, not returned.
    pub fn execute(
        &self,
        rule: &Rule,
        target: Target,
        now: DateTime<Utc>,
    ) -> Result<AutomationLog, DeskError> {
        let action_type = rule.action.action_type();

        let (outcome, ticket_id) = match target {
            Target::Ticket(id) => (self.run_on_ticket(rule, id, now), Some(id)),
            Target::Task(id) => match self.storage.load_task(id) {
                Ok(task) => {
                    let ticket_id = task.ticket_id;
                    (self.run_on_task(rule, task, now), ticket_id)
                }
                Err(e) => (Err(e), None),
            },
        };

        let log = match outcome {
            Ok(Change::Applied { message, metadata }) => {
                AutomationLog::success(rule.log_id(), message, now).with_metadata(metadata)
            }
            Ok(Change::Skipped(message)) => AutomationLog::skipped(rule.log_id(), message, now)
                .with_metadata(json!({ "action": action_type })),
            Err(e) if e.is_storage() => return Err(e),
            Err(e) => AutomationLog::failed(rule.log_id(), e.to_string(), now)
                .with_metadata(json!({ "action": action_type })),
        };

        let mut log = log.for_target(target, ticket_id);
        self.storage.append_automation_log(&mut log)?;

        match log.status {
            LogStatus::Success => {
                info!(rule = rule.log_id(), ?target, action = %action_type, "{}", log.message);
            }
            LogStatus::Skipped => {
                debug!(rule = rule.log_id(), ?target, action = %action_type, "skipped: {}", log.message);
            }
            LogStatus::Failed => {
                warn!(rule = rule.log_id(), ?target, action = %action_type, "failed: {}", log.message);
            }
        }

        Ok(log)
    }

    fn run_on_ticket(&self, rule: &Rule, id: i64, now: DateTime<Utc>) -> Result<Change, DeskError> {
        let ticket = self.storage.load_ticket(id)?;
        let context = TemplateContext {
            rule_name: &rule.name,
            ticket: Some(&ticket),
            task: None,
        };

        if let Some(result) = self.run_external(rule, &context, now) {
            return result;
        }
        self.mutate_ticket(rule, ticket, now)
    }

    fn run_on_task(&self, rule: &Rule, mut task: Task, now: DateTime<Utc>) -> Result<Change, DeskError> {
        if !rule.action.supports_tasks() {
            return Err(DeskError::ActionExecutionFailure(format!(
                "{} needs a ticket target, got task {}",
                rule.action.action_type(),
                task.id
            )));
        }

        let ticket = task
            .ticket_id
            .map(|id| self.storage.load_ticket(id))
            .transpose()?;
        let context = TemplateContext {
            rule_name: &rule.name,
            ticket: ticket.as_ref(),
            task: Some(&task),
        };

        if let Some(result) = self.run_external(rule, &context, now) {
            return result;
        }

        let change = match &rule.action {
            Action::Assign { assignee_id } => {
                if task.assignee_id.as_deref() == Some(assignee_id.as_str()) {
                    return Ok(Change::Skipped(format!(
                        "task already assigned to {assignee_id}"
                    )));
                }
                self.require_agent(assignee_id)?;
                let previous = task.assignee_id.replace(assignee_id.clone());
                Change::applied(
                    format!("assigned task {} to {assignee_id}", task.id),
                    json!({ "action": "assign", "from": previous, "to": assignee_id }),
                )
            }
            Action::ChangePriority { priority } => {
                if task.priority == *priority {
                    return Ok(Change::Skipped(format!("task priority already {priority}")));
                }
                let previous = std::mem::replace(&mut task.priority, *priority);
                Change::applied(
                    format!("task priority {previous} -> {priority}"),
                    json!({ "action": "change_priority", "from": previous, "to": priority }),
                )
            }
            other => {
                return Err(DeskError::ActionExecutionFailure(format!(
                    "{} cannot be applied to a task",
                    other.action_type()
                )))
            }
        };

        self.storage.save_task(&task)?;
        Ok(change)
    }

    /// Actions that call a collaborator instead of changing the target.
    fn run_external(
        &self,
        rule: &Rule,
        context: &TemplateContext<'_>,
        now: DateTime<Utc>,
    ) -> Option<Result<Change, DeskError>> {
        match &rule.action {
            Action::SendNotification {
                channel,
                recipient,
                message,
            } => Some(self.notify(context, channel.as_deref(), recipient.as_deref(), message)),
            Action::CreateTask {
                title,
                description,
                priority,
                assignee_id,
                due_in_minutes,
            } => {
                let spec = TaskSpec {
                    ticket_id: context.ticket.map(|t| t.id),
                    title: context.render(title),
                    description: description.as_deref().map(|d| context.render(d)),
                    priority: priority
                        .or_else(|| context.ticket.map(|t| t.priority))
                        .or_else(|| context.task.map(|t| t.priority))
                        .unwrap_or_default(),
                    assignee_id: assignee_id
                        .clone()
                        .or_else(|| context.ticket.and_then(|t| t.assignee_id.clone())),
                    due_at: due_in_minutes.map(|m| now + Duration::minutes(m)),
                };
                let created = create_task_bounded(self.tasks, &spec, now, self.task_timeout);
                Some(created.map(|task_id| {
                    Change::applied(
                        format!("created task {task_id}: {}", spec.title),
                        json!({ "action": "create_task", "task_id": task_id, "title": spec.title }),
                    )
                }))
            }
            _ => None,
        }
    }

    fn notify(
        &self,
        context: &TemplateContext<'_>,
        channel: Option<&str>,
        recipient: Option<&str>,
        message: &str,
    ) -> Result<Change, DeskError> {
        let channel = channel.unwrap_or(self.default_channel);
        let recipient = recipient
            .map(ToString::to_string)
            .or_else(|| context.task.and_then(|t| t.assignee_id.clone()))
            .or_else(|| context.ticket.and_then(|t| t.assignee_id.clone()))
            .ok_or_else(|| {
                DeskError::ActionExecutionFailure(
                    "notification has no recipient and the target is unassigned".to_string(),
                )
            })?;
        let text = context.render(message);

        send_bounded(self.notifier, channel, &recipient, &text, self.notifier_timeout)?;

        Ok(Change::applied(
            format!("notified {recipient} via {channel}"),
            json!({
                "action": "send_notification",
                "channel": channel,
                "recipient": recipient,
                "message": text,
            }),
        ))
    }

    /// Apply the action to a copy and save it with its history, retrying on
    /// version conflicts from a fresh load.
    fn mutate_ticket(&self, rule: &Rule, mut before: Ticket, now: DateTime<Utc>) -> Result<Change, DeskError> {
        let mut attempts = 0;

        loop {
            let mut after = before.clone();
            let change = self.apply(&rule.action, &mut after, now)?;
            if matches!(change, Change::Skipped(_)) {
                return Ok(change);
            }

            after.updated_at = now;
            let history = HistoryRecord::diff(&before, &after, Actor::Rule(rule.log_id()), now);

            match self.storage.save_ticket(&mut after, &history) {
                Ok(()) => return Ok(change),
                Err(DeskError::Conflict(id)) if attempts < self.conflict_retries => {
                    attempts += 1;
                    debug!(ticket = id, attempts, "version conflict, reloading");
                    before = self.storage.load_ticket(id)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn apply(&self, action: &Action, ticket: &mut Ticket, now: DateTime<Utc>) -> Result<Change, DeskError> {
        match action {
            Action::Assign { assignee_id } => {
                if ticket.assignee_id.as_deref() == Some(assignee_id.as_str()) {
                    return Ok(Change::Skipped(format!("already assigned to {assignee_id}")));
                }
                self.require_agent(assignee_id)?;
                let previous = ticket.assignee_id.replace(assignee_id.clone());
                Ok(Change::applied(
                    format!("assigned to {assignee_id}"),
                    json!({ "action": "assign", "from": previous, "to": assignee_id }),
                ))
            }
            Action::ChangeStatus { status } => {
                let from = ticket.status;
                if self.machine.transition(ticket, *status, now)?.is_none() {
                    return Ok(Change::Skipped(format!("already {status}")));
                }
                // Breaches found here are recorded but not dispatched again
                let breaches = self.calculator.evaluate_compliance(ticket, now);
                if !breaches.is_empty() {
                    warn!(ticket = ticket.id, ?breaches, "SLA breached by rule status change");
                }
                Ok(Change::applied(
                    format!("status {from} -> {status}"),
                    json!({
                        "action": "change_status",
                        "from": from,
                        "to": status,
                        "breaches": breaches,
                    }),
                ))
            }
            Action::ChangePriority { priority } => {
                if ticket.priority == *priority {
                    return Ok(Change::Skipped(format!("priority already {priority}")));
                }
                let previous = std::mem::replace(&mut ticket.priority, *priority);
                Ok(Change::applied(
                    format!("priority {previous} -> {priority}"),
                    json!({ "action": "change_priority", "from": previous, "to": priority }),
                ))
            }
            Action::AddTag { tag } => {
                let tag = tag.trim();
                if ticket.has_tag(tag) {
                    return Ok(Change::Skipped(format!("tag '{tag}' already present")));
                }
                ticket.tags.push(tag.to_string());
                Ok(Change::applied(
                    format!("added tag '{tag}'"),
                    json!({ "action": "add_tag", "tag": tag }),
                ))
            }
            Action::Escalate {
                assignee_id,
                priority,
                raise_priority,
            } => {
                let target_priority = match priority {
                    Some(p) => (*p).max(ticket.priority),
                    None if *raise_priority => ticket.priority.raised(),
                    None => ticket.priority,
                };
                let reassign = assignee_id
                    .as_deref()
                    .filter(|a| ticket.assignee_id.as_deref() != Some(*a));

                if target_priority == ticket.priority && reassign.is_none() {
                    return Ok(Change::Skipped("nothing to escalate".to_string()));
                }

                let mut changes = Vec::new();
                if let Some(agent) = reassign {
                    self.require_agent(agent)?;
                    ticket.assignee_id = Some(agent.to_string());
                    changes.push(format!("assigned to {agent}"));
                }
                let previous = ticket.priority;
                if target_priority != previous {
                    ticket.priority = target_priority;
                    changes.push(format!("priority {previous} -> {target_priority}"));
                }

                Ok(Change::applied(
                    format!("escalated: {}", changes.join(", ")),
                    json!({
                        "action": "escalate",
                        "assignee_id": ticket.assignee_id,
                        "from_priority": previous,
                        "to_priority": target_priority,
                    }),
                ))
            }
            Action::SendNotification { .. } | Action::CreateTask { .. } => {
                Err(DeskError::ActionExecutionFailure(format!(
                    "{} does not modify tickets",
                    action.action_type()
                )))
            }
        }
    }

    fn require_agent(&self, agent_id: &str) -> Result<(), DeskError> {
        if self.storage.agent_exists(agent_id)? {
            Ok(())
        } else {
            Err(DeskError::ActionExecutionFailure(format!(
                "unknown assignee '{agent_id}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogNotifier, MockNotifier};
    use crate::features::automation::TriggerType;
    use crate::storage::{Agent, Database};
    use crate::tickets::{Priority, TaskStatus, TicketStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        db: Arc<Database>,
        tasks: Arc<dyn TaskCreator>,
        notifier: Arc<dyn Notifier>,
        machine: StatusMachine,
        calculator: SlaCalculator,
        config: AutomationConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_notifier(Arc::new(LogNotifier))
        }

        fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            db.upsert_agent(&Agent {
                id: "lead".to_string(),
                name: "Team Lead".to_string(),
            })
            .unwrap();
            Self {
                tasks: db.clone(),
                db,
                notifier,
                machine: StatusMachine::default(),
                calculator: SlaCalculator::default(),
                config: AutomationConfig::default(),
            }
        }

        fn executor(&self) -> ActionExecutor<'_> {
            ActionExecutor::new(
                &*self.db,
                &self.tasks,
                &self.notifier,
                &self.machine,
                &self.calculator,
                &self.config,
            )
        }

        fn ticket(&self, priority: Priority) -> Ticket {
            let mut ticket = Ticket::new("Printer jammed", priority, now());
            self.db.insert_ticket(&mut ticket).unwrap();
            ticket
        }

        fn rule(&self, action: Action) -> Rule {
            let mut rule = Rule::new("test rule", TriggerType::TicketUpdated, action);
            self.db.insert_rule(&mut rule, now()).unwrap();
            rule
        }
    }

    #[test]
    fn test_add_tag_twice_is_idempotent() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::add_tag("vip"));
        let exec = fx.executor();

        let first = exec.execute(&rule, Target::Ticket(ticket.id), now()).unwrap();
        let second = exec.execute(&rule, Target::Ticket(ticket.id), now()).unwrap();

        assert_eq!(first.status, LogStatus::Success);
        assert_eq!(second.status, LogStatus::Skipped);
        assert_eq!(fx.db.load_ticket(ticket.id).unwrap().tags, vec!["vip"]);
        assert_eq!(fx.db.list_logs(rule.id, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_assign_unknown_agent_fails_without_change() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::assign("ghost"));

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.contains("ghost"));
        let stored = fx.db.load_ticket(ticket.id).unwrap();
        assert_eq!(stored.assignee_id, None);
        assert_eq!(stored.version, ticket.version);
        assert!(fx.db.ticket_history(ticket.id).unwrap().is_empty());
    }

    #[test]
    fn test_assign_writes_history_as_rule() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::assign("lead"));

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        assert!(log.is_success());
        assert_eq!(log.ticket_id, Some(ticket.id));
        let history = fx.db.ticket_history(ticket.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].field, "assignee_id");
        assert_eq!(history[0].actor, format!("rule:{}", rule.id.unwrap()));
    }

    #[test]
    fn test_change_status_goes_through_machine() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::ChangeStatus {
            status: TicketStatus::Resolved,
        });

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();
        assert!(log.is_success());

        let stored = fx.db.load_ticket(ticket.id).unwrap();
        assert_eq!(stored.status, TicketStatus::Resolved);
        assert_eq!(stored.resolved_at, Some(now()));
        assert_eq!(stored.first_response_at, Some(now()));

        let again = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();
        assert_eq!(again.status, LogStatus::Skipped);
    }

    #[test]
    fn test_rejected_transition_is_logged_as_failed() {
        let mut fx = Fixture::new();
        fx.machine = crate::config::SlaConfig {
            allow_reopen_closed: false,
            stamp_first_response_on_status_change: true,
        }
        .status_machine();
        let mut ticket = fx.ticket(Priority::Medium);
        ticket.status = TicketStatus::Closed;
        fx.db.save_ticket(&mut ticket, &[]).unwrap();

        let rule = fx.rule(Action::ChangeStatus {
            status: TicketStatus::Open,
        });
        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        assert_eq!(log.status, LogStatus::Failed);
        assert_eq!(fx.db.load_ticket(ticket.id).unwrap().status, TicketStatus::Closed);
    }

    #[test]
    fn test_escalate_raises_one_step_then_skips_at_top() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::High);
        let rule = fx.rule(Action::escalate());
        let exec = fx.executor();

        let log = exec.execute(&rule, Target::Ticket(ticket.id), now()).unwrap();
        assert!(log.is_success());
        assert_eq!(fx.db.load_ticket(ticket.id).unwrap().priority, Priority::Critical);

        let log = exec.execute(&rule, Target::Ticket(ticket.id), now()).unwrap();
        assert_eq!(log.status, LogStatus::Skipped);
    }

    #[test]
    fn test_escalate_to_level_with_reassign() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Low);
        let rule = fx.rule(Action::Escalate {
            assignee_id: Some("lead".to_string()),
            priority: Some(Priority::High),
            raise_priority: true,
        });

        fx.executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        let stored = fx.db.load_ticket(ticket.id).unwrap();
        assert_eq!(stored.priority, Priority::High);
        assert_eq!(stored.assignee_id.as_deref(), Some("lead"));
        let fields: Vec<String> = fx
            .db
            .ticket_history(ticket.id)
            .unwrap()
            .into_iter()
            .map(|r| r.field)
            .collect();
        assert_eq!(fields, vec!["priority", "assignee_id"]);
    }

    #[test]
    fn test_notification_renders_template() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .withf(|channel, recipient, message| {
                channel.to_string() == "email"
                    && recipient.to_string() == "lead"
                    && message.to_string() == "Ticket #1 (critical) needs you"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let fx = Fixture::with_notifier(Arc::new(mock));
        let mut ticket = fx.ticket(Priority::Critical);
        ticket.assignee_id = Some("lead".to_string());
        fx.db.save_ticket(&mut ticket, &[]).unwrap();

        let rule = fx.rule(Action::notify("Ticket #{ticket_number} ({priority}) needs you"));
        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        assert!(log.is_success());
        assert_eq!(log.metadata["recipient"], "lead");
    }

    #[test]
    fn test_notification_failure_is_contained() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .returning(|_, _, _| Err(DeskError::Notification("smtp down".to_string())));

        let fx = Fixture::with_notifier(Arc::new(mock));
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::SendNotification {
            channel: Some("sms".to_string()),
            recipient: Some("+15550100".to_string()),
            message: "hi".to_string(),
        });

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();
        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.contains("smtp down"));
    }

    #[test]
    fn test_notification_without_recipient_fails() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let rule = fx.rule(Action::notify("hello"));

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();
        assert_eq!(log.status, LogStatus::Failed);
    }

    #[test]
    fn test_create_task_is_linked() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::High);
        let rule = fx.rule(Action::CreateTask {
            title: "Follow up on #{ticket_number}".to_string(),
            description: None,
            priority: None,
            assignee_id: Some("lead".to_string()),
            due_in_minutes: Some(60),
        });

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();
        assert!(log.is_success());

        let tasks = fx.db.list_tasks(Some(ticket.id)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Follow up on #1");
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].due_at, Some(now() + Duration::minutes(60)));
        assert_eq!(log.metadata["task_id"], tasks[0].id);
    }

    struct BrokenTasks;

    impl TaskCreator for BrokenTasks {
        fn create_task(&self, _: &TaskSpec, _: DateTime<Utc>) -> Result<i64, DeskError> {
            Err(DeskError::Database("tasks table locked".to_string()))
        }
    }

    #[test]
    fn test_create_task_failure_is_logged_not_raised() {
        let mut fx = Fixture::new();
        fx.tasks = Arc::new(BrokenTasks);
        let ticket = fx.ticket(Priority::High);
        let rule = fx.rule(Action::CreateTask {
            title: "Follow up".to_string(),
            description: None,
            priority: None,
            assignee_id: None,
            due_in_minutes: None,
        });

        let log = fx
            .executor()
            .execute(&rule, Target::Ticket(ticket.id), now())
            .unwrap();

        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.contains("tasks table locked"));
        assert!(fx.db.list_tasks(Some(ticket.id)).unwrap().is_empty());
        assert_eq!(fx.db.list_logs(rule.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_task_targets() {
        let fx = Fixture::new();
        let ticket = fx.ticket(Priority::Medium);
        let task_id = fx
            .db
            .create_task(
                &TaskSpec {
                    ticket_id: Some(ticket.id),
                    title: "Swap toner".to_string(),
                    description: None,
                    priority: Priority::Low,
                    assignee_id: None,
                    due_at: Some(now()),
                },
                now(),
            )
            .unwrap();

        let assign = fx.rule(Action::assign("lead"));
        let log = fx
            .executor()
            .execute(&assign, Target::Task(task_id), now())
            .unwrap();
        assert!(log.is_success());
        assert_eq!(log.task_id, Some(task_id));
        assert_eq!(log.ticket_id, Some(ticket.id));

        let task = fx.db.load_task(task_id).unwrap();
        assert_eq!(task.assignee_id.as_deref(), Some("lead"));
        assert_eq!(task.status, TaskStatus::Todo);

        let tag = fx.rule(Action::add_tag("x"));
        let log = fx
            .executor()
            .execute(&tag, Target::Task(task_id), now())
            .unwrap();
        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.contains("needs a ticket target"));
    }

    #[test]
    fn test_missing_ticket_is_logged_as_failed() {
        let fx = Fixture::new();
        let rule = fx.rule(Action::add_tag("x"));
        let log = fx.executor().execute(&rule, Target::Ticket(404), now()).unwrap();
        assert_eq!(log.status, LogStatus::Failed);
    }
}
