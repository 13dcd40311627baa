//! The desk service.
//!
//! [`Desk`] ties the engine together: it applies ticket operations through the
//! status machine and SLA calculator, saves them with their history, and
//! hands the resulting events to the automation rules. It also runs the
//! periodic sweep for breaches, due tasks and cron rules.
//!
//! Every operation on a ticket holds that ticket's lock from load to the
//! last rule execution. Saves use an optimistic version check and are
//! retried from a fresh load when another process got there first.

mod locks;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use locks::TicketLocks;

use crate::config::{AutomationConfig, Config};
use crate::core::{Clock, LogNotifier, Notifier, SystemClock, TaskCreator};
use crate::error::DeskError;
use crate::features::automation::{
    evaluate, schedule, ActionExecutor, AutomationLog, MatchOutcome, Rule, Target, TriggerType,
};
use crate::features::sla::{SlaCalculator, SlaProfile};
use crate::storage::{Database, Storage};
use crate::tickets::{
    Actor, Event, HistoryRecord, NewTicket, Priority, SlaClock, StatusMachine, Ticket, TicketStatus,
};

/// Result of a ticket operation.
#[derive(Debug, Clone, Serialize)]
pub struct TicketOutcome {
    /// The ticket as stored after all rules ran
    pub ticket: Ticket,
    /// Events produced by the operation itself
    pub events: Vec<Event>,
    /// One entry per rule that was attempted
    pub logs: Vec<AutomationLog>,
}

/// A breach found by the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreachNotice {
    pub ticket_id: i64,
    pub ticket_number: i64,
    pub clock: SlaClock,
}

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub swept_at: Option<DateTime<Utc>>,
    pub breaches: Vec<BreachNotice>,
    /// Tasks that became due in this sweep
    pub due_tasks: Vec<i64>,
    /// Scheduled rules whose window was claimed
    pub scheduled_rules: Vec<i64>,
    pub logs: Vec<AutomationLog>,
}

impl SweepReport {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.breaches.is_empty()
            && self.due_tasks.is_empty()
            && self.scheduled_rules.is_empty()
            && self.logs.is_empty()
    }
}

/// Ticket operations, rule dispatch and the sweep.
pub struct Desk {
    storage: Arc<dyn Storage>,
    tasks: Arc<dyn TaskCreator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    calculator: SlaCalculator,
    machine: StatusMachine,
    automation: AutomationConfig,
    locks: TicketLocks,
}

impl Desk {
    /// Create a desk backed by `database`, using the wall clock and the
    /// logging notifier.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Config` if the business hours are invalid.
    pub fn new(database: Arc<Database>, config: &Config) -> Result<Self, DeskError> {
        let calendar = config.business_hours.to_calendar()?;
        let tasks: Arc<dyn TaskCreator> = Arc::clone(&database) as Arc<dyn TaskCreator>;

        Ok(Self {
            storage: database,
            tasks,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            calculator: SlaCalculator::new(calendar),
            machine: config.sla.status_machine(),
            automation: config.automation.clone(),
            locks: TicketLocks::new(),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_task_creator(mut self, tasks: Arc<dyn TaskCreator>) -> Self {
        self.tasks = tasks;
        self
    }

    #[must_use]
    pub const fn calculator(&self) -> &SlaCalculator {
        &self.calculator
    }

    /// Open a ticket and bind it to an SLA profile.
    ///
    /// The requested profile is used when it exists; otherwise the default
    /// profile. Without either the ticket is created without deadlines.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MissingSlaProfile` if a profile was requested,
    /// does not exist, and there is no default. Returns `InvalidArgument`
    /// for an empty title, an unknown assignee or a profile whose deadlines
    /// fall out of range, and storage errors.
    pub fn create_ticket(&self, new: NewTicket) -> Result<TicketOutcome, DeskError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(DeskError::InvalidArgument("ticket title must not be empty".to_string()));
        }
        if let Some(agent) = &new.assignee_id {
            if !self.storage.agent_exists(agent)? {
                return Err(DeskError::InvalidArgument(format!("unknown assignee '{agent}'")));
            }
        }

        let now = self.clock.now();
        let mut ticket = Ticket::new(title, new.priority, now);
        ticket.organization_id = new.organization_id;
        ticket.assignee_id = new.assignee_id;
        for tag in &new.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !ticket.has_tag(tag) {
                ticket.tags.push(tag.to_string());
            }
        }

        match self.resolve_profile(new.sla_profile_id)? {
            Some(profile) => {
                let deadlines = self.calculator.apply_deadlines(&mut ticket, &profile)?;
                debug!(
                    profile = profile.id,
                    response_due = %deadlines.response_due,
                    resolution_due = %deadlines.resolution_due,
                    "computed SLA deadlines"
                );
            }
            None => warn!("no SLA profile configured, ticket created without deadlines"),
        }

        self.storage.insert_ticket(&mut ticket)?;
        info!(ticket = ticket.id, number = ticket.ticket_number, "ticket created");

        let id = ticket.id;
        self.locks.with_lock(id, || {
            let events = vec![Event::created(ticket, now)];
            self.finish(id, events)
        })
    }

    /// Move a ticket to another status.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidTransition` if the policy rejects the move,
    /// `NotFound` for an unknown ticket, and storage errors.
    pub fn change_status(&self, id: i64, to: TicketStatus) -> Result<TicketOutcome, DeskError> {
        self.locks.with_lock(id, || {
            let now = self.clock.now();
            let mut breaches = Vec::new();

            let saved = self.mutate(id, Actor::User, now, |ticket| {
                breaches.clear();
                if self.machine.transition(ticket, to, now)?.is_some() {
                    breaches = self.calculator.evaluate_compliance(ticket, now);
                }
                Ok(())
            })?;

            let Some((before, after)) = saved else {
                return self.unchanged(id);
            };

            let mut events = vec![Event::status_changed(after.clone(), before.clone(), now)];
            events.extend(breach_events(&breaches, &after, &before, now));
            self.finish(id, events)
        })
    }

    /// Change a ticket's priority. Deadlines are not recomputed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ticket, and storage errors.
    pub fn change_priority(&self, id: i64, priority: Priority) -> Result<TicketOutcome, DeskError> {
        self.locks.with_lock(id, || {
            let now = self.clock.now();
            let saved = self.mutate(id, Actor::User, now, |ticket| {
                ticket.priority = priority;
                Ok(())
            })?;

            let Some((before, after)) = saved else {
                return self.unchanged(id);
            };
            self.finish(id, vec![Event::updated(after, before, now)])
        })
    }

    /// Record the first agent response and decide the response clock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ticket, and storage errors.
    pub fn mark_first_response(&self, id: i64) -> Result<TicketOutcome, DeskError> {
        self.locks.with_lock(id, || {
            let now = self.clock.now();
            let mut breaches = Vec::new();

            let saved = self.mutate(id, Actor::User, now, |ticket| {
                breaches.clear();
                if StatusMachine::mark_first_response(ticket, now) {
                    breaches = self.calculator.evaluate_compliance(ticket, now);
                }
                Ok(())
            })?;

            let Some((before, after)) = saved else {
                return self.unchanged(id);
            };

            let mut events = vec![Event::updated(after.clone(), before.clone(), now)];
            events.extend(breach_events(&breaches, &after, &before, now));
            self.finish(id, events)
        })
    }

    /// Bind a ticket to another profile, recompute its deadlines from
    /// creation, and re-evaluate compliance straight away.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MissingSlaProfile` for an unknown profile,
    /// `NotFound` for an unknown ticket, and storage errors.
    pub fn reassign_sla_profile(&self, id: i64, profile_id: i64) -> Result<TicketOutcome, DeskError> {
        let profile = self
            .storage
            .load_sla_profile(profile_id)?
            .ok_or_else(|| DeskError::MissingSlaProfile(format!("profile {profile_id} does not exist")))?;

        self.locks.with_lock(id, || {
            let now = self.clock.now();
            let mut breaches = Vec::new();

            let saved = self.mutate(id, Actor::User, now, |ticket| {
                self.calculator.apply_deadlines(ticket, &profile)?;
                breaches = self.calculator.evaluate_compliance(ticket, now);
                Ok(())
            })?;

            let Some((before, after)) = saved else {
                return self.unchanged(id);
            };

            let mut events = vec![Event::updated(after.clone(), before.clone(), now)];
            events.extend(breach_events(&breaches, &after, &before, now));
            self.finish(id, events)
        })
    }

    /// Run one sweep: SLA breaches on tickets with an undecided clock, newly
    /// due tasks, and due cron rules.
    ///
    /// # Errors
    ///
    /// Returns storage errors. Rule failures are logged and do not stop the
    /// sweep.
    pub fn sweep(&self) -> Result<SweepReport, DeskError> {
        let now = self.clock.now();
        let mut report = SweepReport {
            swept_at: Some(now),
            ..SweepReport::default()
        };

        self.sweep_breaches(now, &mut report)?;
        self.sweep_tasks(now, &mut report)?;
        self.sweep_schedules(now, &mut report)?;

        if report.is_quiet() {
            debug!(at = %now, "sweep found nothing to do");
        } else {
            info!(
                breaches = report.breaches.len(),
                due_tasks = report.due_tasks.len(),
                scheduled_rules = report.scheduled_rules.len(),
                logs = report.logs.len(),
                "sweep finished"
            );
        }
        Ok(report)
    }

    fn sweep_breaches(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), DeskError> {
        // Resolved and closed tickets are included: a response clock that was
        // never stamped still has to be decided.
        for candidate in self.storage.list_tickets(false)? {
            if !candidate.has_open_sla() {
                continue;
            }

            let id = candidate.id;
            let logs = self.locks.with_lock(id, || {
                let mut breaches = Vec::new();
                let saved = self.mutate(id, Actor::System, now, |ticket| {
                    breaches = self.calculator.evaluate_compliance(ticket, now);
                    Ok(())
                })?;

                let Some((before, after)) = saved else {
                    return Ok(Vec::new());
                };

                for clock in &breaches {
                    warn!(ticket = id, number = after.ticket_number, clock = clock.as_str(), "SLA breached");
                    report.breaches.push(BreachNotice {
                        ticket_id: id,
                        ticket_number: after.ticket_number,
                        clock: *clock,
                    });
                }

                let mut logs = Vec::new();
                for event in breach_events(&breaches, &after, &before, now) {
                    logs.extend(self.dispatch(&event)?);
                }
                Ok::<_, DeskError>(logs)
            })?;
            report.logs.extend(logs);
        }
        Ok(())
    }

    fn sweep_tasks(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), DeskError> {
        for task in self.storage.due_tasks(now)? {
            if !self.storage.mark_task_notified(task.id)? {
                continue;
            }
            debug!(task = task.id, "task due");
            report.due_tasks.push(task.id);

            let ticket = match task.ticket_id {
                Some(ticket_id) => match self.storage.load_ticket(ticket_id) {
                    Ok(ticket) => Some(ticket),
                    Err(DeskError::NotFound(_)) => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };

            let event = Event::task_due(task, ticket, now);
            report.logs.extend(self.dispatch(&event)?);
        }
        Ok(())
    }

    fn sweep_schedules(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), DeskError> {
        let mut claimed: Vec<Rule> = Vec::new();

        for rule in self.storage.load_active_rules()? {
            if rule.trigger_type != TriggerType::Scheduled {
                continue;
            }
            let Some(rule_id) = rule.id else { continue };
            let Some(cron) = rule.schedule_cron.as_deref() else {
                report.logs.push(self.log_failure(
                    &rule,
                    "scheduled rule has no cron expression".to_string(),
                    None,
                    now,
                )?);
                continue;
            };

            let tick = match schedule::due_tick(cron, rule.last_run_at, rule.created_at, now) {
                Ok(Some(tick)) => tick,
                Ok(None) => continue,
                Err(e) => {
                    report.logs.push(self.log_failure(&rule, e.to_string(), None, now)?);
                    continue;
                }
            };

            if self.storage.claim_rule_window(rule_id, rule.last_run_at, now)? {
                info!(rule = rule_id, tick = %tick, "claimed schedule window");
                report.scheduled_rules.push(rule_id);
                claimed.push(rule);
            } else {
                debug!(rule = rule_id, "schedule window already claimed");
            }
        }

        if claimed.is_empty() {
            return Ok(());
        }

        for candidate in self.storage.list_tickets(true)? {
            let id = candidate.id;
            let logs = self.locks.with_lock(id, || {
                let ticket = self.storage.load_ticket(id)?;
                let event = Event::scheduled(ticket, now);
                self.run_rules(&event, &claimed)
            })?;
            report.logs.extend(logs);
        }
        Ok(())
    }

    /// Evaluate all active rules against `event` and execute the matches.
    ///
    /// # Errors
    ///
    /// Returns storage errors only.
    pub fn dispatch(&self, event: &Event) -> Result<Vec<AutomationLog>, DeskError> {
        let rules = self.storage.load_active_rules()?;
        self.run_rules(event, &rules)
    }

    fn run_rules(&self, event: &Event, rules: &[Rule]) -> Result<Vec<AutomationLog>, DeskError> {
        let target = match (event.task_id(), event.ticket_id()) {
            (Some(task_id), _) => Target::Task(task_id),
            (None, Some(ticket_id)) => Target::Ticket(ticket_id),
            (None, None) => return Ok(Vec::new()),
        };
        let now = event.timestamp;
        let executor = self.executor();

        let mut logs = Vec::new();
        for evaluation in evaluate(event, rules) {
            match evaluation.outcome {
                MatchOutcome::Matched => {
                    logs.push(executor.execute(evaluation.rule, target, now)?);
                }
                MatchOutcome::NotMatched => {}
                MatchOutcome::Malformed(reason) => {
                    logs.push(self.log_failure(evaluation.rule, reason, Some((target, event.ticket_id())), now)?);
                }
            }
        }
        Ok(logs)
    }

    fn executor(&self) -> ActionExecutor<'_> {
        ActionExecutor::new(
            self.storage.as_ref(),
            &self.tasks,
            &self.notifier,
            &self.machine,
            &self.calculator,
            &self.automation,
        )
    }

    fn log_failure(
        &self,
        rule: &Rule,
        message: String,
        target: Option<(Target, Option<i64>)>,
        now: DateTime<Utc>,
    ) -> Result<AutomationLog, DeskError> {
        let mut log = AutomationLog::failed(rule.log_id(), message, now);
        if let Some((target, ticket_id)) = target {
            log = log.for_target(target, ticket_id);
        }
        self.storage.append_automation_log(&mut log)?;
        warn!(rule = rule.log_id(), "rule failed: {}", log.message);
        Ok(log)
    }

    /// Load, change a copy, and save it with its history.
    ///
    /// Returns the before and after states, or `None` when `apply` left the
    /// ticket as it was.
    fn mutate<F>(
        &self,
        id: i64,
        actor: Actor,
        now: DateTime<Utc>,
        mut apply: F,
    ) -> Result<Option<(Ticket, Ticket)>, DeskError>
    where
        F: FnMut(&mut Ticket) -> Result<(), DeskError>,
    {
        let mut attempts = 0;

        loop {
            let before = self.storage.load_ticket(id)?;
            let mut after = before.clone();
            apply(&mut after)?;
            if after == before {
                return Ok(None);
            }

            after.updated_at = now;
            let history = HistoryRecord::diff(&before, &after, actor, now);

            match self.storage.save_ticket(&mut after, &history) {
                Ok(()) => return Ok(Some((before, after))),
                Err(DeskError::Conflict(_)) if attempts < self.automation.conflict_retries => {
                    attempts += 1;
                    debug!(ticket = id, attempts, "version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Dispatch `events` in order and return the ticket as it ends up.
    fn finish(&self, id: i64, events: Vec<Event>) -> Result<TicketOutcome, DeskError> {
        let mut logs = Vec::new();
        for event in &events {
            logs.extend(self.dispatch(event)?);
        }

        Ok(TicketOutcome {
            ticket: self.storage.load_ticket(id)?,
            events,
            logs,
        })
    }

    fn unchanged(&self, id: i64) -> Result<TicketOutcome, DeskError> {
        Ok(TicketOutcome {
            ticket: self.storage.load_ticket(id)?,
            events: Vec::new(),
            logs: Vec::new(),
        })
    }

    fn resolve_profile(&self, requested: Option<i64>) -> Result<Option<SlaProfile>, DeskError> {
        if let Some(id) = requested {
            if let Some(profile) = self.storage.load_sla_profile(id)? {
                return Ok(Some(profile));
            }
            warn!(profile = id, "SLA profile not found, falling back to the default");
            return self.storage.default_sla_profile()?.map(Some).ok_or_else(|| {
                DeskError::MissingSlaProfile(format!(
                    "profile {id} does not exist and no default profile is set"
                ))
            });
        }
        self.storage.default_sla_profile()
    }
}

fn breach_events(
    clocks: &[SlaClock],
    after: &Ticket,
    before: &Ticket,
    now: DateTime<Utc>,
) -> Vec<Event> {
    clocks
        .iter()
        .map(|clock| Event::sla_breach(*clock, after.clone(), before.clone(), now))
        .collect()
}
