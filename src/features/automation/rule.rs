//! Automation rule definitions.
//!
//! A rule is a trigger, a list of conditions (all must hold), and one action.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::condition::{Condition, MatchContext};
use crate::error::DeskError;

/// An automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID; ascending order is creation order
    #[serde(default)]
    pub id: Option<i64>,
    /// Rule name
    pub name: String,
    /// Rule description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the rule takes part in evaluation
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Event category that makes the rule eligible
    pub trigger_type: TriggerType,
    /// Conditions that must all hold
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// What to do on a match
    pub action: Action,
    /// Cron expression, only for scheduled rules
    #[serde(default)]
    pub schedule_cron: Option<String>,
    /// Start of the last claimed schedule window
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl Rule {
    /// Create a new active rule.
    #[must_use]
    pub fn new(name: impl Into<String>, trigger_type: TriggerType, action: Action) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            is_active: true,
            trigger_type,
            conditions: Vec::new(),
            action,
            schedule_cron: None,
            last_run_at: None,
            created_at: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the cron schedule.
    #[must_use]
    pub fn with_schedule(mut self, cron: impl Into<String>) -> Self {
        self.schedule_cron = Some(cron.into());
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// ID for logs; unsaved rules report 0.
    #[must_use]
    pub fn log_id(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    /// Check if all conditions hold.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MalformedRuleCondition` if any condition names an
    /// unknown field or operator. Every condition is checked for validity,
    /// even after one evaluates false.
    pub fn conditions_met(&self, context: &MatchContext<'_>) -> Result<bool, DeskError> {
        let mut all = true;
        for condition in &self.conditions {
            if !condition.evaluate(context)? {
                all = false;
            }
        }
        Ok(all)
    }

    /// Check the rule definition is consistent.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidArgument` for a scheduled rule without a
    /// cron expression, and `MalformedRuleCondition` for bad conditions.
    pub fn validate(&self) -> Result<(), DeskError> {
        if self.name.trim().is_empty() {
            return Err(DeskError::InvalidArgument(
                "rule name must not be empty".to_string(),
            ));
        }
        if self.trigger_type == TriggerType::Scheduled {
            let cron = self.schedule_cron.as_deref().ok_or_else(|| {
                DeskError::InvalidArgument(format!(
                    "scheduled rule '{}' needs a cron expression",
                    self.name
                ))
            })?;
            super::schedule::parse_schedule(cron)?;
        }
        for condition in &self.conditions {
            condition.parse()?;
        }
        Ok(())
    }
}

/// Event categories a rule can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    TicketCreated,
    TicketUpdated,
    StatusChanged,
    SlaBreach,
    /// Fired by the cron sweep, never by events
    Scheduled,
    TaskDue,
}

impl TriggerType {
    pub const ALL: [Self; 6] = [
        Self::TicketCreated,
        Self::TicketUpdated,
        Self::StatusChanged,
        Self::SlaBreach,
        Self::Scheduled,
        Self::TaskDue,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TicketCreated => "ticket_created",
            Self::TicketUpdated => "ticket_updated",
            Self::StatusChanged => "status_changed",
            Self::SlaBreach => "sla_breach",
            Self::Scheduled => "scheduled",
            Self::TaskDue => "task_due",
        }
    }

    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::TicketCreated => "Ticket Created",
            Self::TicketUpdated => "Ticket Updated",
            Self::StatusChanged => "Status Changed",
            Self::SlaBreach => "SLA Breach",
            Self::Scheduled => "Scheduled",
            Self::TaskDue => "Task Due",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| DeskError::Parse(format!("unknown trigger type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::{Priority, Ticket};
    use chrono::TimeZone;

    fn tag_action() -> Action {
        Action::AddTag {
            tag: "vip".to_string(),
        }
    }

    #[test]
    fn test_rule_builder() {
        let rule = Rule::new("Tag VIPs", TriggerType::TicketCreated, tag_action())
            .with_description("Tag tickets from the VIP org")
            .with_condition(Condition::equals("organization_id", "acme"));

        assert_eq!(rule.name, "Tag VIPs");
        assert!(rule.is_active);
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.log_id(), 0);
    }

    #[test]
    fn test_conditions_met_requires_all() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut ticket = Ticket::new("Disk full", Priority::Critical, now);
        ticket.organization_id = Some("acme".to_string());

        let rule = Rule::new("r", TriggerType::TicketCreated, tag_action())
            .with_condition(Condition::equals("priority", "critical"))
            .with_condition(Condition::equals("organization_id", "acme"));
        let ctx = MatchContext::for_ticket(&ticket);
        assert!(rule.conditions_met(&ctx).unwrap());

        let rule = rule.with_condition(Condition::equals("status", "closed"));
        assert!(!rule.conditions_met(&ctx).unwrap());
    }

    #[test]
    fn test_malformed_condition_reported_even_after_false() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let ticket = Ticket::new("Disk full", Priority::Low, now);

        let rule = Rule::new("r", TriggerType::TicketCreated, tag_action())
            .with_condition(Condition::equals("priority", "critical"))
            .with_condition(Condition::equals("colour", "red"));

        let err = rule
            .conditions_met(&MatchContext::for_ticket(&ticket))
            .unwrap_err();
        assert!(matches!(err, DeskError::MalformedRuleCondition(_)));
    }

    #[test]
    fn test_validate_scheduled_needs_cron() {
        let rule = Rule::new("nightly", TriggerType::Scheduled, tag_action());
        assert!(rule.validate().is_err());

        let rule = rule.with_schedule("0 2 * * *");
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_rule_yaml_shape() {
        let yaml = r#"
name: Escalate critical breaches
trigger_type: sla_breach
conditions:
  - field: priority
    operator: equals
    value: critical
action:
  type: escalate
  assignee_id: lead-1
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.trigger_type, TriggerType::SlaBreach);
        assert!(rule.is_active);
        assert_eq!(rule.conditions[0].field, "priority");
        assert!(matches!(rule.action, Action::Escalate { .. }));
    }

    #[test]
    fn test_trigger_type_parse() {
        for t in TriggerType::ALL {
            assert_eq!(t.as_str().parse::<TriggerType>().unwrap(), t);
        }
        assert!("on_fire".parse::<TriggerType>().is_err());
    }
}
