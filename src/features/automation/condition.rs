//! Conditions for automation rules.
//!
//! A condition is a `(field, operator, value)` triple. Field and operator are
//! kept as text so a rule with a typo still loads; they are parsed when the
//! condition is evaluated and reported as `MalformedRuleCondition`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::tickets::{Event, EventKind, Priority, Task, Ticket};

/// A condition for rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Field to evaluate
    pub field: String,
    /// Comparison operator
    pub operator: String,
    /// Value to compare against
    #[serde(default)]
    pub value: ConditionValue,
}

impl Condition {
    /// Create a new condition.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
        }
    }

    /// Create an equals condition.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, ConditionOperator::Equals, value)
    }

    /// Create a "changed to" condition.
    #[must_use]
    pub fn changed_to(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, ConditionOperator::ChangedTo, value)
    }

    /// Create a tag contains condition.
    #[must_use]
    pub fn has_tag(tag: impl Into<String>) -> Self {
        Self::new("tags", ConditionOperator::Contains, tag.into())
    }

    /// Resolve the field and operator names.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MalformedRuleCondition` for unknown names.
    pub fn parse(&self) -> Result<(ConditionField, ConditionOperator), DeskError> {
        Ok((self.field.parse()?, self.operator.parse()?))
    }

    /// Evaluate the condition against a context.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::MalformedRuleCondition` for unknown names.
    pub fn evaluate(&self, context: &MatchContext<'_>) -> Result<bool, DeskError> {
        let (field, operator) = self.parse()?;
        let current = field.value(context, Side::Current);

        let result = match operator {
            ConditionOperator::Equals => values_equal(&current, &self.value),
            ConditionOperator::NotEquals => !values_equal(&current, &self.value),
            ConditionOperator::GreaterThan => {
                matches!((field.rank(&current), field.rank(&self.value)), (Some(a), Some(b)) if a > b)
            }
            ConditionOperator::LessThan => {
                matches!((field.rank(&current), field.rank(&self.value)), (Some(a), Some(b)) if a < b)
            }
            ConditionOperator::Contains => contains(&current, &self.value),
            ConditionOperator::NotContains => !contains(&current, &self.value),
            ConditionOperator::IsEmpty => is_empty(&current),
            ConditionOperator::IsNotEmpty => !is_empty(&current),
            ConditionOperator::Changed
            | ConditionOperator::ChangedFrom
            | ConditionOperator::ChangedTo => {
                let Some(_) = context.previous else {
                    return Ok(false);
                };
                let before = field.value(context, Side::Previous);
                let changed = !values_equal(&before, &current);
                match operator {
                    ConditionOperator::ChangedFrom => changed && values_equal(&before, &self.value),
                    ConditionOperator::ChangedTo => changed && values_equal(&current, &self.value),
                    _ => changed,
                }
            }
        };

        Ok(result)
    }
}

/// What a condition is evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    pub ticket: Option<&'a Ticket>,
    pub previous: Option<&'a Ticket>,
    pub task: Option<&'a Task>,
    pub event: Option<&'a EventKind>,
}

impl<'a> MatchContext<'a> {
    #[must_use]
    pub const fn for_ticket(ticket: &'a Ticket) -> Self {
        Self {
            ticket: Some(ticket),
            previous: None,
            task: None,
            event: None,
        }
    }

    #[must_use]
    pub fn from_event(event: &'a Event) -> Self {
        Self {
            ticket: event.ticket.as_ref(),
            previous: event.previous.as_ref(),
            task: event.task.as_ref(),
            event: Some(&event.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Current,
    Previous,
}

/// Fields that can be used in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionField {
    Status,
    Priority,
    Title,
    TicketNumber,
    AssigneeId,
    OrganizationId,
    SlaProfileId,
    Tags,
    SlaResponseMet,
    SlaResolutionMet,
    SlaResponseDue,
    SlaResolutionDue,
    FirstResponseAt,
    ResolvedAt,
    CreatedAt,
    /// Which clock breached, on `sla_breach` events
    BreachedClock,
    TaskTitle,
    TaskStatus,
    TaskPriority,
    TaskAssigneeId,
}

impl ConditionField {
    const NAMES: [(&'static str, Self); 20] = [
        ("status", Self::Status),
        ("priority", Self::Priority),
        ("title", Self::Title),
        ("ticket_number", Self::TicketNumber),
        ("assignee_id", Self::AssigneeId),
        ("organization_id", Self::OrganizationId),
        ("sla_profile_id", Self::SlaProfileId),
        ("tags", Self::Tags),
        ("sla_response_met", Self::SlaResponseMet),
        ("sla_resolution_met", Self::SlaResolutionMet),
        ("sla_response_due", Self::SlaResponseDue),
        ("sla_resolution_due", Self::SlaResolutionDue),
        ("first_response_at", Self::FirstResponseAt),
        ("resolved_at", Self::ResolvedAt),
        ("created_at", Self::CreatedAt),
        ("breached_clock", Self::BreachedClock),
        ("task_title", Self::TaskTitle),
        ("task_status", Self::TaskStatus),
        ("task_priority", Self::TaskPriority),
        ("task_assignee_id", Self::TaskAssigneeId),
    ];

    fn value(self, context: &MatchContext<'_>, side: Side) -> ConditionValue {
        let ticket = match side {
            Side::Current => context.ticket,
            Side::Previous => context.previous,
        };

        match self {
            Self::BreachedClock => match context.event {
                Some(EventKind::SlaBreach { clock }) => clock.as_str().into(),
                _ => ConditionValue::Null,
            },
            Self::TaskTitle => context.task.map(|t| t.title.clone()).into(),
            Self::TaskStatus => context.task.map(|t| t.status.to_string()).into(),
            Self::TaskPriority => context.task.map(|t| t.priority.to_string()).into(),
            Self::TaskAssigneeId => context.task.and_then(|t| t.assignee_id.clone()).into(),
            _ => ticket.map_or(ConditionValue::Null, |t| self.ticket_value(t)),
        }
    }

    fn ticket_value(self, ticket: &Ticket) -> ConditionValue {
        let timestamp = |v: Option<DateTime<Utc>>| ConditionValue::from(v.map(|d| d.to_rfc3339()));

        match self {
            Self::Status => ticket.status.as_str().into(),
            Self::Priority => ticket.priority.as_str().into(),
            Self::Title => ticket.title.clone().into(),
            Self::TicketNumber => ticket.ticket_number.into(),
            Self::AssigneeId => ticket.assignee_id.clone().into(),
            Self::OrganizationId => ticket.organization_id.clone().into(),
            Self::SlaProfileId => ticket
                .sla_profile_id
                .map_or(ConditionValue::Null, ConditionValue::Integer),
            Self::Tags => ConditionValue::List(ticket.tags.clone()),
            Self::SlaResponseMet => ticket.sla_response_met.into(),
            Self::SlaResolutionMet => ticket.sla_resolution_met.into(),
            Self::SlaResponseDue => timestamp(ticket.sla_response_due),
            Self::SlaResolutionDue => timestamp(ticket.sla_resolution_due),
            Self::FirstResponseAt => timestamp(ticket.first_response_at),
            Self::ResolvedAt => timestamp(ticket.resolved_at),
            Self::CreatedAt => timestamp(Some(ticket.created_at)),
            Self::BreachedClock
            | Self::TaskTitle
            | Self::TaskStatus
            | Self::TaskPriority
            | Self::TaskAssigneeId => ConditionValue::Null,
        }
    }

    /// Ordering key for greater/less comparisons.
    fn rank(self, value: &ConditionValue) -> Option<i64> {
        match value {
            ConditionValue::Integer(n) => Some(*n),
            ConditionValue::String(s) => match self {
                Self::Priority | Self::TaskPriority => s.parse::<Priority>().ok().map(|p| p.rank()),
                Self::SlaResponseDue
                | Self::SlaResolutionDue
                | Self::FirstResponseAt
                | Self::ResolvedAt
                | Self::CreatedAt => DateTime::parse_from_rfc3339(s).ok().map(|d| d.timestamp()),
                _ => s.trim().parse().ok(),
            },
            _ => None,
        }
    }
}

impl FromStr for ConditionField {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, field)| *field)
            .ok_or_else(|| DeskError::MalformedRuleCondition(format!("unknown field '{s}'")))
    }
}

/// Comparison operators for conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    /// The field differs from the previous state
    Changed,
    /// The previous value matched and the field changed
    ChangedFrom,
    /// The field changed and now matches
    ChangedTo,
}

impl ConditionOperator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::Changed => "changed",
            Self::ChangedFrom => "changed_from",
            Self::ChangedTo => "changed_to",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOperator {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equals" | "eq" | "=" | "==" => Ok(Self::Equals),
            "not_equals" | "ne" | "!=" => Ok(Self::NotEquals),
            "greater_than" | "gt" | ">" => Ok(Self::GreaterThan),
            "less_than" | "lt" | "<" => Ok(Self::LessThan),
            "contains" => Ok(Self::Contains),
            "not_contains" => Ok(Self::NotContains),
            "is_empty" => Ok(Self::IsEmpty),
            "is_not_empty" => Ok(Self::IsNotEmpty),
            "changed" => Ok(Self::Changed),
            "changed_from" => Ok(Self::ChangedFrom),
            "changed_to" => Ok(Self::ChangedTo),
            _ => Err(DeskError::MalformedRuleCondition(format!(
                "unknown operator '{s}'"
            ))),
        }
    }
}

/// Values used in conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// No value
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// String value
    String(String),
    /// List of strings
    List(Vec<String>),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for ConditionValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for ConditionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

fn values_equal(a: &ConditionValue, b: &ConditionValue) -> bool {
    use ConditionValue as V;

    match (a, b) {
        (V::String(x), V::String(y)) => x.eq_ignore_ascii_case(y),
        (V::Integer(n), V::String(s)) | (V::String(s), V::Integer(n)) => {
            s.trim().parse::<i64>().is_ok_and(|parsed| parsed == *n)
        }
        (V::Boolean(flag), V::String(s)) | (V::String(s), V::Boolean(flag)) => {
            s.trim().parse::<bool>().is_ok_and(|parsed| parsed == *flag)
        }
        (V::List(x), V::List(y)) => {
            let mut x: Vec<String> = x.iter().map(|s| s.to_lowercase()).collect();
            let mut y: Vec<String> = y.iter().map(|s| s.to_lowercase()).collect();
            x.sort();
            y.sort();
            x == y
        }
        _ => a == b,
    }
}

fn contains(haystack: &ConditionValue, needle: &ConditionValue) -> bool {
    match (haystack, needle) {
        (ConditionValue::List(list), ConditionValue::String(item)) => {
            list.iter().any(|s| s.eq_ignore_ascii_case(item))
        }
        (ConditionValue::String(s), ConditionValue::String(part)) => {
            s.to_lowercase().contains(&part.to_lowercase())
        }
        _ => false,
    }
}

fn is_empty(value: &ConditionValue) -> bool {
    match value {
        ConditionValue::Null => true,
        ConditionValue::String(s) => s.is_empty(),
        ConditionValue::List(list) => list.is_empty(),
        ConditionValue::Boolean(_) | ConditionValue::Integer(_) => false,
    }
}
