//! Automation rules.
//!
//! This module provides the event-driven rule engine:
//! - Rule definitions with a trigger, conditions and one action
//! - Condition evaluation against an event's ticket, task and previous state
//! - Action execution with one log entry per attempt
//! - Cron schedules for time-based rules
//! - YAML import and export of rule sets

pub mod action;
pub mod condition;
pub mod engine;
pub mod executor;
pub mod log;
pub mod rule;
pub mod schedule;
pub mod storage;

pub use action::{Action, ActionType, TemplateContext};
pub use condition::{Condition, ConditionField, ConditionOperator, ConditionValue, MatchContext};
pub use engine::{evaluate, match_rule, MatchOutcome, RuleEvaluation};
pub use executor::ActionExecutor;
pub use log::{AutomationLog, LogStatus, Target};
pub use rule::{Rule, TriggerType};
pub use storage::RuleSet;
