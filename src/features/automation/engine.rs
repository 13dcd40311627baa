//! Rule evaluation.
//!
//! Matches rules against an event. Execution is left to the caller so every
//! match can be run and logged independently.

use tracing::{debug, warn};

use super::condition::MatchContext;
use super::rule::Rule;
use crate::tickets::Event;

/// How a candidate rule fared against an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NotMatched,
    /// A condition names an unknown field or operator
    Malformed(String),
}

/// One candidate rule and its outcome.
#[derive(Debug, Clone)]
pub struct RuleEvaluation<'r> {
    pub rule: &'r Rule,
    pub outcome: MatchOutcome,
}

impl RuleEvaluation<'_> {
    #[must_use]
    pub fn matched(&self) -> bool {
        self.outcome == MatchOutcome::Matched
    }
}

/// Evaluate `rules` against `event`.
///
/// Candidates are the active rules whose trigger type equals the event type.
/// Results are in ascending rule id order; non-candidates are left out.
#[must_use]
pub fn evaluate<'r>(event: &Event, rules: &'r [Rule]) -> Vec<RuleEvaluation<'r>> {
    let trigger = event.kind.trigger_type();
    let context = MatchContext::from_event(event);

    let mut candidates: Vec<&Rule> = rules
        .iter()
        .filter(|r| r.is_active && r.trigger_type == trigger)
        .collect();
    candidates.sort_by_key(|r| r.id.unwrap_or(i64::MAX));

    candidates
        .into_iter()
        .map(|rule| {
            let outcome = match_rule(rule, &context);
            debug!(rule = rule.log_id(), trigger = %trigger, ?outcome, "evaluated rule");
            RuleEvaluation { rule, outcome }
        })
        .collect()
}

/// Check one rule's conditions against a context.
#[must_use]
pub fn match_rule(rule: &Rule, context: &MatchContext<'_>) -> MatchOutcome {
    match rule.conditions_met(context) {
        Ok(true) => MatchOutcome::Matched,
        Ok(false) => MatchOutcome::NotMatched,
        Err(e) => {
            warn!(rule = rule.log_id(), error = %e, "malformed rule condition");
            MatchOutcome::Malformed(e.to_string())
        }
    }
}
