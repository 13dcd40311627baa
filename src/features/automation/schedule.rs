//! Cron scheduling for `scheduled` rules.
//!
//! Everything here is a pure function of the expression, an anchor instant
//! and `now`, so it can be tested without a clock.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::DeskError;

/// Parse a cron expression.
///
/// Accepts standard five-field expressions (minute resolution) as well as the
/// six and seven field forms with seconds and year.
///
/// # Errors
///
/// Returns `DeskError::Parse` if the expression is invalid.
pub fn parse_schedule(expr: &str) -> Result<Schedule, DeskError> {
    let normalized = normalize_cron(expr);
    Schedule::from_str(&normalized)
        .map_err(|e| DeskError::Parse(format!("invalid cron expression '{expr}': {e}")))
}

fn normalize_cron(expr: &str) -> String {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    match parts.len() {
        5 => format!("0 {}", parts.join(" ")),
        _ => parts.join(" "),
    }
}

/// The first tick strictly after `anchor`.
///
/// # Errors
///
/// Returns `DeskError::Parse` if the expression is invalid.
pub fn next_due(expr: &str, anchor: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, DeskError> {
    Ok(parse_schedule(expr)?.after(&anchor).next())
}

/// The tick that makes a rule due at `now`, if any.
///
/// The anchor is the last claimed run, falling back to the rule's creation
/// time; a rule with neither is due immediately.
///
/// # Errors
///
/// Returns `DeskError::Parse` if the expression is invalid.
pub fn due_tick(
    expr: &str,
    last_run_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, DeskError> {
    let Some(anchor) = last_run_at.or(created_at) else {
        parse_schedule(expr)?;
        return Ok(Some(now));
    };

    Ok(next_due(expr, anchor)?.filter(|tick| *tick <= now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_five_and_six_field_expressions() {
        assert!(parse_schedule("0 2 * * *").is_ok());
        assert!(parse_schedule("30 0 2 * * *").is_ok());
        assert!(parse_schedule("0 0 2 * * * 2024").is_ok());
        assert!(parse_schedule("every tuesday").is_err());
    }

    #[test]
    fn test_next_due() {
        let next = next_due("0 2 * * *", at(1, 3, 0)).unwrap();
        assert_eq!(next, Some(at(2, 2, 0)));

        // Strictly after the anchor
        let next = next_due("0 2 * * *", at(2, 2, 0)).unwrap();
        assert_eq!(next, Some(at(3, 2, 0)));
    }

    #[test]
    fn test_due_tick_uses_last_run_then_created() {
        let cron = "*/15 * * * *";
        let created = at(1, 9, 0);

        // Not yet due
        assert_eq!(due_tick(cron, None, Some(created), at(1, 9, 10)).unwrap(), None);
        // First window from creation
        assert_eq!(
            due_tick(cron, None, Some(created), at(1, 9, 20)).unwrap(),
            Some(at(1, 9, 15))
        );
        // Claimed at 09:20, next window is 09:30
        let claimed = at(1, 9, 20);
        assert_eq!(due_tick(cron, Some(claimed), Some(created), at(1, 9, 25)).unwrap(), None);
        assert!(due_tick(cron, Some(claimed), Some(created), at(1, 9, 30))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_missed_windows_fire_once() {
        let cron = "0 * * * *";
        let last = at(1, 9, 0);
        let now = last + Duration::hours(5);
        // Five missed ticks still yield a single due tick
        assert_eq!(due_tick(cron, Some(last), None, now).unwrap(), Some(at(1, 10, 0)));
    }

    #[test]
    fn test_no_anchor_is_due_now() {
        let now = at(3, 12, 0);
        assert_eq!(due_tick("0 2 * * *", None, None, now).unwrap(), Some(now));
        assert!(due_tick("bogus", None, None, now).is_err());
    }
}
