//! SLA deadline calculation and compliance tracking.
//!
//! Both deadlines are measured from ticket creation. Met flags are
//! tri-state and only move from unknown to decided; once decided they stay
//! put until the deadlines are recomputed from scratch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::SlaProfile;
use crate::core::BusinessCalendar;
use crate::error::DeskError;
use crate::tickets::{SlaClock, Ticket};

/// Computed deadlines for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaDeadlines {
    pub response_due: DateTime<Utc>,
    pub resolution_due: DateTime<Utc>,
}

/// Computes deadlines and evaluates met/breached state.
#[derive(Debug, Clone, Default)]
pub struct SlaCalculator {
    calendar: BusinessCalendar,
}

impl SlaCalculator {
    #[must_use]
    pub const fn new(calendar: BusinessCalendar) -> Self {
        Self { calendar }
    }

    #[must_use]
    pub const fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    /// Deadlines for `ticket` under `profile`.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidArgument` if the profile does not validate
    /// or a deadline falls outside the representable range.
    pub fn compute_deadlines(
        &self,
        ticket: &Ticket,
        profile: &SlaProfile,
    ) -> Result<SlaDeadlines, DeskError> {
        profile.validate()?;
        let response = profile.effective_response(ticket.priority);
        let resolution = profile.effective_resolution(ticket.priority);

        if profile.business_hours_only {
            return Ok(SlaDeadlines {
                response_due: self.calendar.add_business_time(ticket.created_at, response),
                resolution_due: self.calendar.add_business_time(ticket.created_at, resolution),
            });
        }

        let due = |span| {
            ticket.created_at.checked_add_signed(span).ok_or_else(|| {
                DeskError::InvalidArgument(format!(
                    "SLA profile '{}' puts a deadline out of range",
                    profile.name
                ))
            })
        };
        Ok(SlaDeadlines {
            response_due: due(response)?,
            resolution_due: due(resolution)?,
        })
    }

    /// Bind `ticket` to `profile`, recomputing deadlines from scratch.
    ///
    /// This is the only path that clears decided met flags. The ticket is
    /// left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::compute_deadlines`].
    pub fn apply_deadlines(
        &self,
        ticket: &mut Ticket,
        profile: &SlaProfile,
    ) -> Result<SlaDeadlines, DeskError> {
        let deadlines = self.compute_deadlines(ticket, profile)?;
        ticket.sla_profile_id = Some(profile.id);
        ticket.sla_response_due = Some(deadlines.response_due);
        ticket.sla_resolution_due = Some(deadlines.resolution_due);
        ticket.sla_response_met = None;
        ticket.sla_resolution_met = None;
        Ok(deadlines)
    }

    /// Decide any undecided met flags as of `now`.
    ///
    /// Returns the clocks that were newly marked as breached; each one should
    /// produce an `sla_breach` event.
    pub fn evaluate_compliance(&self, ticket: &mut Ticket, now: DateTime<Utc>) -> Vec<SlaClock> {
        let mut breaches = Vec::new();

        if let Some(met) = decide(
            ticket.sla_response_met,
            ticket.first_response_at,
            ticket.sla_response_due,
            now,
        ) {
            ticket.sla_response_met = Some(met);
            if !met {
                breaches.push(SlaClock::Response);
            }
        }

        if let Some(met) = decide(
            ticket.sla_resolution_met,
            ticket.resolved_at,
            ticket.sla_resolution_due,
            now,
        ) {
            ticket.sla_resolution_met = Some(met);
            if !met {
                breaches.push(SlaClock::Resolution);
            }
        }

        breaches
    }
}

/// The new value of one met flag, or `None` if it should not change.
fn decide(
    current: Option<bool>,
    milestone: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<bool> {
    if current.is_some() {
        return None;
    }
    let due = due?;
    match milestone {
        Some(at) => Some(at <= due),
        None if now > due => Some(false),
        None => None,
    }
}
