//! Ticket status machine.
//!
//! Any status may move to any other unless a [`TransitionPolicy`] says
//! otherwise. The machine stamps the timestamps the SLA calculator relies on:
//! - entering resolved/closed sets `resolved_at` once
//! - leaving resolved/closed for an active status clears `resolved_at` and
//!   resets `sla_resolution_met`; the resolution deadline is kept
//! - leaving open (optionally) counts as the first response

use chrono::{DateTime, Utc};

use super::event::Event;
use super::types::{Ticket, TicketStatus};
use crate::error::DeskError;

/// Decides which transitions are allowed.
pub trait TransitionPolicy: Send + Sync {
    /// # Errors
    ///
    /// Returns `DeskError::InvalidTransition` to reject the move.
    fn check(&self, from: TicketStatus, to: TicketStatus) -> Result<(), DeskError>;
}

/// Every transition is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl TransitionPolicy for Unrestricted {
    fn check(&self, _from: TicketStatus, _to: TicketStatus) -> Result<(), DeskError> {
        Ok(())
    }
}

/// Closed tickets stay closed; only resolved tickets may be reopened.
///
/// Any move out of closed is rejected, including back to resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReopenFromClosed;

impl TransitionPolicy for NoReopenFromClosed {
    fn check(&self, from: TicketStatus, to: TicketStatus) -> Result<(), DeskError> {
        if from == TicketStatus::Closed && to != TicketStatus::Closed {
            return Err(DeskError::InvalidTransition {
                from,
                to,
                reason: "closed tickets cannot be reopened".to_string(),
            });
        }
        Ok(())
    }
}

/// Applies status changes and first-response stamps to tickets.
pub struct StatusMachine {
    policy: Box<dyn TransitionPolicy>,
    stamp_first_response: bool,
}

impl StatusMachine {
    #[must_use]
    pub fn new(policy: Box<dyn TransitionPolicy>, stamp_first_response: bool) -> Self {
        Self {
            policy,
            stamp_first_response,
        }
    }

    /// Move `ticket` to `to`.
    ///
    /// Returns the `status_changed` event, or `None` when the ticket is
    /// already in that status.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidTransition` if the policy rejects the move;
    /// the ticket is left untouched.
    pub fn transition(
        &self,
        ticket: &mut Ticket,
        to: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, DeskError> {
        let from = ticket.status;
        if from == to {
            return Ok(None);
        }
        self.policy.check(from, to)?;

        let previous = ticket.clone();
        ticket.status = to;

        if from.is_terminal() && to.is_active() {
            ticket.resolved_at = None;
            ticket.sla_resolution_met = None;
        }
        if to.is_terminal() && ticket.resolved_at.is_none() {
            ticket.resolved_at = Some(now);
        }
        if self.stamp_first_response && from == TicketStatus::Open {
            Self::mark_first_response(ticket, now);
        }
        ticket.updated_at = now;

        Ok(Some(Event::status_changed(ticket.clone(), previous, now)))
    }

    /// Record the first agent response. Later calls have no effect.
    ///
    /// Returns `true` if the timestamp was set by this call.
    pub fn mark_first_response(ticket: &mut Ticket, now: DateTime<Utc>) -> bool {
        if ticket.first_response_at.is_some() {
            return false;
        }
        ticket.first_response_at = Some(now);
        ticket.updated_at = now;
        true
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new(Box::new(Unrestricted), true)
    }
}
