//! Core abstractions for deskflow.
//!
//! Time, business hours, and the collaborator traits the engine depends on.

mod calendar;
mod clock;
mod traits;

pub use calendar::BusinessCalendar;
pub use clock::{Clock, FixedClock, SystemClock};
pub use traits::{create_task_bounded, send_bounded, LogNotifier, Notifier, TaskCreator, TaskSpec};

#[cfg(test)]
pub use traits::MockNotifier;
