//! SLA profiles, deadlines, and compliance.
//!
//! A profile sets response and resolution targets; priority multipliers
//! scale them per ticket. Deadlines can be counted in plain calendar time or
//! in business time only.

pub mod calculator;
pub mod profile;

pub use calculator::{SlaCalculator, SlaDeadlines};
pub use profile::{SlaProfile, MAX_TARGET_MINUTES};
