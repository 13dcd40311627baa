//! Feature implementations for deskflow.
//!
//! - SLA profiles, deadline computation and compliance checks
//! - Automation rules: evaluation, execution, schedules and rule sets

pub mod automation;
pub mod sla;
