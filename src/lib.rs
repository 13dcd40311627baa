//! deskflow - SLA deadlines and automation rules for a helpdesk
//!
//! This crate computes response and resolution deadlines for tickets,
//! tracks whether they were met, and runs automation rules when tickets
//! change, deadlines breach, tasks fall due, or cron schedules fire.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod desk;
pub mod error;
pub mod features;
pub mod output;
pub mod storage;
pub mod tickets;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use desk::Desk;
pub use error::DeskError;
