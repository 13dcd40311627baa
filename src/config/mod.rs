//! Configuration management for deskflow.
//!
//! This module handles loading configuration from `~/.deskflow/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{
    AutomationConfig, BusinessHoursConfig, ColorSetting, Config, GeneralConfig, SlaConfig,
};
