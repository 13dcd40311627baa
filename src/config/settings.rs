//! Configuration settings for deskflow.
//!
//! Settings are loaded from `~/.deskflow/config.yaml`. Every key is optional.

use std::time::Duration as StdDuration;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::core::BusinessCalendar;
use crate::error::DeskError;
use crate::tickets::{NoReopenFromClosed, StatusMachine, Unrestricted};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Business-hours calendar.
    pub business_hours: BusinessHoursConfig,
    /// SLA and status machine settings.
    pub sla: SlaConfig,
    /// Automation engine settings.
    pub automation: AutomationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    pub default_output: OutputFormat,
    /// Color output setting.
    pub color: ColorSetting,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

/// Color output setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    /// Auto-detect based on terminal.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

/// Weekly business-hours template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHoursConfig {
    /// Offset from UTC the template is read in, in minutes.
    pub utc_offset_minutes: i32,
    /// Working weekdays, e.g. `mon`, `tuesday`.
    pub workdays: Vec<String>,
    /// Start of the working day, `HH:MM`.
    pub start: String,
    /// End of the working day, `HH:MM`, exclusive.
    pub end: String,
    /// Dates with no business hours.
    pub holidays: Vec<NaiveDate>,
}

/// SLA settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Allow moving a closed ticket back to an active status.
    pub allow_reopen_closed: bool,
    /// Stamp the first response when a ticket first leaves `open`.
    pub stamp_first_response_on_status_change: bool,
}

/// Automation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// How long a notification may take before it counts as failed.
    pub notifier_timeout_ms: u64,
    /// How long a rule's task creation may take before it counts as failed.
    pub task_timeout_ms: u64,
    /// Seconds between sweeps in `deskflow watch`.
    pub sweep_interval_secs: u64,
    /// Retries after an optimistic version conflict.
    pub conflict_retries: u32,
    /// Channel used by notifications that name none.
    pub default_channel: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Pretty,
            color: ColorSetting::Auto,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            workdays: ["mon", "tue", "wed", "thu", "fri"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            start: "09:00".to_string(),
            end: "17:00".to_string(),
            holidays: Vec::new(),
        }
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            allow_reopen_closed: true,
            stamp_first_response_on_status_change: true,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            notifier_timeout_ms: 5_000,
            task_timeout_ms: 5_000,
            sweep_interval_secs: 60,
            conflict_retries: 3,
            default_channel: "email".to_string(),
        }
    }
}

impl BusinessHoursConfig {
    /// Build the calendar.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Config` for unparseable days, times or offsets,
    /// and for an empty template.
    pub fn to_calendar(&self) -> Result<BusinessCalendar, DeskError> {
        let workdays = self
            .workdays
            .iter()
            .map(|d| {
                d.parse::<Weekday>()
                    .map_err(|_| DeskError::Config(format!("unknown weekday '{d}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let offset = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .ok_or_else(|| {
                DeskError::Config(format!(
                    "UTC offset of {} minutes is out of range",
                    self.utc_offset_minutes
                ))
            })?;

        let calendar =
            BusinessCalendar::new(workdays, parse_time(&self.start)?, parse_time(&self.end)?, offset)?;
        Ok(calendar.with_holidays(self.holidays.iter().copied()))
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, DeskError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|_| DeskError::Config(format!("invalid time of day '{value}', expected HH:MM")))
}

impl SlaConfig {
    /// The status machine these settings describe.
    #[must_use]
    pub fn status_machine(&self) -> StatusMachine {
        if self.allow_reopen_closed {
            StatusMachine::new(Box::new(Unrestricted), self.stamp_first_response_on_status_change)
        } else {
            StatusMachine::new(
                Box::new(NoReopenFromClosed),
                self.stamp_first_response_on_status_change,
            )
        }
    }
}

impl AutomationConfig {
    #[must_use]
    pub const fn notifier_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.notifier_timeout_ms)
    }

    #[must_use]
    pub const fn task_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.task_timeout_ms)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, DeskError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, DeskError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            DeskError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            DeskError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), DeskError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| DeskError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            DeskError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<(), DeskError> {
        self.business_hours.to_calendar()?;

        if self.automation.notifier_timeout_ms == 0 {
            return Err(DeskError::Config(
                "automation.notifier_timeout_ms must be positive".to_string(),
            ));
        }
        if self.automation.task_timeout_ms == 0 {
            return Err(DeskError::Config(
                "automation.task_timeout_ms must be positive".to_string(),
            ));
        }
        if self.automation.sweep_interval_secs == 0 {
            return Err(DeskError::Config(
                "automation.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
