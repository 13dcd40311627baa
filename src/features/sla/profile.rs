//! SLA profiles.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::tickets::Priority;

/// Response and resolution targets with per-priority multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaProfile {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub response_time_minutes: i64,
    pub resolution_time_minutes: i64,
    #[serde(default)]
    pub business_hours_only: bool,
    /// Missing priorities use a multiplier of 1.0
    #[serde(default)]
    pub priority_multipliers: BTreeMap<Priority, f64>,
    #[serde(default)]
    pub is_default: bool,
}

impl SlaProfile {
    /// Create a profile with no multipliers.
    #[must_use]
    pub fn new(name: impl Into<String>, response_minutes: i64, resolution_minutes: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            response_time_minutes: response_minutes,
            resolution_time_minutes: resolution_minutes,
            business_hours_only: false,
            priority_multipliers: BTreeMap::new(),
            is_default: false,
        }
    }

    /// The usual low=2, medium=1, high=0.5, critical=0.25 scale.
    #[must_use]
    pub fn with_standard_multipliers(mut self) -> Self {
        self.priority_multipliers = BTreeMap::from([
            (Priority::Low, 2.0),
            (Priority::Medium, 1.0),
            (Priority::High, 0.5),
            (Priority::Critical, 0.25),
        ]);
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, priority: Priority, multiplier: f64) -> Self {
        self.priority_multipliers.insert(priority, multiplier);
        self
    }

    #[must_use]
    pub const fn business_hours(mut self, only: bool) -> Self {
        self.business_hours_only = only;
        self
    }

    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    #[must_use]
    pub fn multiplier(&self, priority: Priority) -> f64 {
        self.priority_multipliers
            .get(&priority)
            .copied()
            .unwrap_or(1.0)
    }

    /// Response target for `priority`, rounded to the second.
    #[must_use]
    pub fn effective_response(&self, priority: Priority) -> Duration {
        scaled(self.response_time_minutes, self.multiplier(priority))
    }

    /// Resolution target for `priority`, rounded to the second.
    #[must_use]
    pub fn effective_resolution(&self, priority: Priority) -> Duration {
        scaled(self.resolution_time_minutes, self.multiplier(priority))
    }

    /// Check targets and multipliers are usable.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidArgument` for negative or non-finite values,
    /// and for targets that scale past [`MAX_TARGET_MINUTES`].
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), DeskError> {
        if self.name.trim().is_empty() {
            return Err(DeskError::InvalidArgument(
                "SLA profile name must not be empty".to_string(),
            ));
        }
        if self.response_time_minutes < 0 || self.resolution_time_minutes < 0 {
            return Err(DeskError::InvalidArgument(format!(
                "SLA profile '{}' has a negative target",
                self.name
            )));
        }
        if let Some((priority, m)) = self
            .priority_multipliers
            .iter()
            .find(|(_, m)| !m.is_finite() || **m < 0.0)
        {
            return Err(DeskError::InvalidArgument(format!(
                "SLA profile '{}' has invalid multiplier {m} for {priority}",
                self.name
            )));
        }

        let longest = Priority::ALL
            .into_iter()
            .map(|p| self.multiplier(p))
            .fold(0.0_f64, f64::max);
        for (label, minutes) in [
            ("response", self.response_time_minutes),
            ("resolution", self.resolution_time_minutes),
        ] {
            if minutes as f64 * longest > MAX_TARGET_MINUTES as f64 {
                return Err(DeskError::InvalidArgument(format!(
                    "SLA profile '{}' has a {label} target over {MAX_TARGET_MINUTES} minutes",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Longest effective target a profile may produce: ten years.
pub const MAX_TARGET_MINUTES: i64 = 10 * 365 * 24 * 60;

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn scaled(minutes: i64, multiplier: f64) -> Duration {
    let seconds = (minutes as f64 * multiplier.max(0.0) * 60.0).round();
    Duration::try_seconds(seconds as i64).unwrap_or(Duration::MAX)
}
