//! Rule sets for import and export.
//!
//! Rules live in the database; a rule set is the portable YAML form used to
//! move them between desks or keep them under version control.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::rule::Rule;
use crate::error::DeskError;

/// Rule set for serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rules in this set
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Create a new rule set.
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build an export from stored rules, dropping per-desk state.
    #[must_use]
    pub fn export(rules: impl IntoIterator<Item = Rule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.id = None;
                rule.last_run_at = None;
                rule.created_at = None;
                rule
            })
            .collect();
        Self { rules }
    }

    /// Add a rule.
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Validate every rule and its action.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, naming the offending rule.
    pub fn validate(&self) -> Result<(), DeskError> {
        for rule in &self.rules {
            rule.validate()
                .and_then(|()| rule.action.validate())
                .map_err(|e| DeskError::InvalidArgument(format!("rule '{}': {e}", rule.name)))?;
        }
        Ok(())
    }

    /// Export to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, DeskError> {
        serde_yaml::to_string(self)
            .map_err(|e| DeskError::Config(format!("Failed to serialize rules: {e}")))
    }

    /// Import from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_yaml(yaml: &str) -> Result<Self, DeskError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DeskError::Config(format!("Failed to parse rules: {e}")))
    }

    /// Read and validate a rule set file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_file(path: &Path) -> Result<Self, DeskError> {
        let yaml = fs::read_to_string(path).map_err(|e| {
            DeskError::Config(format!("Failed to read rule file {}: {e}", path.display()))
        })?;
        let set = Self::from_yaml(&yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Write the set to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_file(&self, path: &Path) -> Result<(), DeskError> {
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).map_err(|e| {
            DeskError::Config(format!("Failed to write rule file {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automation::{Action, Condition, TriggerType};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_rule_set() {
        let mut set = RuleSet::new();
        set.add(Rule::new("Rule 1", TriggerType::TicketCreated, Action::add_tag("new")));
        set.add(Rule::new("Rule 2", TriggerType::SlaBreach, Action::escalate()));

        let yaml = set.to_yaml().unwrap();
        assert!(yaml.contains("Rule 1"));
        assert!(yaml.contains("sla_breach"));

        let parsed = RuleSet::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_export_drops_desk_state() {
        let mut rule = Rule::new("Nightly", TriggerType::Scheduled, Action::escalate())
            .with_schedule("0 2 * * *");
        rule.id = Some(4);
        rule.last_run_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap());

        let set = RuleSet::export([rule]);
        assert_eq!(set.rules[0].id, None);
        assert_eq!(set.rules[0].last_run_at, None);
        assert_eq!(set.rules[0].schedule_cron.as_deref(), Some("0 2 * * *"));
    }

    #[test]
    fn test_hand_written_yaml() {
        let yaml = r#"
rules:
  - name: Tag VIP orgs
    trigger_type: ticket_created
    conditions:
      - field: organization_id
        operator: equals
        value: acme
    action:
      type: add_tag
      tag: vip
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        set.validate().unwrap();
        assert!(set.rules[0].is_active);
        assert_eq!(
            set.rules[0].conditions,
            vec![Condition::equals("organization_id", "acme")]
        );
    }

    #[test]
    fn test_file_round_trip_and_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rules.yaml");

        let mut set = RuleSet::new();
        set.add(Rule::new("Notify", TriggerType::TaskDue, Action::notify("{task_title} is due")));
        set.save_file(&path).unwrap();
        assert_eq!(RuleSet::load_file(&path).unwrap(), set);

        let bad = RuleSet {
            rules: vec![Rule::new("No cron", TriggerType::Scheduled, Action::escalate())],
        };
        bad.save_file(&path).unwrap();
        let err = RuleSet::load_file(&path).unwrap_err();
        assert!(err.to_string().contains("No cron"));
    }
}
