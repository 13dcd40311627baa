//! Actions for automation rules.
//!
//! Each rule carries exactly one action. Text fields may use the template
//! variables `{ticket_number}`, `{title}`, `{priority}`, `{status}`,
//! `{task_title}` and `{rule}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::tickets::{Priority, Task, Ticket, TicketStatus};

/// An action to perform when a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Assign to an agent, who must exist
    Assign { assignee_id: String },
    /// Move through the status machine
    ChangeStatus { status: TicketStatus },
    ChangePriority { priority: Priority },
    /// Add a tag; skipped when already present
    AddTag { tag: String },
    /// Send a message through the notifier
    SendNotification {
        /// Defaults to the configured channel
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        /// Defaults to the assignee of the target
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
        message: String,
    },
    /// Create a follow-up task linked to the ticket
    CreateTask {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_in_minutes: Option<i64>,
    },
    /// Reassign and/or raise priority.
    ///
    /// With an explicit `priority` the ticket is raised to that level (never
    /// lowered); otherwise it goes up one step unless `raise_priority` is off.
    Escalate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
        #[serde(default = "default_raise")]
        raise_priority: bool,
    },
}

const fn default_raise() -> bool {
    true
}

impl Action {
    /// Create an add tag action.
    #[must_use]
    pub fn add_tag(tag: impl Into<String>) -> Self {
        Self::AddTag { tag: tag.into() }
    }

    /// Create an assign action.
    #[must_use]
    pub fn assign(assignee_id: impl Into<String>) -> Self {
        Self::Assign {
            assignee_id: assignee_id.into(),
        }
    }

    /// Create a notification action using the default channel and recipient.
    #[must_use]
    pub fn notify(message: impl Into<String>) -> Self {
        Self::SendNotification {
            channel: None,
            recipient: None,
            message: message.into(),
        }
    }

    /// Escalate by raising priority one step.
    #[must_use]
    pub const fn escalate() -> Self {
        Self::Escalate {
            assignee_id: None,
            priority: None,
            raise_priority: true,
        }
    }

    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::Assign { .. } => ActionType::Assign,
            Self::ChangeStatus { .. } => ActionType::ChangeStatus,
            Self::ChangePriority { .. } => ActionType::ChangePriority,
            Self::AddTag { .. } => ActionType::AddTag,
            Self::SendNotification { .. } => ActionType::SendNotification,
            Self::CreateTask { .. } => ActionType::CreateTask,
            Self::Escalate { .. } => ActionType::Escalate,
        }
    }

    /// Whether the action can run against a task instead of a ticket.
    #[must_use]
    pub const fn supports_tasks(&self) -> bool {
        matches!(
            self,
            Self::Assign { .. }
                | Self::ChangePriority { .. }
                | Self::SendNotification { .. }
                | Self::CreateTask { .. }
        )
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::InvalidArgument` for empty required values.
    pub fn validate(&self) -> Result<(), DeskError> {
        let empty = |what: &str| {
            Err(DeskError::InvalidArgument(format!(
                "{} action needs a non-empty {what}",
                self.action_type()
            )))
        };

        match self {
            Self::Assign { assignee_id } if assignee_id.trim().is_empty() => empty("assignee_id"),
            Self::AddTag { tag } if tag.trim().is_empty() => empty("tag"),
            Self::SendNotification { message, .. } if message.trim().is_empty() => {
                empty("message")
            }
            Self::CreateTask { title, .. } if title.trim().is_empty() => empty("title"),
            Self::CreateTask {
                due_in_minutes: Some(m),
                ..
            } if *m < 0 => Err(DeskError::InvalidArgument(
                "create_task due_in_minutes must not be negative".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Types of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Assign,
    ChangeStatus,
    ChangePriority,
    AddTag,
    SendNotification,
    CreateTask,
    Escalate,
}

impl ActionType {
    pub const ALL: [Self; 7] = [
        Self::Assign,
        Self::ChangeStatus,
        Self::ChangePriority,
        Self::AddTag,
        Self::SendNotification,
        Self::CreateTask,
        Self::Escalate,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::ChangeStatus => "change_status",
            Self::ChangePriority => "change_priority",
            Self::AddTag => "add_tag",
            Self::SendNotification => "send_notification",
            Self::CreateTask => "create_task",
            Self::Escalate => "escalate",
        }
    }

    /// Get display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Assign => "Assign",
            Self::ChangeStatus => "Change Status",
            Self::ChangePriority => "Change Priority",
            Self::AddTag => "Add Tag",
            Self::SendNotification => "Send Notification",
            Self::CreateTask => "Create Task",
            Self::Escalate => "Escalate",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| DeskError::Parse(format!("unknown action type: {s}")))
    }
}

/// Values available to message and title templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub rule_name: &'a str,
    pub ticket: Option<&'a Ticket>,
    pub task: Option<&'a Task>,
}

impl TemplateContext<'_> {
    /// Replace known `{variables}`; unknown ones are left as written.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let mut result = template.replace("{rule}", self.rule_name);

        if let Some(ticket) = self.ticket {
            result = result
                .replace("{ticket_number}", &ticket.ticket_number.to_string())
                .replace("{title}", &ticket.title)
                .replace("{priority}", ticket.priority.as_str())
                .replace("{status}", ticket.status.as_str());
        }

        if let Some(task) = self.task {
            result = result.replace("{task_title}", &task.title);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_tagged_serialization() {
        let action = Action::add_tag("vip");
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"type":"add_tag","tag":"vip"}"#);

        let notify = Action::notify("Ticket {ticket_number} breached");
        let json = serde_json::to_string(&notify).unwrap();
        assert!(!json.contains("channel"));
    }

    #[test]
    fn test_escalate_defaults() {
        let action: Action = serde_yaml::from_str("type: escalate\n").unwrap();
        assert_eq!(action, Action::escalate());

        let action: Action =
            serde_yaml::from_str("type: escalate\npriority: critical\nassignee_id: lead\n")
                .unwrap();
        assert!(matches!(
            action,
            Action::Escalate {
                priority: Some(Priority::Critical),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_action_type_rejected() {
        let result: Result<Action, _> = serde_json::from_str(r#"{"type":"shell","command":"ls"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_action_type_names() {
        for t in ActionType::ALL {
            assert_eq!(t.as_str().parse::<ActionType>().unwrap(), t);
        }
        assert_eq!(
            Action::assign("a").action_type().display_name(),
            "Assign"
        );
        assert!("send-notification".parse::<ActionType>().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(Action::add_tag("x").validate().is_ok());
        assert!(Action::add_tag("  ").validate().is_err());
        assert!(Action::assign("").validate().is_err());
        let task = Action::CreateTask {
            title: "Call back".to_string(),
            description: None,
            priority: None,
            assignee_id: None,
            due_in_minutes: Some(-5),
        };
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_supports_tasks() {
        assert!(Action::notify("hi").supports_tasks());
        assert!(!Action::add_tag("x").supports_tasks());
        assert!(!Action::escalate().supports_tasks());
    }

    #[test]
    fn test_template_render() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut ticket = Ticket::new("Printer on fire", Priority::Critical, now);
        ticket.ticket_number = 1007;

        let ctx = TemplateContext {
            rule_name: "Breach alert",
            ticket: Some(&ticket),
            task: None,
        };
        assert_eq!(
            ctx.render("[{rule}] #{ticket_number} {title} ({priority}, {status}) {task_title}"),
            "[Breach alert] #1007 Printer on fire (critical, open) {task_title}"
        );
    }
}
