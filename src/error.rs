//! Error types for deskflow.

use thiserror::Error;

use crate::tickets::TicketStatus;

/// Errors produced by the SLA and automation engine.
#[derive(Debug, Error)]
pub enum DeskError {
    /// The status machine rejected a transition.
    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
        reason: String,
    },

    /// Neither the referenced profile nor a default profile exists.
    #[error("No SLA profile available: {0}")]
    MissingSlaProfile(String),

    /// A rule condition names an unknown field or operator.
    #[error("Malformed rule condition: {0}")]
    MalformedRuleCondition(String),

    /// A rule action could not be applied.
    #[error("Action failed: {0}")]
    ActionExecutionFailure(String),

    /// The notifier collaborator failed or timed out.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// A concurrent writer changed the ticket first.
    #[error("Ticket {0} was modified concurrently")]
    Conflict(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeskError {
    /// Whether the error comes from the storage layer.
    ///
    /// Storage errors abort the enclosing ticket operation; everything else is
    /// contained per rule and recorded in the automation log.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Conflict(_) | Self::Io(_))
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for DeskError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
