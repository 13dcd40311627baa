//! Collaborator interfaces used by the engine.
//!
//! Notification delivery and task creation live outside the SLA core. The
//! engine talks to them through these traits so they can be swapped or
//! mocked.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DeskError;
use crate::tickets::Priority;

/// Delivers notifications. Best-effort.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Send `message` to `recipient` over `channel`.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Notification` if delivery fails.
    fn send(&self, channel: &str, recipient: &str, message: &str) -> Result<(), DeskError>;
}

/// Notifier that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, channel: &str, recipient: &str, message: &str) -> Result<(), DeskError> {
        info!(channel, recipient, "notification: {message}");
        Ok(())
    }
}

/// Run `call` on its own thread and wait at most `timeout` for it.
///
/// A call that hangs is abandoned; the outer error describes why no result
/// arrived.
fn call_bounded<T, F>(timeout: Duration, call: F) -> Result<Result<T, DeskError>, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DeskError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(call());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(format!("timed out after {}ms", timeout.as_millis()))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err("exited without a result".to_string()),
    }
}

/// Send through `notifier`, giving up after `timeout`.
///
/// # Errors
///
/// Returns `DeskError::Notification` on failure or timeout.
pub fn send_bounded(
    notifier: &Arc<dyn Notifier>,
    channel: &str,
    recipient: &str,
    message: &str,
    timeout: Duration,
) -> Result<(), DeskError> {
    let notifier = Arc::clone(notifier);
    let (channel, recipient, message) = (
        channel.to_string(),
        recipient.to_string(),
        message.to_string(),
    );

    call_bounded(timeout, move || notifier.send(&channel, &recipient, &message))
        .map_err(|reason| DeskError::Notification(format!("notifier {reason}")))?
}

/// Create a task through `tasks`, giving up after `timeout`.
///
/// The task creator sits outside the ticket transaction, so every failure,
/// storage errors included, comes back as an action failure.
///
/// # Errors
///
/// Returns `DeskError::ActionExecutionFailure` on failure or timeout.
pub fn create_task_bounded(
    tasks: &Arc<dyn TaskCreator>,
    spec: &TaskSpec,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Result<i64, DeskError> {
    let tasks = Arc::clone(tasks);
    let spec = spec.clone();

    match call_bounded(timeout, move || tasks.create_task(&spec, now)) {
        Ok(Ok(id)) => Ok(id),
        Ok(Err(e)) => Err(DeskError::ActionExecutionFailure(format!(
            "task creation failed: {e}"
        ))),
        Err(reason) => Err(DeskError::ActionExecutionFailure(format!(
            "task creation {reason}"
        ))),
    }
}

/// What to create when a rule asks for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Ticket the task belongs to
    pub ticket_id: Option<i64>,
    /// Task title
    pub title: String,
    /// Longer description
    pub description: Option<String>,
    /// Task priority
    pub priority: Priority,
    /// Assignee
    pub assignee_id: Option<String>,
    /// When the task is due
    pub due_at: Option<DateTime<Utc>>,
}

/// Creates tasks on behalf of automation rules.
pub trait TaskCreator: Send + Sync {
    /// Create a task and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be stored.
    fn create_task(&self, spec: &TaskSpec, now: DateTime<Utc>) -> Result<i64, DeskError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowNotifier;

    impl Notifier for SlowNotifier {
        fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeskError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        }
    }

    struct StubTasks {
        delay: Duration,
        result: Result<i64, String>,
    }

    impl TaskCreator for StubTasks {
        fn create_task(&self, _: &TaskSpec, _: DateTime<Utc>) -> Result<i64, DeskError> {
            std::thread::sleep(self.delay);
            self.result.clone().map_err(DeskError::Database)
        }
    }

    fn spec() -> TaskSpec {
        TaskSpec {
            ticket_id: Some(1),
            title: "Call back".to_string(),
            description: None,
            priority: Priority::Medium,
            assignee_id: None,
            due_at: None,
        }
    }

    #[test]
    fn test_send_bounded_passes_result_through() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .withf(|channel, recipient, message| {
                channel.to_string() == "email"
                    && recipient.to_string() == "agent-1"
                    && message.to_string() == "hello"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let notifier: Arc<dyn Notifier> = Arc::new(mock);
        let result = send_bounded(
            &notifier,
            "email",
            "agent-1",
            "hello",
            Duration::from_secs(1),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_send_bounded_reports_failure() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .returning(|_, _, _| Err(DeskError::Notification("smtp down".to_string())));

        let notifier: Arc<dyn Notifier> = Arc::new(mock);
        let err = send_bounded(&notifier, "email", "x", "y", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("smtp down"));
    }

    #[test]
    fn test_send_bounded_times_out() {
        let notifier: Arc<dyn Notifier> = Arc::new(SlowNotifier);
        let err = send_bounded(&notifier, "email", "x", "y", Duration::from_millis(20)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_create_task_bounded_returns_id() {
        let tasks: Arc<dyn TaskCreator> = Arc::new(StubTasks {
            delay: Duration::ZERO,
            result: Ok(7),
        });
        let id = create_task_bounded(&tasks, &spec(), Utc::now(), Duration::from_secs(1)).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn test_create_task_bounded_contains_storage_errors() {
        let tasks: Arc<dyn TaskCreator> = Arc::new(StubTasks {
            delay: Duration::ZERO,
            result: Err("disk full".to_string()),
        });
        let err = create_task_bounded(&tasks, &spec(), Utc::now(), Duration::from_secs(1)).unwrap_err();
        assert!(!err.is_storage());
        assert!(matches!(err, DeskError::ActionExecutionFailure(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_create_task_bounded_times_out() {
        let tasks: Arc<dyn TaskCreator> = Arc::new(StubTasks {
            delay: Duration::from_millis(500),
            result: Ok(1),
        });
        let err = create_task_bounded(&tasks, &spec(), Utc::now(), Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, DeskError::ActionExecutionFailure(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
