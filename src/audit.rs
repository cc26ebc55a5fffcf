/// Audit logging for editing sessions and retried operations
///
/// Events are appended as JSON lines to `audit.log` in the state directory.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A save payload was prepared from an editing session
    PrepareSave,
    /// A retried operation ran out of attempts or was cancelled
    RetryFailed,
    /// A retried operation eventually succeeded
    RetrySucceeded,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Type of event
    pub event_type: EventType,

    /// Whether the operation succeeded
    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Creates an audit log in the state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Creates an audit log writing to `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
        }
    }

    /// Appends an event to the audit log
    ///
    /// Events are written as JSON-lines format (one JSON object per line)
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// Lines that do not parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .take(count)
            .collect();

        Ok(events)
    }

    /// Returns the path to the audit log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

async fn write_event(event: AuditEvent) {
    if let Ok(audit) = AuditLog::new()
        && let Err(e) = audit.log(event).await
    {
        tracing::warn!("Failed to write audit log: {}", e);
    }
}

/// Logs a prepared save
///
/// # Arguments
///
/// * `inbound` - Number of inbound rules in the payload
/// * `outbound` - Number of outbound rules in the payload
/// * `modified` - Whether the session changed anything
/// * `error` - Error message if the payload was rejected
pub async fn log_prepare_save(
    inbound: usize,
    outbound: usize,
    modified: bool,
    error: Option<String>,
) {
    write_event(prepare_save_event(inbound, outbound, modified, error)).await;
}

fn prepare_save_event(
    inbound: usize,
    outbound: usize,
    modified: bool,
    error: Option<String>,
) -> AuditEvent {
    AuditEvent::new(
        EventType::PrepareSave,
        error.is_none(),
        serde_json::json!({
            "inbound": inbound,
            "outbound": outbound,
            "modified": modified,
        }),
        error,
    )
}

/// Logs the outcome of a retried operation
pub async fn log_retry(operation: &str, attempts: usize, error: Option<String>) {
    let event_type = if error.is_none() {
        EventType::RetrySucceeded
    } else {
        EventType::RetryFailed
    };
    let event = AuditEvent::new(
        event_type,
        error.is_none(),
        serde_json::json!({
            "operation": operation,
            "attempts": attempts,
        }),
        error,
    );
    write_event(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_save_event() {
        let event = prepare_save_event(3, 1, true, None);

        assert!(event.success);
        assert!(event.error.is_none());
        assert_eq!(event.details["inbound"], 3);
        assert_eq!(event.details["modified"], true);
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(
            EventType::RetryFailed,
            false,
            serde_json::json!({"attempts": 10}),
            Some("gave up".to_string()),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("retry_failed"));
        assert!(json.contains("gave up"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"timestamp":"2024-01-01T00:00:00Z","event_type":"prepare_save","success":true,"details":{},"error":null}"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();

        assert!(event.success);
        assert_eq!(event.event_type, EventType::PrepareSave);
    }

    #[tokio::test]
    async fn test_log_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::at(dir.path().join("audit.log"));

        audit.log(prepare_save_event(1, 0, false, None)).await.unwrap();
        audit
            .log(prepare_save_event(30, 0, true, Some("too many".into())))
            .await
            .unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(audit.path())
            .await
            .unwrap()
            .write_all(b"garbage\n")
            .await
            .unwrap();

        let events = audit.read_recent(5).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].success);
        assert_eq!(events[1].details["inbound"], 1);
    }
}
