use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// An action started with [`log_event_with_metadata`], to be closed with
/// [`log_event_complete`].
#[derive(Debug)]
pub struct ActionLog {
    pub id: Uuid,
    action_type: &'static str,
    instance_id: String,
    started: Instant,
}

impl ActionLog {
    pub fn duration_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Simple action logger: one structured line per externally visible step.
pub fn log_event(
    action_type: &'static str,
    status: &str,
    instance_id: &str,
    error_message: Option<&str>,
) -> ActionLog {
    log_event_with_metadata(action_type, status, instance_id, error_message, None)
}

/// Log event with metadata (context info)
pub fn log_event_with_metadata(
    action_type: &'static str,
    status: &str,
    instance_id: &str,
    error_message: Option<&str>,
    metadata: Option<Value>,
) -> ActionLog {
    let log = ActionLog {
        id: Uuid::new_v4(),
        action_type,
        instance_id: instance_id.to_string(),
        started: Instant::now(),
    };
    emit(&log, status, None, error_message, metadata.as_ref());
    log
}

/// Log event completion with duration
pub fn log_event_complete(log: ActionLog, status: &str, error_message: Option<&str>) {
    log_event_complete_with_metadata(log, status, error_message, None)
}

/// Log event completion with metadata
pub fn log_event_complete_with_metadata(
    log: ActionLog,
    status: &str,
    error_message: Option<&str>,
    metadata: Option<Value>,
) {
    let duration = log.duration_ms();
    emit(&log, status, Some(duration), error_message, metadata.as_ref());
}

fn emit(
    log: &ActionLog,
    status: &str,
    duration_ms: Option<u64>,
    error_message: Option<&str>,
    metadata: Option<&Value>,
) {
    let metadata = metadata.map(|m| m.to_string()).unwrap_or_default();
    if status == "failed" {
        warn!(
            action_id = %log.id,
            action_type = log.action_type,
            status,
            instance_id = %log.instance_id,
            duration_ms,
            error = error_message.unwrap_or_default(),
            metadata = %metadata,
            "action {}", log.action_type
        );
    } else {
        info!(
            action_id = %log.id,
            action_type = log.action_type,
            status,
            instance_id = %log.instance_id,
            duration_ms,
            details = error_message.unwrap_or_default(),
            metadata = %metadata,
            "action {}", log.action_type
        );
    }
}
