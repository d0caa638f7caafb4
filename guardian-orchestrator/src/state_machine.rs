use guardian_common::{FailoverEvent, FailoverState};
use tracing::{info, warn};

/// Forward edges of the failover state machine. There is no edge back:
/// a failed step either aborts the event or is logged and skipped over.
pub fn is_allowed(from: FailoverState, to: FailoverState) -> bool {
    use FailoverState::*;
    matches!(
        (from, to),
        (Detected, Provisioning)
            | (Detected, Aborted)
            | (Provisioning, AwaitingReady)
            | (Provisioning, Aborted)
            | (AwaitingReady, MigratingNetwork)
            | (AwaitingReady, Aborted)
            | (MigratingNetwork, StoppingSource)
            | (StoppingSource, Notifying)
            | (Notifying, Done)
    )
}

/// Move `event` to `to` and record the transition. Returns false (and leaves
/// the event untouched) when the edge does not exist.
pub fn transition(event: &mut FailoverEvent, to: FailoverState, reason: &str) -> bool {
    let from = event.state;
    if !is_allowed(from, to) {
        warn!(
            event_id = %event.id,
            instance_id = %event.source.id,
            from = from.as_str(),
            to = to.as_str(),
            "rejected failover transition"
        );
        return false;
    }

    event.state = to;
    info!(
        event_id = %event.id,
        instance_id = %event.source.id,
        instance = %event.source.name,
        from = from.as_str(),
        to = to.as_str(),
        reason,
        "failover transition"
    );
    true
}
