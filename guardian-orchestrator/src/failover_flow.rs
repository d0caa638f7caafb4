//! Failover executor: one event per unhealthy instance, driven from
//! `detected` to `done` or `aborted`.
//!
//! Only provisioning-class errors abort. Network, stop and notification
//! failures are logged and the event moves on; nothing is rolled back.

use crate::logger;
use crate::network_identity;
use crate::notifier::notify_best_effort;
use crate::region_selector::find_other_region;
use crate::state_machine::transition;
use crate::Guardian;
use guardian_common::{
    DnsOutcome, FailoverError, FailoverEvent, FailoverState, Instance, InstanceStatus,
    NetworkOutcome, ReadyWait,
};
use guardian_providers::{CloudProvider, CreateInstanceRequest};
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Run a complete failover for `source`. Always returns a terminal event.
pub async fn execute_failover(guardian: &Guardian, source: Instance) -> FailoverEvent {
    let mut event = FailoverEvent::new(source);
    let log = logger::log_event_with_metadata(
        "FAILOVER",
        "in_progress",
        &event.source.id,
        None,
        Some(json!({
            "event_id": event.id,
            "instance": event.source.name,
            "region": event.source.region,
            "status": event.source.status,
            "policy": guardian.config.network_policy.as_str(),
        })),
    );

    let new_instance_id = match provision(guardian, &mut event).await {
        Ok(id) => id,
        Err(e) => match continue_after(&event, &e) {
            Some(id) => id,
            None => {
                abort(guardian, &mut event, &e).await;
                logger::log_event_complete(log, "failed", Some(&e.to_string()));
                return event;
            }
        },
    };

    complete(guardian, &mut event, &new_instance_id).await;

    let outcome = event.outcome().map(|o| o.as_str()).unwrap_or("unknown");
    logger::log_event_complete_with_metadata(
        log,
        "success",
        None,
        Some(json!({
            "outcome": outcome,
            "target_region": event.target_region,
            "new_instance_id": event.new_instance_id,
            "address": event.address(),
        })),
    );
    event
}

/// `detected -> provisioning -> awaiting-ready`. Every error returned here aborts.
async fn provision(guardian: &Guardian, event: &mut FailoverEvent) -> Result<String, FailoverError> {
    let provider = guardian.provider.as_ref();

    let target = find_other_region(provider, &event.source).await?;
    event.target_region = Some(target.clone());
    transition(event, FailoverState::Provisioning, "target region selected");

    let request = build_create_request(guardian, &event.source, &target).await?;
    let log = logger::log_event_with_metadata(
        "CREATE_INSTANCE",
        "in_progress",
        &event.source.id,
        None,
        Some(json!({
            "region": target,
            "name": request.name,
            "image_id": request.image_id,
            "flavor_id": request.flavor_id,
            "network_id": request.network_id,
        })),
    );
    let new_id = match provider.create_instance(&target, &request).await {
        Ok(id) => {
            logger::log_event_complete_with_metadata(
                log,
                "success",
                None,
                Some(json!({ "server_id": id })),
            );
            id
        }
        Err(e) => {
            let err = FailoverError::Provisioning {
                region: target.clone(),
                message: e.to_string(),
            };
            logger::log_event_complete(log, "failed", Some(&err.to_string()));
            return Err(err);
        }
    };
    event.new_instance_id = Some(new_id.clone());
    transition(event, FailoverState::AwaitingReady, "replacement requested");

    let log = logger::log_event("WAIT_READY", "in_progress", &new_id, None);
    match wait_until_ready(provider, &target, &new_id, guardian.config.ready_wait).await {
        Ok(()) => logger::log_event_complete(log, "success", None),
        Err(e) => {
            logger::log_event_complete(log, "failed", Some(&e.to_string()));
            return Err(e);
        }
    }
    Ok(new_id)
}

/// `migrating-network -> stopping-source -> notifying -> done`.
async fn complete(guardian: &Guardian, event: &mut FailoverEvent, new_instance_id: &str) {
    let provider = guardian.provider.as_ref();
    let target = event.target_region.clone().unwrap_or_default();

    transition(event, FailoverState::MigratingNetwork, "replacement active");
    let network = network_identity::resolve(
        guardian.config.network_policy,
        provider,
        &event.source,
        &target,
        new_instance_id,
        guardian.dns_target(),
    )
    .await;
    let reason = match &network {
        NetworkOutcome::Migrated { .. } | NetworkOutcome::Allocated { .. } => "network identity moved",
        NetworkOutcome::NoFloatingAddress => "no address migrated",
        _ => "network identity step failed, continuing",
    };
    event.network = Some(network);

    transition(event, FailoverState::StoppingSource, reason);
    event.source_stopped = Some(stop_source(provider, &event.source).await);

    transition(event, FailoverState::Notifying, "source handled");
    let (title, message) = compose_summary(event);
    event.notified = notify_best_effort(guardian.notifier.as_ref(), &title, &message).await;

    transition(event, FailoverState::Done, "failover complete");
}

/// The error kind decides: provisioning-class errors abort, anything else
/// continues with the replacement if one exists.
fn continue_after(event: &FailoverEvent, err: &FailoverError) -> Option<String> {
    if err.aborts_event() {
        return None;
    }
    let new_id = event.new_instance_id.clone()?;
    warn!(
        event_id = %event.id,
        instance_id = %event.source.id,
        kind = ?err.kind(),
        error = %err,
        "failover step failed, continuing"
    );
    Some(new_id)
}

async fn abort(guardian: &Guardian, event: &mut FailoverEvent, err: &FailoverError) {
    error!(
        event_id = %event.id,
        instance_id = %event.source.id,
        instance = %event.source.name,
        target_region = event.target_region.as_deref().unwrap_or("-"),
        kind = ?err.kind(),
        error = %err,
        "failover aborted"
    );

    if let Some(server_id) = err.left_replacement() {
        let (title, message) = compose_abort_summary(event, server_id, err);
        event.notified = notify_best_effort(guardian.notifier.as_ref(), &title, &message).await;
    }

    let reason = err.to_string();
    transition(event, FailoverState::Aborted, &reason);
    event.abort_reason = Some(reason);
}

/// Stop is best-effort: the result only records whether it happened.
async fn stop_source(provider: &dyn CloudProvider, source: &Instance) -> bool {
    let log = logger::log_event_with_metadata(
        "STOP_INSTANCE",
        "in_progress",
        &source.id,
        None,
        Some(json!({ "region": source.region })),
    );
    match provider.stop_instance(&source.region, &source.id).await {
        Ok(()) => {
            logger::log_event_complete(log, "success", None);
            true
        }
        Err(e) => {
            let err = FailoverError::BestEffort {
                what: "source stop",
                message: e.to_string(),
            };
            logger::log_event_complete(log, "failed", Some(&err.to_string()));
            false
        }
    }
}

/// Create parameters for the replacement of `source` in `target_region`.
///
/// Region overrides win; without a network override the first network the
/// provider lists is used and flagged as a configuration warning.
pub async fn build_create_request(
    guardian: &Guardian,
    source: &Instance,
    target_region: &str,
) -> Result<CreateInstanceRequest, FailoverError> {
    let overrides = guardian.config.region_overrides(target_region);

    let image_id = source
        .image_id
        .clone()
        .ok_or_else(|| FailoverError::Provisioning {
            region: target_region.to_string(),
            message: format!("source {} has no image reference (volume-backed?)", source.id),
        })?;

    let network_id = match overrides.network_id {
        Some(id) => id,
        None => {
            let networks = guardian
                .provider
                .list_networks(target_region)
                .await
                .map_err(|e| FailoverError::Provisioning {
                    region: target_region.to_string(),
                    message: format!("network discovery failed: {e}"),
                })?;
            let first = networks
                .into_iter()
                .next()
                .ok_or_else(|| FailoverError::Provisioning {
                    region: target_region.to_string(),
                    message: "no network available".to_string(),
                })?;
            let warning = FailoverError::Configuration(format!(
                "NETWORK_ID_{target_region} not set, using first discovered network {first}"
            ));
            warn!(region = target_region, network_id = %first, "{}", warning);
            first
        }
    };

    Ok(CreateInstanceRequest {
        name: format!("{}{}", guardian.config.name_prefix, source.name),
        image_id,
        flavor_id: source.flavor_id.clone(),
        network_id,
        key_name: overrides.key_name.or_else(|| source.key_name.clone()),
        security_groups: overrides.security_groups,
    })
}

/// Poll until `active` (Ok), `error`, or the timeout. Poll errors are
/// logged and polling continues.
pub async fn wait_until_ready(
    provider: &dyn CloudProvider,
    region: &str,
    server_id: &str,
    wait: ReadyWait,
) -> Result<(), FailoverError> {
    let started = Instant::now();
    loop {
        match provider.get_instance_status(region, server_id).await {
            Ok(raw) => match InstanceStatus::parse(&raw) {
                InstanceStatus::Active => {
                    info!(server_id, region, waited_ms = started.elapsed().as_millis() as u64, "replacement active");
                    return Ok(());
                }
                InstanceStatus::Error => {
                    return Err(FailoverError::ReplacementFailed {
                        region: region.to_string(),
                        server_id: server_id.to_string(),
                    });
                }
                other => debug!(server_id, status = %other, "waiting for replacement"),
            },
            Err(e) => warn!(server_id, region, error = %e, "status poll failed"),
        }

        if started.elapsed() >= wait.timeout {
            return Err(FailoverError::ReadyTimeout {
                region: region.to_string(),
                server_id: server_id.to_string(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        }
        sleep(wait.poll_interval).await;
    }
}

/// Title and body of the operator notification for a completed event.
pub fn compose_summary(event: &FailoverEvent) -> (String, String) {
    let source = &event.source;
    let title = format!("Failover [{}]", source.name);

    let mut lines = vec![format!(
        "Instance {} ({}) DOWN -> new instance started in {} ({})",
        source.name,
        source.region,
        event.target_region.as_deref().unwrap_or("?"),
        event.new_instance_id.as_deref().unwrap_or("?"),
    )];

    match &event.network {
        Some(NetworkOutcome::Migrated { address }) => {
            lines.push(format!("Floating IP {address} moved to the new instance"));
        }
        Some(NetworkOutcome::MigrationFailed {
            address,
            detach_error,
            attach_error,
        }) => {
            let errors: Vec<&str> = [detach_error, attach_error]
                .into_iter()
                .filter_map(|e| e.as_deref())
                .collect();
            lines.push(format!(
                "Floating IP {address} migration failed: {}",
                errors.join("; ")
            ));
        }
        Some(NetworkOutcome::NoFloatingAddress) => {
            lines.push("No floating IP to migrate".to_string());
        }
        Some(NetworkOutcome::Allocated { address, dns }) => {
            lines.push(format!("New floating IP: {address}"));
            lines.push(match dns {
                DnsOutcome::Updated { hostname } => format!("DNS record {hostname} updated"),
                DnsOutcome::Failed { error } => format!("DNS update failed: {error}"),
                DnsOutcome::Skipped { reason } => format!("DNS update skipped: {reason}"),
            });
        }
        Some(NetworkOutcome::AllocationFailed { address, error }) => match address {
            Some(a) => lines.push(format!("Floating IP {a} allocated but not attached: {error}")),
            None => lines.push(format!("Floating IP allocation failed: {error}")),
        },
        None => {}
    }

    if event.source_stopped == Some(false) {
        lines.push(format!("Warning: {} could not be stopped", source.id));
    }

    (title, lines.join("\n"))
}

fn compose_abort_summary(
    event: &FailoverEvent,
    server_id: &str,
    err: &FailoverError,
) -> (String, String) {
    let source = &event.source;
    (
        format!("Failover aborted [{}]", source.name),
        format!(
            "Instance {} ({}) DOWN, replacement {} in {} left in place for inspection: {}",
            source.name,
            source.region,
            server_id,
            event.target_region.as_deref().unwrap_or("?"),
            err
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_common::{AddressKind, InstanceAddress, NetworkStep};

    fn event(network: NetworkOutcome, stopped: bool) -> FailoverEvent {
        let mut e = FailoverEvent::new(Instance {
            id: "i-1".into(),
            name: "web".into(),
            status: InstanceStatus::Shutoff,
            region: "eu-1".into(),
            image_id: Some("img".into()),
            flavor_id: "small".into(),
            key_name: None,
            addresses: vec![InstanceAddress {
                network: "priv".into(),
                addr: "203.0.113.5".into(),
                kind: AddressKind::Floating,
            }],
        });
        e.target_region = Some("eu-2".into());
        e.new_instance_id = Some("n-7".into());
        e.network = Some(network);
        e.source_stopped = Some(stopped);
        e
    }

    #[test]
    fn summary_names_regions_and_address() {
        let (title, body) = compose_summary(&event(
            NetworkOutcome::Migrated {
                address: "203.0.113.5".into(),
            },
            true,
        ));
        assert_eq!(title, "Failover [web]");
        assert!(body.contains("eu-1"));
        assert!(body.contains("eu-2"));
        assert!(body.contains("n-7"));
        assert!(body.contains("203.0.113.5"));
        assert!(!body.contains("Warning"));
    }

    #[test]
    fn summary_reports_dns_outcome() {
        let (_, body) = compose_summary(&event(
            NetworkOutcome::Allocated {
                address: "198.51.100.11".into(),
                dns: DnsOutcome::Skipped {
                    reason: "DNS update not configured".into(),
                },
            },
            true,
        ));
        assert!(body.contains("New floating IP: 198.51.100.11"));
        assert!(body.contains("DNS update skipped"));
    }

    #[test]
    fn summary_lists_migration_errors_and_stop_warning() {
        let (_, body) = compose_summary(&event(
            NetworkOutcome::MigrationFailed {
                address: "203.0.113.5".into(),
                detach_error: Some("detach: 404".into()),
                attach_error: None,
            },
            false,
        ));
        assert!(body.contains("migration failed: detach: 404"));
        assert!(body.contains("Warning: i-1 could not be stopped"));
    }

    #[test]
    fn error_kind_decides_abort_or_continue() {
        let mut e = event(NetworkOutcome::NoFloatingAddress, true);
        let timeout = FailoverError::ReadyTimeout {
            region: "eu-2".into(),
            server_id: "n-7".into(),
            waited_ms: 300_000,
        };
        assert_eq!(continue_after(&e, &timeout), None);

        let partial = FailoverError::network(NetworkStep::Attach, "409 conflict");
        assert_eq!(continue_after(&e, &partial).as_deref(), Some("n-7"));

        e.new_instance_id = None;
        assert_eq!(continue_after(&e, &partial), None);
    }

    #[test]
    fn abort_summary_names_leftover_replacement() {
        let mut e = event(NetworkOutcome::NoFloatingAddress, true);
        e.network = None;
        let err = FailoverError::ReadyTimeout {
            region: "eu-2".into(),
            server_id: "n-7".into(),
            waited_ms: 300_000,
        };
        let (title, body) = compose_abort_summary(&e, "n-7", &err);
        assert_eq!(title, "Failover aborted [web]");
        assert!(body.contains("n-7 in eu-2 left in place"));
    }
}
