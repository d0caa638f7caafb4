//! Network identity of a replacement instance.
//!
//! Two policies: carry the source's floating address over (`Migrate`), or
//! allocate a fresh one in the target region and repoint DNS at it
//! (`AllocateNew`). Every step failure is folded into the returned
//! [`NetworkOutcome`]; nothing here aborts a failover.

use crate::dns::DnsUpdater;
use crate::logger;
use guardian_common::{
    DnsOutcome, DnsSetup, FailoverError, Instance, NetworkOutcome, NetworkPolicy, NetworkStep,
};
use guardian_providers::CloudProvider;
use serde_json::json;
use tracing::{info, warn};

/// DNS step configuration as seen by one event.
#[derive(Clone, Copy)]
pub enum DnsTarget<'a> {
    Disabled,
    Incomplete(&'a [&'static str]),
    Ready(&'a dyn DnsUpdater),
}

impl<'a> DnsTarget<'a> {
    /// `updater` is only consulted when the setup is complete.
    pub fn from_setup(setup: &'a DnsSetup, updater: Option<&'a dyn DnsUpdater>) -> Self {
        match (setup, updater) {
            (DnsSetup::Incomplete { missing }, _) => DnsTarget::Incomplete(missing),
            (DnsSetup::Ready(_), Some(u)) => DnsTarget::Ready(u),
            (DnsSetup::Ready(_), None) => DnsTarget::Disabled,
            (DnsSetup::Disabled, _) => DnsTarget::Disabled,
        }
    }
}

pub async fn resolve(
    policy: NetworkPolicy,
    provider: &dyn CloudProvider,
    source: &Instance,
    target_region: &str,
    new_instance_id: &str,
    dns: DnsTarget<'_>,
) -> NetworkOutcome {
    match policy {
        NetworkPolicy::Migrate => {
            migrate_floating_ip(provider, source, target_region, new_instance_id).await
        }
        NetworkPolicy::AllocateNew => {
            allocate_new_floating_ip(provider, target_region, new_instance_id, dns).await
        }
    }
}

/// Detach the source's floating address and attach it to the replacement.
///
/// The attach is attempted even when the detach fails: the address may
/// already be free.
pub async fn migrate_floating_ip(
    provider: &dyn CloudProvider,
    source: &Instance,
    target_region: &str,
    new_instance_id: &str,
) -> NetworkOutcome {
    let Some(address) = source.floating_address().map(str::to_string) else {
        warn!(
            instance_id = %source.id,
            instance = %source.name,
            "source has no floating address, nothing to migrate"
        );
        return NetworkOutcome::NoFloatingAddress;
    };

    let log = logger::log_event_with_metadata(
        "DETACH_FLOATING_IP",
        "in_progress",
        &source.id,
        None,
        Some(json!({ "region": source.region, "address": address })),
    );
    let detach_error = match provider
        .detach_floating_ip(&source.region, &source.id, &address)
        .await
    {
        Ok(()) => {
            logger::log_event_complete(log, "success", None);
            None
        }
        Err(e) => {
            let err = FailoverError::network(NetworkStep::Detach, &e).to_string();
            logger::log_event_complete(log, "failed", Some(&err));
            Some(err)
        }
    };

    let log = logger::log_event_with_metadata(
        "ATTACH_FLOATING_IP",
        "in_progress",
        new_instance_id,
        None,
        Some(json!({ "region": target_region, "address": address })),
    );
    let attach_error = match provider
        .attach_floating_ip(target_region, new_instance_id, &address)
        .await
    {
        Ok(()) => {
            logger::log_event_complete(log, "success", None);
            None
        }
        Err(e) => {
            let err = FailoverError::network(NetworkStep::Attach, &e).to_string();
            logger::log_event_complete(log, "failed", Some(&err));
            Some(err)
        }
    };

    if detach_error.is_none() && attach_error.is_none() {
        info!(address = %address, from = %source.id, to = new_instance_id, "floating address migrated");
        NetworkOutcome::Migrated { address }
    } else {
        NetworkOutcome::MigrationFailed {
            address,
            detach_error,
            attach_error,
        }
    }
}

/// Allocate a fresh floating address, attach it, then repoint DNS.
///
/// DNS is only attempted once the address is attached to the replacement.
pub async fn allocate_new_floating_ip(
    provider: &dyn CloudProvider,
    target_region: &str,
    new_instance_id: &str,
    dns: DnsTarget<'_>,
) -> NetworkOutcome {
    let log = logger::log_event_with_metadata(
        "ALLOCATE_FLOATING_IP",
        "in_progress",
        new_instance_id,
        None,
        Some(json!({ "region": target_region })),
    );
    let address = match provider.create_floating_ip(target_region).await {
        Ok(a) => {
            logger::log_event_complete_with_metadata(
                log,
                "success",
                None,
                Some(json!({ "address": a })),
            );
            a
        }
        Err(e) => {
            let err = FailoverError::network(NetworkStep::Allocate, &e).to_string();
            logger::log_event_complete(log, "failed", Some(&err));
            return NetworkOutcome::AllocationFailed {
                address: None,
                error: err,
            };
        }
    };

    let log = logger::log_event_with_metadata(
        "ATTACH_FLOATING_IP",
        "in_progress",
        new_instance_id,
        None,
        Some(json!({ "region": target_region, "address": address })),
    );
    if let Err(e) = provider
        .attach_floating_ip(target_region, new_instance_id, &address)
        .await
    {
        let err = FailoverError::network(NetworkStep::Attach, &e).to_string();
        logger::log_event_complete(log, "failed", Some(&err));
        warn!(address = %address, "allocated address left unattached, DNS not updated");
        return NetworkOutcome::AllocationFailed {
            address: Some(address),
            error: err,
        };
    }
    logger::log_event_complete(log, "success", None);

    let dns = update_dns(dns, new_instance_id, &address).await;
    NetworkOutcome::Allocated { address, dns }
}

async fn update_dns(dns: DnsTarget<'_>, instance_id: &str, address: &str) -> DnsOutcome {
    match dns {
        DnsTarget::Disabled => {
            let reason = "DNS update not configured".to_string();
            logger::log_event("DNS_UPDATE", "skipped", instance_id, Some(&reason));
            DnsOutcome::Skipped { reason }
        }
        DnsTarget::Incomplete(missing) => {
            let reason = format!("DNS configuration incomplete, missing {}", missing.join(", "));
            logger::log_event("DNS_UPDATE", "skipped", instance_id, Some(&reason));
            DnsOutcome::Skipped { reason }
        }
        DnsTarget::Ready(updater) => {
            let log = logger::log_event_with_metadata(
                "DNS_UPDATE",
                "in_progress",
                instance_id,
                None,
                Some(json!({ "hostname": updater.hostname(), "address": address })),
            );
            match updater.update_record(address).await {
                Ok(()) => {
                    logger::log_event_complete(log, "success", None);
                    DnsOutcome::Updated {
                        hostname: updater.hostname().to_string(),
                    }
                }
                Err(e) => {
                    let err = FailoverError::network(NetworkStep::DnsUpdate, &e).to_string();
                    logger::log_event_complete(log, "failed", Some(&err));
                    DnsOutcome::Failed { error: err }
                }
            }
        }
    }
}
