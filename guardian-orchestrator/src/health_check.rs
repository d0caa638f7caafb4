use guardian_common::{FailoverError, Health, Instance, InstanceStatus};
use guardian_providers::CloudProvider;
use tracing::{debug, warn};

/// Result of one health probe.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Lower-cased provider status.
    pub status: String,
    pub health: Health,
    pub instance: Instance,
}

/// `active` and `building` are healthy; anything else is a confirmed bad status.
pub fn classify(status: &str) -> Health {
    InstanceStatus::parse(status).health()
}

/// Fetch the instance and classify its status.
///
/// A failed lookup (API unreachable, timeout, not found) is returned as
/// [`FailoverError::Lookup`]: health is unknown, which never triggers a failover.
pub async fn probe(
    provider: &dyn CloudProvider,
    region: &str,
    instance_id: &str,
) -> Result<HealthReport, FailoverError> {
    let instance = provider
        .get_instance(region, instance_id)
        .await
        .map_err(|e| {
            warn!(instance_id, region, error = %e, "health lookup failed, skipping this cycle");
            FailoverError::Lookup {
                instance_id: instance_id.to_string(),
                message: e.to_string(),
            }
        })?;

    let status = instance.status.as_str().to_string();
    let health = classify(&status);
    debug!(instance_id, name = %instance.name, status = %status, ?health, "probed");
    Ok(HealthReport {
        status,
        health,
        instance,
    })
}
