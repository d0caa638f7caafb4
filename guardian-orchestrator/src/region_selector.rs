use guardian_common::{FailoverError, Instance};
use guardian_providers::CloudProvider;

/// First region, in provider order, that is not `current`.
pub fn select_target_region(regions: &[String], current: &str) -> Option<String> {
    regions.iter().find(|r| r.as_str() != current).cloned()
}

/// Ask the provider for its regions and pick the failover target for `instance`.
pub async fn find_other_region(
    provider: &dyn CloudProvider,
    instance: &Instance,
) -> Result<String, FailoverError> {
    let regions = provider
        .list_regions()
        .await
        .map_err(|e| FailoverError::RegionDiscovery(e.to_string()))?;

    select_target_region(&regions, &instance.region).ok_or_else(|| {
        FailoverError::NoAlternateRegion {
            instance_id: instance.id.clone(),
            region: instance.region.clone(),
        }
    })
}
