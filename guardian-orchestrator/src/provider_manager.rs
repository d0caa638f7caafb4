use anyhow::{anyhow, Result};
use guardian_providers::CloudProvider;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "provider-mock")]
use guardian_common::config::parse_list;
#[cfg(feature = "provider-mock")]
use guardian_providers::mock::MockProvider;
#[cfg(feature = "provider-openstack")]
use guardian_providers::openstack::{OpenStackCredentials, OpenStackProvider};

pub struct ProviderManager;

impl ProviderManager {
    /// Build the provider named by `PROVIDER`. Implementations are compiled in
    /// through the `provider-*` features.
    #[cfg_attr(
        not(any(feature = "provider-openstack", feature = "provider-mock")),
        allow(unused_variables)
    )]
    pub fn get_provider(
        provider_name: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Arc<dyn CloudProvider>> {
        match provider_name.to_lowercase().as_str() {
            #[cfg(feature = "provider-openstack")]
            "openstack" => {
                let creds = OpenStackCredentials::from_vars(vars)?;
                Ok(Arc::new(OpenStackProvider::new(creds)?))
            }
            #[cfg(feature = "provider-mock")]
            "mock" => Ok(Arc::new(mock_from_vars(vars))),
            other => Err(anyhow!(
                "provider '{}' is not available in this build",
                other
            )),
        }
    }
}

/// Local dry-run cloud: `MOCK_REGIONS` (default `mock-1,mock-2`), with every
/// configured instance seeded as active in the first region.
#[cfg(feature = "provider-mock")]
fn mock_from_vars(vars: &HashMap<String, String>) -> MockProvider {
    use guardian_common::{Instance, InstanceStatus};

    let mut regions = vars
        .get("MOCK_REGIONS")
        .map(|r| parse_list(r))
        .unwrap_or_default();
    if regions.is_empty() {
        regions = vec!["mock-1".to_string(), "mock-2".to_string()];
    }
    let region_refs: Vec<&str> = regions.iter().map(String::as_str).collect();
    let home = regions[0].clone();

    let mut provider = MockProvider::new(&home, &region_refs);
    for region in &regions {
        provider = provider.with_networks(region, &["mock-net"]);
    }
    let ids = vars
        .get("INSTANCE_IDS")
        .map(|r| parse_list(r))
        .unwrap_or_default();
    for id in ids {
        provider = provider.with_instance(Instance {
            name: id.clone(),
            id,
            status: InstanceStatus::Active,
            region: home.clone(),
            image_id: Some("mock-image".to_string()),
            flavor_id: "mock-flavor".to_string(),
            key_name: None,
            addresses: vec![],
        });
    }
    provider
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_an_error() {
        let err = ProviderManager::get_provider("ovh", &HashMap::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("ovh"));
    }

    #[cfg(feature = "provider-openstack")]
    #[test]
    fn openstack_requires_credentials() {
        assert!(ProviderManager::get_provider("openstack", &HashMap::new()).is_err());
    }
}
