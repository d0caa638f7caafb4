use anyhow::Result;
use async_trait::async_trait;
use guardian_common::Instance;

/// Compute/network/identity operations the guardian needs from a cloud.
///
/// Every call is addressed to an explicit region; implementations hold one
/// set of credentials valid across all regions of the cloud.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Region the watched instances live in.
    fn home_region(&self) -> &str;

    /// Region ids in provider order.
    async fn list_regions(&self) -> Result<Vec<String>>;

    /// Full descriptor; not-found is an error.
    async fn get_instance(&self, region: &str, server_id: &str) -> Result<Instance>;

    /// Returns the new server id.
    async fn create_instance(&self, region: &str, request: &CreateInstanceRequest)
        -> Result<String>;

    /// Lower-cased status string of a server.
    async fn get_instance_status(&self, region: &str, server_id: &str) -> Result<String>;

    /// Network ids visible in `region`, in provider order.
    async fn list_networks(&self, region: &str) -> Result<Vec<String>>;

    /// Allocates a floating address from the region's external pool and
    /// returns the address.
    async fn create_floating_ip(&self, region: &str) -> Result<String>;

    async fn attach_floating_ip(&self, region: &str, server_id: &str, address: &str)
        -> Result<()>;

    async fn detach_floating_ip(&self, region: &str, server_id: &str, address: &str)
        -> Result<()>;

    async fn stop_instance(&self, region: &str, server_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub network_id: String,
    pub key_name: Option<String>,
    /// Empty means provider default groups.
    pub security_groups: Vec<String>,
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "openstack")]
pub mod openstack;
