//! In-memory provider for local runs and tests.
//!
//! Holds a small fake cloud: regions, instances, networks, and floating
//! addresses. Individual operations can be made to fail, and the status
//! sequence a freshly created instance goes through can be scripted.

use crate::{CloudProvider, CreateInstanceRequest};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use guardian_common::{AddressKind, Instance, InstanceAddress, InstanceStatus};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListRegions,
    GetInstance,
    CreateInstance,
    GetInstanceStatus,
    ListNetworks,
    CreateFloatingIp,
    AttachFloatingIp,
    DetachFloatingIp,
    StopInstance,
}

/// Every provider call, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListRegions,
    GetInstance { region: String, server_id: String },
    CreateInstance { region: String, request: CreateInstanceRequest },
    GetInstanceStatus { region: String, server_id: String },
    ListNetworks { region: String },
    CreateFloatingIp { region: String },
    AttachFloatingIp { region: String, server_id: String, address: String },
    DetachFloatingIp { region: String, server_id: String, address: String },
    StopInstance { region: String, server_id: String },
}

#[derive(Default)]
struct MockState {
    regions: Vec<String>,
    instances: HashMap<String, Instance>,
    networks: HashMap<String, Vec<String>>,
    failures: HashSet<MockOp>,
    ready_script: VecDeque<String>,
    calls: Vec<MockCall>,
    next_server: u32,
    next_address: u32,
}

pub struct MockProvider {
    home_region: String,
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new(home_region: &str, regions: &[&str]) -> Self {
        let state = MockState {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            next_address: 10,
            ..Default::default()
        };
        Self {
            home_region: home_region.to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        self.lock().instances.insert(instance.id.clone(), instance);
        self
    }

    pub fn with_networks(self, region: &str, networks: &[&str]) -> Self {
        self.lock().networks.insert(
            region.to_string(),
            networks.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    /// Statuses reported by successive polls of a newly created instance.
    /// The last entry repeats; with no script, new instances report `active`.
    pub fn with_ready_script(self, statuses: &[&str]) -> Self {
        self.lock().ready_script = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn fail_on(&self, op: MockOp) {
        self.lock().failures.insert(op);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn instance(&self, server_id: &str) -> Option<Instance> {
        self.lock().instances.get(server_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, op: MockOp, call: MockCall) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failures.contains(&op) {
            return Err(anyhow!("mock provider: injected {:?} failure", op));
        }
        Ok(state)
    }
}

fn find_in_region<'a>(
    state: &'a mut MockState,
    region: &str,
    server_id: &str,
) -> Result<&'a mut Instance> {
    state
        .instances
        .get_mut(server_id)
        .filter(|i| i.region == region)
        .ok_or_else(|| anyhow!("instance {} not found in region {}", server_id, region))
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn home_region(&self) -> &str {
        &self.home_region
    }

    async fn list_regions(&self) -> Result<Vec<String>> {
        let state = self.begin(MockOp::ListRegions, MockCall::ListRegions)?;
        Ok(state.regions.clone())
    }

    async fn get_instance(&self, region: &str, server_id: &str) -> Result<Instance> {
        let mut state = self.begin(
            MockOp::GetInstance,
            MockCall::GetInstance {
                region: region.to_string(),
                server_id: server_id.to_string(),
            },
        )?;
        Ok(find_in_region(&mut state, region, server_id)?.clone())
    }

    async fn create_instance(
        &self,
        region: &str,
        request: &CreateInstanceRequest,
    ) -> Result<String> {
        let mut state = self.begin(
            MockOp::CreateInstance,
            MockCall::CreateInstance {
                region: region.to_string(),
                request: request.clone(),
            },
        )?;
        if !state.regions.iter().any(|r| r == region) {
            return Err(anyhow!("unknown region {}", region));
        }
        state.next_server += 1;
        let id = format!("mock-{}", state.next_server);
        let instance = Instance {
            id: id.clone(),
            name: request.name.clone(),
            status: InstanceStatus::Building,
            region: region.to_string(),
            image_id: Some(request.image_id.clone()),
            flavor_id: request.flavor_id.clone(),
            key_name: request.key_name.clone(),
            addresses: vec![InstanceAddress {
                network: request.network_id.clone(),
                addr: format!("10.0.{}.2", state.next_server),
                kind: AddressKind::Fixed,
            }],
        };
        state.instances.insert(id.clone(), instance);
        Ok(id)
    }

    async fn get_instance_status(&self, region: &str, server_id: &str) -> Result<String> {
        let mut state = self.begin(
            MockOp::GetInstanceStatus,
            MockCall::GetInstanceStatus {
                region: region.to_string(),
                server_id: server_id.to_string(),
            },
        )?;
        let next = if state.ready_script.len() > 1 {
            state.ready_script.pop_front()
        } else {
            state.ready_script.front().cloned()
        };
        let inst = find_in_region(&mut state, region, server_id)?;
        if inst.status == InstanceStatus::Building {
            let next = next.unwrap_or_else(|| "active".to_string());
            inst.status = InstanceStatus::parse(&next);
        }
        Ok(inst.status.as_str().to_string())
    }

    async fn list_networks(&self, region: &str) -> Result<Vec<String>> {
        let state = self.begin(
            MockOp::ListNetworks,
            MockCall::ListNetworks {
                region: region.to_string(),
            },
        )?;
        Ok(state.networks.get(region).cloned().unwrap_or_default())
    }

    async fn create_floating_ip(&self, region: &str) -> Result<String> {
        let mut state = self.begin(
            MockOp::CreateFloatingIp,
            MockCall::CreateFloatingIp {
                region: region.to_string(),
            },
        )?;
        state.next_address += 1;
        Ok(format!("198.51.100.{}", state.next_address))
    }

    async fn attach_floating_ip(
        &self,
        region: &str,
        server_id: &str,
        address: &str,
    ) -> Result<()> {
        let mut state = self.begin(
            MockOp::AttachFloatingIp,
            MockCall::AttachFloatingIp {
                region: region.to_string(),
                server_id: server_id.to_string(),
                address: address.to_string(),
            },
        )?;
        let inst = find_in_region(&mut state, region, server_id)?;
        let network = inst
            .addresses
            .first()
            .map(|a| a.network.clone())
            .unwrap_or_default();
        inst.addresses.push(InstanceAddress {
            network,
            addr: address.to_string(),
            kind: AddressKind::Floating,
        });
        Ok(())
    }

    async fn detach_floating_ip(
        &self,
        region: &str,
        server_id: &str,
        address: &str,
    ) -> Result<()> {
        let mut state = self.begin(
            MockOp::DetachFloatingIp,
            MockCall::DetachFloatingIp {
                region: region.to_string(),
                server_id: server_id.to_string(),
                address: address.to_string(),
            },
        )?;
        let inst = find_in_region(&mut state, region, server_id)?;
        let before = inst.addresses.len();
        inst.addresses
            .retain(|a| !(a.kind == AddressKind::Floating && a.addr == address));
        if inst.addresses.len() == before {
            return Err(anyhow!(
                "floating address {} is not attached to {}",
                address,
                server_id
            ));
        }
        Ok(())
    }

    async fn stop_instance(&self, region: &str, server_id: &str) -> Result<()> {
        let mut state = self.begin(
            MockOp::StopInstance,
            MockCall::StopInstance {
                region: region.to_string(),
                server_id: server_id.to_string(),
            },
        )?;
        let inst = find_in_region(&mut state, region, server_id)?;
        inst.status = InstanceStatus::Shutoff;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateInstanceRequest {
        CreateInstanceRequest {
            name: "relay-web".into(),
            image_id: "img".into(),
            flavor_id: "small".into(),
            network_id: "net".into(),
            key_name: None,
            security_groups: vec![],
        }
    }

    #[tokio::test]
    async fn created_instance_follows_ready_script() {
        let p = MockProvider::new("eu-1", &["eu-1", "eu-2"])
            .with_ready_script(&["building", "building", "active"]);
        let id = p.create_instance("eu-2", &request()).await.unwrap();
        assert_eq!(p.get_instance_status("eu-2", &id).await.unwrap(), "building");
        assert_eq!(p.get_instance_status("eu-2", &id).await.unwrap(), "building");
        assert_eq!(p.get_instance_status("eu-2", &id).await.unwrap(), "active");
        assert_eq!(p.get_instance_status("eu-2", &id).await.unwrap(), "active");
    }

    #[tokio::test]
    async fn lookups_are_region_scoped() {
        let p = MockProvider::new("eu-1", &["eu-1", "eu-2"]);
        let id = p.create_instance("eu-2", &request()).await.unwrap();
        assert!(p.get_instance("eu-1", &id).await.is_err());
        assert!(p.get_instance("eu-2", &id).await.is_ok());
        assert!(p.create_instance("us-1", &request()).await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_is_still_recorded() {
        let p = MockProvider::new("eu-1", &["eu-1"]);
        p.fail_on(MockOp::ListRegions);
        assert!(p.list_regions().await.is_err());
        assert_eq!(p.calls(), vec![MockCall::ListRegions]);
    }

    #[tokio::test]
    async fn detach_of_unattached_address_fails() {
        let p = MockProvider::new("eu-1", &["eu-1"]);
        let id = p.create_instance("eu-1", &request()).await.unwrap();
        let ip = p.create_floating_ip("eu-1").await.unwrap();
        assert!(p.detach_floating_ip("eu-1", &id, &ip).await.is_err());
        p.attach_floating_ip("eu-1", &id, &ip).await.unwrap();
        assert_eq!(p.instance(&id).unwrap().floating_address(), Some(ip.as_str()));
        p.detach_floating_ip("eu-1", &id, &ip).await.unwrap();
        assert_eq!(p.instance(&id).unwrap().floating_address(), None);
    }
}
