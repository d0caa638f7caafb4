use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;
pub mod error;

pub use config::{
    AlertingSettings, DnsSettings, DnsSetup, GuardianConfig, NetworkPolicy, ReadyWait,
    RegionOverrides,
};
pub use error::{ErrorKind, FailoverError, NetworkStep};

// --- Enums ---

/// Provider-reported lifecycle status of an instance, normalized to lower case.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Active,
    Building,
    Error,
    Shutoff,
    Unknown,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "active" => InstanceStatus::Active,
            "building" => InstanceStatus::Building,
            "error" => InstanceStatus::Error,
            "shutoff" => InstanceStatus::Shutoff,
            "unknown" | "" => InstanceStatus::Unknown,
            _ => InstanceStatus::Other(s),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Building => "building",
            InstanceStatus::Error => "error",
            InstanceStatus::Shutoff => "shutoff",
            InstanceStatus::Unknown => "unknown",
            InstanceStatus::Other(s) => s.as_str(),
        }
    }

    /// Only `active` and `building` count as healthy; every other status,
    /// recognized or not, is a confirmed bad status.
    pub fn health(&self) -> Health {
        match self {
            InstanceStatus::Active | InstanceStatus::Building => Health::Healthy,
            _ => Health::Unhealthy,
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(raw: String) -> Self {
        InstanceStatus::parse(&raw)
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Fixed,
    Floating,
}

// --- Entities ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InstanceAddress {
    pub network: String,
    pub addr: String,
    pub kind: AddressKind,
}

/// Transient view of a provider instance, fetched once per poll cycle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
    pub region: String,
    pub image_id: Option<String>,
    pub flavor_id: String,
    pub key_name: Option<String>,
    pub addresses: Vec<InstanceAddress>,
}

impl Instance {
    /// First address tagged `floating`, in provider order.
    pub fn floating_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.kind == AddressKind::Floating)
            .map(|a| a.addr.as_str())
    }
}

// --- Failover events ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailoverState {
    Detected,
    Provisioning,
    AwaitingReady,
    MigratingNetwork,
    StoppingSource,
    Notifying,
    Done,
    Aborted,
}

impl FailoverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverState::Detected => "detected",
            FailoverState::Provisioning => "provisioning",
            FailoverState::AwaitingReady => "awaiting-ready",
            FailoverState::MigratingNetwork => "migrating-network",
            FailoverState::StoppingSource => "stopping-source",
            FailoverState::Notifying => "notifying",
            FailoverState::Done => "done",
            FailoverState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FailoverState::Done | FailoverState::Aborted)
    }
}

impl std::fmt::Display for FailoverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailoverOutcome {
    Migrated,
    AllocatedNew,
    NoAddressMigrated,
    Failed,
}

impl FailoverOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverOutcome::Migrated => "migrated",
            FailoverOutcome::AllocatedNew => "allocated-new",
            FailoverOutcome::NoAddressMigrated => "no-address-migrated",
            FailoverOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DnsOutcome {
    Updated { hostname: String },
    Failed { error: String },
    Skipped { reason: String },
}

/// Result of the network identity step of one failover.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NetworkOutcome {
    Migrated {
        address: String,
    },
    MigrationFailed {
        address: String,
        detach_error: Option<String>,
        attach_error: Option<String>,
    },
    NoFloatingAddress,
    Allocated {
        address: String,
        dns: DnsOutcome,
    },
    AllocationFailed {
        address: Option<String>,
        error: String,
    },
}

impl NetworkOutcome {
    /// Address now attached to the replacement, if any.
    pub fn attached_address(&self) -> Option<&str> {
        match self {
            NetworkOutcome::Migrated { address } | NetworkOutcome::Allocated { address, .. } => {
                Some(address.as_str())
            }
            NetworkOutcome::MigrationFailed {
                address,
                attach_error: None,
                ..
            } => Some(address.as_str()),
            _ => None,
        }
    }

    pub fn dns(&self) -> Option<&DnsOutcome> {
        match self {
            NetworkOutcome::Allocated { dns, .. } => Some(dns),
            _ => None,
        }
    }

    pub fn outcome(&self) -> FailoverOutcome {
        match self {
            NetworkOutcome::Migrated { .. } => FailoverOutcome::Migrated,
            NetworkOutcome::Allocated { .. } => FailoverOutcome::AllocatedNew,
            NetworkOutcome::NoFloatingAddress => FailoverOutcome::NoAddressMigrated,
            NetworkOutcome::MigrationFailed { .. } | NetworkOutcome::AllocationFailed { .. } => {
                FailoverOutcome::Failed
            }
        }
    }
}

/// One end-to-end attempt to replace an unhealthy instance. Never persisted.
#[derive(Debug, Serialize, Clone)]
pub struct FailoverEvent {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub source: Instance,
    pub state: FailoverState,
    pub target_region: Option<String>,
    pub new_instance_id: Option<String>,
    pub network: Option<NetworkOutcome>,
    pub source_stopped: Option<bool>,
    pub notified: bool,
    pub abort_reason: Option<String>,
}

impl FailoverEvent {
    pub fn new(source: Instance) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            source,
            state: FailoverState::Detected,
            target_region: None,
            new_instance_id: None,
            network: None,
            source_stopped: None,
            notified: false,
            abort_reason: None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.network.as_ref().and_then(|n| n.attached_address())
    }

    /// Terminal outcome; `None` while the event is still running.
    pub fn outcome(&self) -> Option<FailoverOutcome> {
        match self.state {
            FailoverState::Aborted => Some(FailoverOutcome::Failed),
            FailoverState::Done => Some(
                self.network
                    .as_ref()
                    .map(|n| n.outcome())
                    .unwrap_or(FailoverOutcome::Failed),
            ),
            _ => None,
        }
    }
}
