//! Startup configuration.
//!
//! Everything is read once from the process environment (after `.env` is
//! loaded) and frozen into a [`GuardianConfig`] that is handed to every
//! component. Parsing works on a plain key/value map so tests don't have to
//! touch the real environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;

use crate::error::FailoverError;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_READY_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_DNS_TTL: u32 = 60;
pub const DEFAULT_NAME_PREFIX: &str = "relay-";
pub const DEFAULT_PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";
pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_ADMIN_BIND_ADDR: &str = "0.0.0.0:8001";

const NETWORK_ID_PREFIX: &str = "NETWORK_ID_";
const SECURITY_GROUPS_PREFIX: &str = "SECURITY_GROUPS_";
const KEYPAIR_PREFIX: &str = "KEYPAIR_";

const DNS_KEYS: [&str; 4] = [
    "CLOUDFLARE_API_TOKEN",
    "CLOUDFLARE_ZONE_ID",
    "CLOUDFLARE_RECORD_ID",
    "DNS_RECORD_NAME",
];

/// How the public address of a failed instance is carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPolicy {
    /// Move the source's floating address onto the replacement.
    Migrate,
    /// Allocate a fresh floating address in the target region, then update DNS.
    AllocateNew,
}

impl NetworkPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "migrate" => Some(NetworkPolicy::Migrate),
            "allocate-new" | "allocate" => Some(NetworkPolicy::AllocateNew),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkPolicy::Migrate => "migrate",
            NetworkPolicy::AllocateNew => "allocate-new",
        }
    }
}

/// Per-region provisioning parameters. Unset fields fall back to provider
/// discovery or to the source instance's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegionOverrides {
    pub network_id: Option<String>,
    pub security_groups: Vec<String>,
    pub key_name: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AlertingSettings {
    pub api_url: String,
    pub api_token: String,
    pub user_key: String,
}

impl std::fmt::Debug for AlertingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertingSettings")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("user_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DnsSettings {
    pub api_url: String,
    pub api_token: String,
    pub zone_id: String,
    pub record_id: String,
    pub record_name: String,
    pub ttl: u32,
}

impl std::fmt::Debug for DnsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsSettings")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("zone_id", &self.zone_id)
            .field("record_id", &self.record_id)
            .field("record_name", &self.record_name)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsSetup {
    Disabled,
    /// Some but not all DNS keys are set; the DNS step is skipped.
    Incomplete { missing: Vec<&'static str> },
    Ready(DnsSettings),
}

impl DnsSetup {
    pub fn settings(&self) -> Option<&DnsSettings> {
        match self {
            DnsSetup::Ready(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadyWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_READY_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub instance_ids: Vec<String>,
    pub check_interval: Duration,
    pub alerting: AlertingSettings,
    pub network_policy: NetworkPolicy,
    pub dns: DnsSetup,
    pub regions: HashMap<String, RegionOverrides>,
    pub ready_wait: ReadyWait,
    pub name_prefix: String,
    pub provider: String,
    pub admin_bind_addr: Option<SocketAddr>,
}

impl GuardianConfig {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, FailoverError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| FailoverError::Configuration(format!("{key} must be set")))
        };

        let instance_ids = parse_list(&required("INSTANCE_IDS")?);
        if instance_ids.is_empty() {
            return Err(FailoverError::Configuration(
                "INSTANCE_IDS must list at least one instance".to_string(),
            ));
        }

        let check_interval = Duration::from_secs(parse_secs(
            vars,
            "CHECK_INTERVAL",
            DEFAULT_CHECK_INTERVAL_SECS,
        )?);

        let alerting = AlertingSettings {
            api_url: get("PUSHOVER_API_URL").unwrap_or_else(|| DEFAULT_PUSHOVER_API_URL.to_string()),
            api_token: required("PUSHOVER_API_TOKEN")?,
            user_key: required("PUSHOVER_USER_KEY")?,
        };

        let dns = parse_dns(vars)?;
        let network_policy = match get("NETWORK_POLICY") {
            Some(raw) => NetworkPolicy::parse(&raw).ok_or_else(|| {
                FailoverError::Configuration(format!(
                    "NETWORK_POLICY must be 'migrate' or 'allocate-new', got '{raw}'"
                ))
            })?,
            None if dns != DnsSetup::Disabled => NetworkPolicy::AllocateNew,
            None => NetworkPolicy::Migrate,
        };

        let ready_wait = ReadyWait {
            timeout: Duration::from_secs(parse_secs(
                vars,
                "READY_TIMEOUT_SECS",
                DEFAULT_READY_TIMEOUT_SECS,
            )?),
            poll_interval: Duration::from_secs(parse_secs(
                vars,
                "READY_POLL_INTERVAL_SECS",
                DEFAULT_READY_POLL_INTERVAL_SECS,
            )?),
        };

        let admin_bind_addr = match get("ADMIN_BIND_ADDR").as_deref() {
            Some("off") | Some("none") => None,
            raw => {
                let raw = raw.unwrap_or(DEFAULT_ADMIN_BIND_ADDR);
                Some(raw.parse::<SocketAddr>().map_err(|e| {
                    FailoverError::Configuration(format!("ADMIN_BIND_ADDR '{raw}': {e}"))
                })?)
            }
        };

        Ok(Self {
            instance_ids,
            check_interval,
            alerting,
            network_policy,
            dns,
            regions: parse_region_overrides(vars),
            ready_wait,
            name_prefix: get("FAILOVER_NAME_PREFIX")
                .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string()),
            provider: get("PROVIDER")
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or_else(|| "openstack".to_string()),
            admin_bind_addr,
        })
    }

    /// Overrides for `region`, empty when none are configured.
    pub fn region_overrides(&self, region: &str) -> RegionOverrides {
        self.regions.get(region).cloned().unwrap_or_default()
    }
}

/// Comma-separated list, trimmed, empty entries dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_secs(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, FailoverError> {
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(FailoverError::Configuration(format!(
                "{key} must be greater than zero"
            ))),
            Ok(v) => Ok(v),
            Err(e) => Err(FailoverError::Configuration(format!(
                "{key} '{raw}' is not a number of seconds: {e}"
            ))),
        },
    }
}

fn parse_dns(vars: &HashMap<String, String>) -> Result<DnsSetup, FailoverError> {
    let present: Vec<(&'static str, Option<String>)> = DNS_KEYS
        .iter()
        .map(|k| {
            (
                *k,
                vars.get(*k)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            )
        })
        .collect();

    let missing: Vec<&'static str> = present
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();

    if missing.len() == DNS_KEYS.len() {
        return Ok(DnsSetup::Disabled);
    }
    if !missing.is_empty() {
        return Ok(DnsSetup::Incomplete { missing });
    }

    let value = |i: usize| present[i].1.clone().unwrap_or_default();
    let ttl = match vars.get("DNS_RECORD_TTL").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => DEFAULT_DNS_TTL,
        Some(raw) => raw.parse::<u32>().map_err(|e| {
            FailoverError::Configuration(format!("DNS_RECORD_TTL '{raw}': {e}"))
        })?,
    };

    Ok(DnsSetup::Ready(DnsSettings {
        api_url: vars
            .get("CLOUDFLARE_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_URL.to_string()),
        api_token: value(0),
        zone_id: value(1),
        record_id: value(2),
        record_name: value(3),
        ttl,
    }))
}

fn parse_region_overrides(vars: &HashMap<String, String>) -> HashMap<String, RegionOverrides> {
    let mut out: HashMap<String, RegionOverrides> = HashMap::new();
    for (key, value) in vars {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if let Some(region) = key.strip_prefix(NETWORK_ID_PREFIX).filter(|r| !r.is_empty()) {
            out.entry(region.to_string()).or_default().network_id = Some(value.to_string());
        } else if let Some(region) = key
            .strip_prefix(SECURITY_GROUPS_PREFIX)
            .filter(|r| !r.is_empty())
        {
            out.entry(region.to_string()).or_default().security_groups = parse_list(value);
        } else if let Some(region) = key.strip_prefix(KEYPAIR_PREFIX).filter(|r| !r.is_empty()) {
            out.entry(region.to_string()).or_default().key_name = Some(value.to_string());
        }
    }
    out
}
