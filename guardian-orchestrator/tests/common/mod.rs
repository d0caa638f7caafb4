// Common test utilities and fixtures
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use guardian_common::{
    AddressKind, GuardianConfig, Instance, InstanceAddress, InstanceStatus, ReadyWait,
};
use guardian_orchestrator::dns::DnsUpdater;
use guardian_orchestrator::notifier::Notifier;
use guardian_orchestrator::Guardian;
use guardian_providers::mock::{MockCall, MockProvider};
use guardian_providers::CloudProvider;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;

/// Notifier that keeps every (title, message) it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        if self.fail {
            return Err(anyhow!("alerting endpoint returned 503"));
        }
        Ok(())
    }
}

pub struct RecordingDns {
    pub hostname: String,
    pub updates: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingDns {
    pub fn new(fail: bool) -> Self {
        Self {
            hostname: "app.example.com".to_string(),
            updates: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsUpdater for RecordingDns {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn update_record(&self, address: &str) -> Result<()> {
        self.updates.lock().unwrap().push(address.to_string());
        if self.fail {
            return Err(anyhow!("DNS update rejected: status=500"));
        }
        Ok(())
    }
}

pub const DNS_VARS: [(&str, &str); 4] = [
    ("CLOUDFLARE_API_TOKEN", "cf-token"),
    ("CLOUDFLARE_ZONE_ID", "zone-1"),
    ("CLOUDFLARE_RECORD_ID", "rec-1"),
    ("DNS_RECORD_NAME", "app.example.com"),
];

/// Config watching `i-1` with a short ready wait. `extra` overrides or adds keys.
pub fn config(extra: &[(&str, &str)]) -> GuardianConfig {
    let mut vars: HashMap<String, String> = [
        ("INSTANCE_IDS", "i-1"),
        ("PUSHOVER_API_TOKEN", "app-token"),
        ("PUSHOVER_USER_KEY", "user-key"),
        ("ADMIN_BIND_ADDR", "off"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let mut config = GuardianConfig::from_vars(&vars).unwrap();
    config.ready_wait = ReadyWait {
        timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
    };
    config
}

/// `web` (`i-1`) in `eu-1`, with a fixed address and an optional floating one.
pub fn source_instance(status: &str, floating: Option<&str>) -> Instance {
    let mut addresses = vec![InstanceAddress {
        network: "private".to_string(),
        addr: "10.0.0.4".to_string(),
        kind: AddressKind::Fixed,
    }];
    if let Some(addr) = floating {
        addresses.push(InstanceAddress {
            network: "private".to_string(),
            addr: addr.to_string(),
            kind: AddressKind::Floating,
        });
    }
    Instance {
        id: "i-1".to_string(),
        name: "web".to_string(),
        status: InstanceStatus::parse(status),
        region: "eu-1".to_string(),
        image_id: Some("img-ubuntu".to_string()),
        flavor_id: "small".to_string(),
        key_name: Some("deploy".to_string()),
        addresses,
    }
}

/// Two-region mock cloud with one network per region.
pub fn two_region_cloud() -> MockProvider {
    MockProvider::new("eu-1", &["eu-1", "eu-2"])
        .with_networks("eu-1", &["net-eu1"])
        .with_networks("eu-2", &["net-eu2", "net-eu2-b"])
}

pub struct Harness {
    pub guardian: Guardian,
    pub cloud: Arc<MockProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(config: GuardianConfig, cloud: MockProvider) -> Harness {
    harness_with_notifier(config, cloud, RecordingNotifier::default())
}

pub fn harness_with_notifier(
    config: GuardianConfig,
    cloud: MockProvider,
    notifier: RecordingNotifier,
) -> Harness {
    let cloud = Arc::new(cloud);
    let notifier = Arc::new(notifier);
    let provider: Arc<dyn CloudProvider> = cloud.clone();
    let guardian = Guardian::new(config, provider, notifier.clone()).unwrap();
    Harness {
        guardian,
        cloud,
        notifier,
    }
}

pub fn count_calls(cloud: &MockProvider, pred: impl Fn(&MockCall) -> bool) -> usize {
    cloud.calls().iter().filter(|c| pred(c)).count()
}

pub fn created_requests(cloud: &MockProvider) -> Vec<(String, guardian_providers::CreateInstanceRequest)> {
    cloud
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::CreateInstance { region, request } => Some((region, request)),
            _ => None,
        })
        .collect()
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's log output into a buffer until the guard drops.
pub fn capture_logs() -> (DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}
