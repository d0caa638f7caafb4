pub mod admin;
pub mod dns;
pub mod failover_flow;
pub mod health_check;
pub mod logger;
pub mod network_identity;
pub mod notifier;
pub mod provider_manager;
pub mod region_selector;
pub mod state_machine;
pub mod watch_dog_job;

use admin::StatusBoard;
use dns::{CloudflareDns, DnsUpdater};
use guardian_common::{GuardianConfig, NetworkPolicy};
use guardian_providers::CloudProvider;
use network_identity::DnsTarget;
use notifier::Notifier;
use std::sync::Arc;
use tracing::warn;

/// Everything one guardian process needs, built once at startup.
pub struct Guardian {
    pub config: Arc<GuardianConfig>,
    pub provider: Arc<dyn CloudProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub dns: Option<Arc<dyn DnsUpdater>>,
    pub board: StatusBoard,
}

impl Guardian {
    /// The Cloudflare client is built only when the DNS block is complete
    /// and the allocate-new policy is active.
    pub fn new(
        config: GuardianConfig,
        provider: Arc<dyn CloudProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let dns: Option<Arc<dyn DnsUpdater>> = match (config.network_policy, config.dns.settings()) {
            (NetworkPolicy::AllocateNew, Some(settings)) => {
                Some(Arc::new(CloudflareDns::new(settings.clone())?))
            }
            (NetworkPolicy::Migrate, Some(settings)) => {
                warn!(
                    record = %settings.record_name,
                    "DNS settings are ignored under the migrate policy"
                );
                None
            }
            (_, None) => None,
        };
        Ok(Self {
            config: Arc::new(config),
            provider,
            notifier,
            dns,
            board: StatusBoard::new(),
        })
    }

    pub fn with_dns(mut self, dns: Arc<dyn DnsUpdater>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn dns_target(&self) -> DnsTarget<'_> {
        DnsTarget::from_setup(&self.config.dns, self.dns.as_deref())
    }
}
