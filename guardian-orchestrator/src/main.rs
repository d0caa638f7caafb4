use anyhow::Context;
use guardian_common::{DnsSetup, GuardianConfig};
use guardian_orchestrator::admin::{self, AdminState};
use guardian_orchestrator::notifier::PushoverNotifier;
use guardian_orchestrator::provider_manager::ProviderManager;
use guardian_orchestrator::{watch_dog_job, Guardian};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let vars: HashMap<String, String> = std::env::vars().collect();
    let config = GuardianConfig::from_vars(&vars).context("invalid guardian configuration")?;

    if let DnsSetup::Incomplete { missing } = &config.dns {
        warn!(missing = ?missing, "DNS configuration incomplete, DNS updates will be skipped");
    }
    info!(
        provider = %config.provider,
        instances = config.instance_ids.len(),
        policy = config.network_policy.as_str(),
        "configuration loaded"
    );

    let provider = ProviderManager::get_provider(&config.provider, &vars)
        .with_context(|| format!("cannot initialise provider '{}'", config.provider))?;
    let notifier = PushoverNotifier::new(config.alerting.clone())?;
    let admin_addr = config.admin_bind_addr;

    let guardian = Arc::new(Guardian::new(config, provider, Arc::new(notifier))?);

    if let Some(addr) = admin_addr {
        let state = AdminState {
            config: guardian.config.clone(),
            board: guardian.board.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = admin::serve(addr, state).await {
                error!(error = %e, "admin endpoint stopped");
            }
        });
    }

    watch_dog_job::run(guardian).await;
    Ok(())
}
