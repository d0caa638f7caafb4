use crate::failover_flow::execute_failover;
use crate::health_check::probe;
use crate::Guardian;
use futures_util::FutureExt;
use guardian_common::{FailoverEvent, FailoverState, Health};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum CheckResult {
    Healthy,
    FailedOver(Box<FailoverEvent>),
    /// Health unknown this cycle, or the instance was already replaced.
    Skipped(String),
}

/// Poll forever. Instances are handled one at a time, in configured order.
pub async fn run(guardian: Arc<Guardian>) {
    info!(
        instances = ?guardian.config.instance_ids,
        interval_secs = guardian.config.check_interval.as_secs(),
        policy = guardian.config.network_policy.as_str(),
        "watch dog started"
    );
    let mut replaced = HashSet::new();
    loop {
        run_cycle(&guardian, &mut replaced).await;
        sleep(guardian.config.check_interval).await;
    }
}

/// One pass over every configured instance. A panic or error for one
/// instance is logged and the pass continues with the next.
///
/// Instances whose failover reached `done` are added to `replaced` and not
/// probed again: their source is stopped on purpose.
pub async fn run_cycle(
    guardian: &Guardian,
    replaced: &mut HashSet<String>,
) -> Vec<(String, CheckResult)> {
    let mut results = Vec::with_capacity(guardian.config.instance_ids.len());
    for instance_id in &guardian.config.instance_ids {
        if replaced.contains(instance_id) {
            debug!(instance_id = %instance_id, "already failed over, not watched");
            results.push((
                instance_id.clone(),
                CheckResult::Skipped("already failed over".to_string()),
            ));
            continue;
        }

        let result = match AssertUnwindSafe(check_instance(guardian, instance_id))
            .catch_unwind()
            .await
        {
            Ok(r) => r,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(instance_id = %instance_id, panic = %msg, "instance check panicked");
                guardian.board.record_error(instance_id, &msg);
                CheckResult::Skipped(msg)
            }
        };

        if let CheckResult::FailedOver(event) = &result {
            if event.state == FailoverState::Done {
                replaced.insert(instance_id.clone());
            }
        }
        results.push((instance_id.clone(), result));
    }
    results
}

pub async fn check_instance(guardian: &Guardian, instance_id: &str) -> CheckResult {
    let provider = guardian.provider.as_ref();
    let report = match probe(provider, provider.home_region(), instance_id).await {
        Ok(r) => r,
        Err(e) => {
            guardian.board.record_error(instance_id, &e.to_string());
            return CheckResult::Skipped(e.to_string());
        }
    };
    guardian.board.record_probe(instance_id, &report);

    match report.health {
        Health::Healthy => {
            info!(instance_id, name = %report.instance.name, status = %report.status, "instance OK");
            CheckResult::Healthy
        }
        Health::Unhealthy => {
            warn!(
                instance_id,
                name = %report.instance.name,
                status = %report.status,
                "instance unhealthy, starting failover"
            );
            let event = execute_failover(guardian, report.instance).await;
            guardian.board.record_failover(&event);
            CheckResult::FailedOver(Box::new(event))
        }
    }
}
