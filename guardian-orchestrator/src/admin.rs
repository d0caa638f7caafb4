use crate::health_check::HealthReport;
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use guardian_common::{FailoverEvent, GuardianConfig, Health};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct FailoverSummary {
    pub event_id: Uuid,
    pub state: String,
    pub outcome: Option<String>,
    pub target_region: Option<String>,
    pub new_instance_id: Option<String>,
    pub address: Option<String>,
    pub abort_reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl From<&FailoverEvent> for FailoverSummary {
    fn from(event: &FailoverEvent) -> Self {
        Self {
            event_id: event.id,
            state: event.state.as_str().to_string(),
            outcome: event.outcome().map(|o| o.as_str().to_string()),
            target_region: event.target_region.clone(),
            new_instance_id: event.new_instance_id.clone(),
            address: event.address().map(str::to_string),
            abort_reason: event.abort_reason.clone(),
            finished_at: Utc::now(),
        }
    }
}

/// Last observation of one watched instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub instance_id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub health: Option<Health>,
    pub last_checked: DateTime<Utc>,
    pub last_error: Option<String>,
    pub last_failover: Option<FailoverSummary>,
}

impl InstanceReport {
    fn empty(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            name: None,
            status: None,
            health: None,
            last_checked: Utc::now(),
            last_error: None,
            last_failover: None,
        }
    }
}

/// Written by the poll loop only, read by the admin endpoint.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<HashMap<String, InstanceReport>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, instance_id: &str, f: impl FnOnce(&mut InstanceReport)) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let report = map
            .entry(instance_id.to_string())
            .or_insert_with(|| InstanceReport::empty(instance_id));
        report.last_checked = Utc::now();
        f(report);
    }

    pub fn record_probe(&self, instance_id: &str, probe: &HealthReport) {
        self.update(instance_id, |r| {
            r.name = Some(probe.instance.name.clone());
            r.status = Some(probe.status.clone());
            r.health = Some(probe.health);
            r.last_error = None;
        });
    }

    pub fn record_error(&self, instance_id: &str, error: &str) {
        self.update(instance_id, |r| {
            r.last_error = Some(error.to_string());
        });
    }

    pub fn record_failover(&self, event: &FailoverEvent) {
        self.update(&event.source.id, |r| {
            r.last_failover = Some(FailoverSummary::from(event));
        });
    }

    pub fn get(&self, instance_id: &str) -> Option<InstanceReport> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(instance_id).cloned()
    }

    /// Reports sorted by instance id.
    pub fn snapshot(&self) -> Vec<InstanceReport> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<InstanceReport> = map.values().cloned().collect();
        out.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        out
    }
}

#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<GuardianConfig>,
    pub board: StatusBoard,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/admin/status", get(get_status))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AdminState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "admin endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root() -> &'static str {
    "Instance Guardian Online"
}

async fn get_status(State(state): State<AdminState>) -> impl IntoResponse {
    let config = &state.config;
    Json(json!({
        "instance_ids": config.instance_ids,
        "network_policy": config.network_policy.as_str(),
        "check_interval_secs": config.check_interval.as_secs(),
        "instances": state.board.snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use guardian_common::{Instance, InstanceStatus};
    use serde_json::Value;
    use std::collections::HashMap;

    fn config() -> Arc<GuardianConfig> {
        let vars: HashMap<String, String> = [
            ("INSTANCE_IDS", "i-1,i-2"),
            ("PUSHOVER_API_TOKEN", "t"),
            ("PUSHOVER_USER_KEY", "u"),
            ("CHECK_INTERVAL", "30"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Arc::new(GuardianConfig::from_vars(&vars).unwrap())
    }

    fn probe(status: &str) -> HealthReport {
        HealthReport {
            status: status.to_string(),
            health: crate::health_check::classify(status),
            instance: Instance {
                id: "i-1".into(),
                name: "web".into(),
                status: InstanceStatus::parse(status),
                region: "eu-1".into(),
                image_id: None,
                flavor_id: "small".into(),
                key_name: None,
                addresses: vec![],
            },
        }
    }

    #[tokio::test]
    async fn root_is_online() {
        let state = AdminState {
            config: config(),
            board: StatusBoard::new(),
        };
        let server = TestServer::new(router(state)).unwrap();
        let resp = server.get("/").await;
        resp.assert_status_ok();
        assert_eq!(resp.text(), "Instance Guardian Online");
    }

    #[tokio::test]
    async fn status_lists_config_and_observations() {
        let board = StatusBoard::new();
        board.record_probe("i-1", &probe("active"));
        board.record_error("i-2", "lookup timed out");
        let server = TestServer::new(router(AdminState {
            config: config(),
            board,
        }))
        .unwrap();

        let body: Value = server.get("/admin/status").await.json();
        assert_eq!(body["instance_ids"], json!(["i-1", "i-2"]));
        assert_eq!(body["network_policy"], "migrate");
        assert_eq!(body["check_interval_secs"], 30);
        assert_eq!(body["instances"][0]["instance_id"], "i-1");
        assert_eq!(body["instances"][0]["health"], "healthy");
        assert_eq!(body["instances"][1]["last_error"], "lookup timed out");
    }

    #[test]
    fn failover_is_recorded_against_source() {
        let board = StatusBoard::new();
        let mut event = FailoverEvent::new(probe("shutoff").instance);
        event.abort_reason = Some("no alternate region".into());
        event.state = guardian_common::FailoverState::Aborted;
        board.record_failover(&event);

        let report = board.get("i-1").unwrap();
        let summary = report.last_failover.unwrap();
        assert_eq!(summary.outcome.as_deref(), Some("failed"));
        assert_eq!(summary.state, "aborted");
    }
}
