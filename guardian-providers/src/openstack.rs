use crate::{CloudProvider, CreateInstanceRequest};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use guardian_common::{AddressKind, Instance, InstanceAddress, InstanceStatus};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ADDRESS_TYPE_KEY: &str = "OS-EXT-IPS:type";

/// Keystone v3 password credentials, read from the usual `OS_*` variables.
#[derive(Clone)]
pub struct OpenStackCredentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub region_name: String,
    pub interface: String,
}

impl std::fmt::Debug for OpenStackCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackCredentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .finish()
    }
}

impl OpenStackCredentials {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| get(key).with_context(|| format!("{key} must be set"));

        let project_id = get("OS_PROJECT_ID");
        let project_name = get("OS_PROJECT_NAME");
        if project_id.is_none() && project_name.is_none() {
            return Err(anyhow!("OS_PROJECT_ID or OS_PROJECT_NAME must be set"));
        }

        Ok(Self {
            auth_url: normalize_auth_url(&required("OS_AUTH_URL")?),
            username: required("OS_USERNAME")?,
            password: required("OS_PASSWORD")?,
            project_id,
            project_name,
            user_domain_name: get("OS_USER_DOMAIN_NAME").unwrap_or_else(|| "Default".to_string()),
            project_domain_name: get("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".to_string()),
            region_name: required("OS_REGION_NAME")?,
            interface: get("OS_INTERFACE").unwrap_or_else(|| "public".to_string()),
        })
    }
}

fn normalize_auth_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        format!("{}/v3", trimmed)
    }
}

/// Nova reports `BUILD` while the guardian speaks of `building`.
pub fn normalize_status(raw: &str) -> String {
    let s = raw.trim().to_ascii_lowercase();
    if s == "build" {
        "building".to_string()
    } else {
        s
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    url: String,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    expires_at: DateTime<Utc>,
    catalog: Vec<CatalogEntry>,
}

impl Session {
    fn is_fresh(&self) -> bool {
        self.expires_at - ChronoDuration::seconds(60) > Utc::now()
    }

    fn endpoint(&self, service_type: &str, region: &str, interface: &str) -> Result<String> {
        self.catalog
            .iter()
            .filter(|e| e.service_type == service_type)
            .flat_map(|e| e.endpoints.iter())
            .find(|ep| {
                ep.interface == interface
                    && (ep.region_id.as_deref() == Some(region)
                        || ep.region.as_deref() == Some(region))
            })
            .map(|ep| ep.url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                anyhow!(
                    "no {} endpoint for {} in region {}",
                    interface,
                    service_type,
                    region
                )
            })
    }
}

pub struct OpenStackProvider {
    client: Client,
    creds: OpenStackCredentials,
    session: Mutex<Option<Session>>,
}

impl OpenStackProvider {
    pub fn new(creds: OpenStackCredentials) -> Result<Self> {
        // reqwest has no overall timeout by default; a stalled API would hang the poll loop.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            creds,
            session: Mutex::new(None),
        })
    }

    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref().filter(|s| s.is_fresh()) {
            return Ok(session.clone());
        }
        let session = self.authenticate().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn authenticate(&self) -> Result<Session> {
        let scope = match (&self.creds.project_id, &self.creds.project_name) {
            (Some(id), _) => json!({ "project": { "id": id } }),
            (None, Some(name)) => json!({
                "project": { "name": name, "domain": { "name": self.creds.project_domain_name } }
            }),
            (None, None) => return Err(anyhow!("no project scope configured")),
        };
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.creds.username,
                            "domain": { "name": self.creds.user_domain_name },
                            "password": self.creds.password,
                        }
                    }
                },
                "scope": scope,
            }
        });

        let url = format!("{}/auth/tokens", self.creds.auth_url);
        debug!(url = %url, user = %self.creds.username, "requesting keystone token");
        let resp = self.client.post(&url).json(&body).send().await?;
        let resp = ensure_success(resp, "keystone authentication").await?;

        let token = resp
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("keystone response has no X-Subject-Token header"))?;

        let json_resp: Value = resp.json().await?;
        let expires_at = json_resp["token"]["expires_at"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + ChronoDuration::minutes(30));
        let catalog: Vec<CatalogEntry> =
            serde_json::from_value(json_resp["token"]["catalog"].clone()).unwrap_or_default();

        info!(
            expires_at = %expires_at,
            services = catalog.len(),
            "keystone token issued"
        );
        Ok(Session {
            token,
            expires_at,
            catalog,
        })
    }

    async fn compute(&self, region: &str) -> Result<(Session, String)> {
        let session = self.session().await?;
        let url = session.endpoint("compute", region, &self.creds.interface)?;
        Ok((session, url))
    }

    async fn network(&self, region: &str) -> Result<(Session, String)> {
        let session = self.session().await?;
        let mut url = session.endpoint("network", region, &self.creds.interface)?;
        if !url.ends_with("/v2.0") {
            url.push_str("/v2.0");
        }
        Ok((session, url))
    }

    async fn get_json(&self, session: &Session, url: &str, what: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header("X-Auth-Token", &session.token)
            .send()
            .await?;
        let resp = ensure_success(resp, what).await?;
        Ok(resp.json().await?)
    }

    async fn find_floating_ip_id(
        &self,
        session: &Session,
        base: &str,
        address: &str,
    ) -> Result<String> {
        let url = format!("{}/floatingips?floating_ip_address={}", base, address);
        let json_resp = self.get_json(session, &url, "floating ip lookup").await?;
        json_resp["floatingips"]
            .as_array()
            .and_then(|l| l.first())
            .and_then(|f| f["id"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("floating address {} not found", address))
    }

    async fn set_floating_ip_port(
        &self,
        session: &Session,
        base: &str,
        fip_id: &str,
        port_id: Option<&str>,
    ) -> Result<()> {
        let url = format!("{}/floatingips/{}", base, fip_id);
        let body = json!({ "floatingip": { "port_id": port_id } });
        let resp = self
            .client
            .put(&url)
            .header("X-Auth-Token", &session.token)
            .json(&body)
            .send()
            .await?;
        ensure_success(resp, "floating ip update").await?;
        Ok(())
    }
}

async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(anyhow!("OpenStack {} failed: not found ({})", what, text));
    }
    Err(anyhow!(
        "OpenStack {} failed: status={} body={}",
        what,
        status.as_u16(),
        text
    ))
}

/// Maps a Nova `server` object into the guardian's instance view.
fn parse_server(server: &Value, region: &str) -> Result<Instance> {
    let id = server["id"]
        .as_str()
        .ok_or_else(|| anyhow!("server payload has no id"))?
        .to_string();

    // Boot-from-volume servers report `image: ""`.
    let image_id = server["image"]["id"].as_str().map(|s| s.to_string());
    // Microversion 2.47+ embeds the flavor and drops its id.
    let flavor_id = server["flavor"]["id"]
        .as_str()
        .or_else(|| server["flavor"]["original_name"].as_str())
        .unwrap_or_default()
        .to_string();

    let mut addresses = Vec::new();
    if let Some(nets) = server["addresses"].as_object() {
        for (network, entries) in nets {
            for entry in entries.as_array().into_iter().flatten() {
                let Some(addr) = entry["addr"].as_str() else {
                    continue;
                };
                let kind = match entry[ADDRESS_TYPE_KEY].as_str() {
                    Some("floating") => AddressKind::Floating,
                    _ => AddressKind::Fixed,
                };
                addresses.push(InstanceAddress {
                    network: network.clone(),
                    addr: addr.to_string(),
                    kind,
                });
            }
        }
    }

    Ok(Instance {
        id,
        name: server["name"].as_str().unwrap_or_default().to_string(),
        status: InstanceStatus::parse(&normalize_status(
            server["status"].as_str().unwrap_or("unknown"),
        )),
        region: region.to_string(),
        image_id,
        flavor_id,
        key_name: server["key_name"].as_str().map(|s| s.to_string()),
        addresses,
    })
}

#[async_trait]
impl CloudProvider for OpenStackProvider {
    fn home_region(&self) -> &str {
        &self.creds.region_name
    }

    async fn list_regions(&self) -> Result<Vec<String>> {
        let session = self.session().await?;
        let url = format!("{}/regions", self.creds.auth_url);
        let json_resp = self.get_json(&session, &url, "region listing").await?;
        Ok(json_resp["regions"]
            .as_array()
            .map(|l| {
                l.iter()
                    .filter_map(|r| r["id"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_instance(&self, region: &str, server_id: &str) -> Result<Instance> {
        let (session, base) = self.compute(region).await?;
        let url = format!("{}/servers/{}", base, server_id);
        let json_resp = self.get_json(&session, &url, "server lookup").await?;
        parse_server(&json_resp["server"], region)
    }

    async fn create_instance(
        &self,
        region: &str,
        request: &CreateInstanceRequest,
    ) -> Result<String> {
        let (session, base) = self.compute(region).await?;
        let url = format!("{}/servers", base);

        let mut server = json!({
            "name": request.name,
            "imageRef": request.image_id,
            "flavorRef": request.flavor_id,
            "networks": [{ "uuid": request.network_id }],
        });
        if let Some(key) = &request.key_name {
            server["key_name"] = json!(key);
        }
        if !request.security_groups.is_empty() {
            server["security_groups"] = json!(request
                .security_groups
                .iter()
                .map(|g| json!({ "name": g }))
                .collect::<Vec<_>>());
        }

        info!(
            region = %region,
            name = %request.name,
            image = %request.image_id,
            flavor = %request.flavor_id,
            network = %request.network_id,
            "creating server"
        );
        let resp = self
            .client
            .post(&url)
            .header("X-Auth-Token", &session.token)
            .json(&json!({ "server": server }))
            .send()
            .await?;
        let resp = ensure_success(resp, "server create").await?;
        let json_resp: Value = resp.json().await?;
        json_resp["server"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("no server id in create response"))
    }

    async fn get_instance_status(&self, region: &str, server_id: &str) -> Result<String> {
        let instance = self.get_instance(region, server_id).await?;
        Ok(instance.status.as_str().to_string())
    }

    async fn list_networks(&self, region: &str) -> Result<Vec<String>> {
        let (session, base) = self.network(region).await?;
        let url = format!("{}/networks", base);
        let json_resp = self.get_json(&session, &url, "network listing").await?;
        Ok(json_resp["networks"]
            .as_array()
            .map(|l| {
                l.iter()
                    .filter_map(|n| n["id"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_floating_ip(&self, region: &str) -> Result<String> {
        let (session, base) = self.network(region).await?;
        let url = format!("{}/networks?router:external=true", base);
        let json_resp = self
            .get_json(&session, &url, "external network lookup")
            .await?;
        let external = json_resp["networks"]
            .as_array()
            .and_then(|l| l.first())
            .and_then(|n| n["id"].as_str())
            .ok_or_else(|| anyhow!("no external network in region {}", region))?
            .to_string();

        let resp = self
            .client
            .post(format!("{}/floatingips", base))
            .header("X-Auth-Token", &session.token)
            .json(&json!({ "floatingip": { "floating_network_id": external } }))
            .send()
            .await?;
        let resp = ensure_success(resp, "floating ip create").await?;
        let json_resp: Value = resp.json().await?;
        let address = json_resp["floatingip"]["floating_ip_address"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("no floating_ip_address in create response"))?;
        info!(region = %region, address = %address, network = %external, "floating ip allocated");
        Ok(address)
    }

    async fn attach_floating_ip(
        &self,
        region: &str,
        server_id: &str,
        address: &str,
    ) -> Result<()> {
        let (session, base) = self.network(region).await?;
        let ports_url = format!("{}/ports?device_id={}", base, server_id);
        let ports = self.get_json(&session, &ports_url, "port lookup").await?;
        let port_id = ports["ports"]
            .as_array()
            .and_then(|l| l.first())
            .and_then(|p| p["id"].as_str())
            .ok_or_else(|| anyhow!("server {} has no port in region {}", server_id, region))?
            .to_string();

        let fip_id = self.find_floating_ip_id(&session, &base, address).await?;
        self.set_floating_ip_port(&session, &base, &fip_id, Some(&port_id))
            .await?;
        info!(region = %region, server_id = %server_id, address = %address, "floating ip attached");
        Ok(())
    }

    async fn detach_floating_ip(
        &self,
        region: &str,
        server_id: &str,
        address: &str,
    ) -> Result<()> {
        let (session, base) = self.network(region).await?;
        let fip_id = self.find_floating_ip_id(&session, &base, address).await?;
        self.set_floating_ip_port(&session, &base, &fip_id, None)
            .await?;
        info!(region = %region, server_id = %server_id, address = %address, "floating ip detached");
        Ok(())
    }

    async fn stop_instance(&self, region: &str, server_id: &str) -> Result<()> {
        match self.get_instance(region, server_id).await {
            Ok(inst) if inst.status == InstanceStatus::Shutoff => {
                info!(region = %region, server_id = %server_id, "server already stopped");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => warn!(server_id = %server_id, error = %e, "state check before stop failed"),
        }

        let (session, base) = self.compute(region).await?;
        let url = format!("{}/servers/{}/action", base, server_id);
        let resp = self
            .client
            .post(&url)
            .header("X-Auth-Token", &session.token)
            .json(&json!({ "os-stop": null }))
            .send()
            .await?;
        ensure_success(resp, "server stop").await?;
        info!(region = %region, server_id = %server_id, "stop requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds(server: &MockServer) -> OpenStackCredentials {
        OpenStackCredentials {
            auth_url: format!("{}/identity/v3", server.uri()),
            username: "guardian".into(),
            password: "secret".into(),
            project_id: Some("p-1".into()),
            project_name: None,
            user_domain_name: "Default".into(),
            project_domain_name: "Default".into(),
            region_name: "eu-1".into(),
            interface: "public".into(),
        }
    }

    async fn mount_auth(server: &MockServer) {
        let catalog = json!({
            "token": {
                "expires_at": "2999-01-01T00:00:00Z",
                "catalog": [
                    { "type": "compute", "endpoints": [
                        { "interface": "public", "region_id": "eu-1", "url": format!("{}/compute/eu-1/v2.1", server.uri()) },
                        { "interface": "public", "region_id": "eu-2", "url": format!("{}/compute/eu-2/v2.1", server.uri()) }
                    ]},
                    { "type": "network", "endpoints": [
                        { "interface": "public", "region_id": "eu-2", "url": format!("{}/network/eu-2/", server.uri()) }
                    ]}
                ]
            }
        });
        Mock::given(method("POST"))
            .and(path("/identity/v3/auth/tokens"))
            .and(body_partial_json(json!({"auth": {"scope": {"project": {"id": "p-1"}}}})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", "tok-1")
                    .set_body_json(catalog),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn auth_url_gets_v3_suffix() {
        assert_eq!(normalize_auth_url("https://id.example/"), "https://id.example/v3");
        assert_eq!(normalize_auth_url("https://id.example/v3/"), "https://id.example/v3");
    }

    #[test]
    fn credentials_require_a_project() {
        let vars: HashMap<String, String> = [
            ("OS_AUTH_URL", "https://id.example"),
            ("OS_USERNAME", "u"),
            ("OS_PASSWORD", "p"),
            ("OS_REGION_NAME", "eu-1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert!(OpenStackCredentials::from_vars(&vars).is_err());

        let mut vars = vars;
        vars.insert("OS_PROJECT_NAME".into(), "prod".into());
        let c = OpenStackCredentials::from_vars(&vars).unwrap();
        assert_eq!(c.auth_url, "https://id.example/v3");
        assert_eq!(c.user_domain_name, "Default");
        assert_eq!(c.interface, "public");
        assert!(!format!("{c:?}").contains("\"p\""));
    }

    #[test]
    fn server_payload_maps_addresses_and_status() {
        let server = json!({
            "id": "srv-1",
            "name": "web",
            "status": "BUILD",
            "image": "",
            "flavor": { "original_name": "a2-ram4" },
            "key_name": null,
            "addresses": {
                "ext-net": [
                    { "addr": "10.0.0.4", "OS-EXT-IPS:type": "fixed" },
                    { "addr": "203.0.113.5", "OS-EXT-IPS:type": "floating" }
                ]
            }
        });
        let inst = parse_server(&server, "eu-1").unwrap();
        assert_eq!(inst.status, InstanceStatus::Building);
        assert_eq!(inst.image_id, None);
        assert_eq!(inst.flavor_id, "a2-ram4");
        assert_eq!(inst.floating_address(), Some("203.0.113.5"));
        assert_eq!(inst.region, "eu-1");
    }

    #[tokio::test]
    async fn token_is_reused_across_calls() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/compute/eu-1/v2.1/servers/srv-1"))
            .and(header("X-Auth-Token", "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {
                    "id": "srv-1", "name": "web", "status": "SHUTOFF",
                    "image": { "id": "img-1" }, "flavor": { "id": "fl-1" },
                    "key_name": "ops", "addresses": {}
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = OpenStackProvider::new(creds(&server)).unwrap();
        let inst = provider.get_instance("eu-1", "srv-1").await.unwrap();
        assert_eq!(inst.status, InstanceStatus::Shutoff);
        assert_eq!(inst.image_id.as_deref(), Some("img-1"));
        assert_eq!(inst.key_name.as_deref(), Some("ops"));
        assert_eq!(
            provider.get_instance_status("eu-1", "srv-1").await.unwrap(),
            "shutoff"
        );
    }

    #[tokio::test]
    async fn missing_server_is_an_error() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/compute/eu-1/v2.1/servers/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("itemNotFound"))
            .mount(&server)
            .await;

        let provider = OpenStackProvider::new(creds(&server)).unwrap();
        let err = provider.get_instance("eu-1", "gone").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn create_sends_security_groups_and_keypair() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/compute/eu-2/v2.1/servers"))
            .and(body_partial_json(json!({
                "server": {
                    "name": "relay-web",
                    "imageRef": "img-1",
                    "flavorRef": "fl-1",
                    "networks": [{ "uuid": "net-2" }],
                    "key_name": "ops",
                    "security_groups": [{ "name": "web" }, { "name": "ssh" }]
                }
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({ "server": { "id": "srv-9" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenStackProvider::new(creds(&server)).unwrap();
        let id = provider
            .create_instance(
                "eu-2",
                &CreateInstanceRequest {
                    name: "relay-web".into(),
                    image_id: "img-1".into(),
                    flavor_id: "fl-1".into(),
                    network_id: "net-2".into(),
                    key_name: Some("ops".into()),
                    security_groups: vec!["web".into(), "ssh".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(id, "srv-9");
    }

    #[tokio::test]
    async fn attach_binds_floating_ip_to_server_port() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/network/eu-2/v2.0/ports"))
            .and(query_param("device_id", "srv-9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ports": [{ "id": "port-1" }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/network/eu-2/v2.0/floatingips"))
            .and(query_param("floating_ip_address", "198.51.100.7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "floatingips": [{ "id": "fip-1" }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/network/eu-2/v2.0/floatingips/fip-1"))
            .and(body_partial_json(json!({ "floatingip": { "port_id": "port-1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "floatingip": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenStackProvider::new(creds(&server)).unwrap();
        provider
            .attach_floating_ip("eu-2", "srv-9", "198.51.100.7")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_region_has_no_endpoint() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        let provider = OpenStackProvider::new(creds(&server)).unwrap();
        let err = provider.list_networks("us-1").await.unwrap_err();
        assert!(err.to_string().contains("no public endpoint for network"));
    }
}
