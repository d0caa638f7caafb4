use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use guardian_common::AlertingSettings;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Outbound alert channel. Delivery is observability, never a control dependency.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Pushover-style webhook: one form POST with `token`, `user`, `title`, `message`.
pub struct PushoverNotifier {
    client: Client,
    settings: AlertingSettings,
}

impl PushoverNotifier {
    pub fn new(settings: AlertingSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let form = [
            ("token", self.settings.api_token.as_str()),
            ("user", self.settings.user_key.as_str()),
            ("title", title),
            ("message", message),
        ];
        let resp = self
            .client
            .post(&self.settings.api_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "notification rejected: status={} body={}",
                status.as_u16(),
                text
            ));
        }
        debug!(title, "notification delivered");
        Ok(())
    }
}

/// Send and swallow: failures are logged, the return value only reports delivery.
pub async fn notify_best_effort(notifier: &dyn Notifier, title: &str, message: &str) -> bool {
    match notifier.notify(title, message).await {
        Ok(()) => true,
        Err(e) => {
            warn!(title, error = %e, "notification failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> AlertingSettings {
        AlertingSettings {
            api_url: format!("{}/1/messages.json", server.uri()),
            api_token: "app-token".into(),
            user_key: "user-key".into(),
        }
    }

    #[tokio::test]
    async fn posts_form_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/messages.json"))
            .and(body_string_contains("token=app-token"))
            .and(body_string_contains("user=user-key"))
            .and(body_string_contains("title=Failover"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let n = PushoverNotifier::new(settings(&server)).unwrap();
        assert!(notify_best_effort(&n, "Failover", "eu-1 -> eu-2").await);
    }

    #[tokio::test]
    async fn non_success_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let n = PushoverNotifier::new(settings(&server)).unwrap();
        let err = n.notify("t", "m").await.unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(!notify_best_effort(&n, "t", "m").await);
    }
}
