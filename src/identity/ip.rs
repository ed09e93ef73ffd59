use async_trait::async_trait;

use super::Signal;

/// Public IP discovery.
#[async_trait]
pub trait IpLookup: Send + Sync {
    async fn lookup(&self) -> Signal<String>;
}

/// Asks a list of IP-echo services in order and keeps the first answer.
/// Each service gets exactly one request.
pub struct HttpIpLookup {
    client: reqwest::Client,
    services: Vec<String>,
}

impl HttpIpLookup {
    pub fn new(client: reqwest::Client, services: Vec<String>) -> Self {
        Self { client, services }
    }

    async fn ask(&self, service: &str) -> Option<String> {
        let response = match self.client.get(service).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(service, error = %e, "IP service unreachable");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(service, status = %response.status(), "IP service refused");
            return None;
        }
        let body: serde_json::Value = response.json().await.ok()?;
        body["ip"]
            .as_str()
            .or_else(|| body["IP"].as_str())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn lookup(&self) -> Signal<String> {
        for service in &self.services {
            if let Some(ip) = self.ask(service).await {
                return Signal::Collected(ip);
            }
        }
        tracing::info!("No IP service answered, skipping IP check");
        Signal::degraded("ip lookup failed")
    }
}
