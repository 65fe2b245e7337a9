use super::controller::AdmissionController;
use super::protocol::ENDPOINT_GET_ONE;
use crate::access::protocol::BODY_TRUE;
use crate::identity::IdentityCookies;

use axum::http::header;
use std::sync::Arc;
use std::time::Duration;

/// How a node reaches the gate.
pub enum AdmissionClient {
    /// Gate lives in this process.
    Local(Arc<AdmissionController>),
    /// Gate is a separate service reached over HTTP.
    Remote {
        base_url: String,
        http_client: reqwest::Client,
        timeout: Duration,
    },
}

impl AdmissionClient {
    pub fn local(gate: Arc<AdmissionController>) -> Self {
        AdmissionClient::Local(gate)
    }

    pub fn remote(base_url: &str, timeout: Duration) -> Self {
        AdmissionClient::Remote {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Claims one unit of stock. Timeouts, transport errors and anything other than
    /// an HTTP 200 with body `true` count as a refusal.
    pub async fn claim(&self, cookies: &IdentityCookies) -> bool {
        match self {
            AdmissionClient::Local(gate) => gate.try_admit(),
            AdmissionClient::Remote {
                base_url,
                http_client,
                timeout,
            } => {
                let response = http_client
                    .get(format!("{}{}", base_url, ENDPOINT_GET_ONE))
                    .header(header::COOKIE, cookies.cookie_header())
                    .timeout(*timeout)
                    .send()
                    .await;

                match response {
                    Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                        match resp.text().await {
                            Ok(body) => body == BODY_TRUE,
                            Err(e) => {
                                tracing::warn!("Gate response unreadable: {}", e);
                                false
                            }
                        }
                    }
                    Ok(resp) => {
                        tracing::warn!("Gate answered {}", resp.status());
                        false
                    }
                    Err(e) => {
                        tracing::warn!("Gate call failed: {}", e);
                        false
                    }
                }
            }
        }
    }
}
