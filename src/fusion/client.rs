//! HTTP client for the external fusion service (`POST /fusion/predict`).
//!
//! No retries and no timeout beyond the HTTP stack's defaults: a failed call
//! simply produces no fused record for that boundary.

use std::{future::Future, pin::Pin};

use serde_json::Value;
use thiserror::Error;

use super::types::{FusionRequest, FusionResponse};

const PREDICT_PATH: &str = "/fusion/predict";
const USER_AGENT: &str = concat!("affect-study/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FusionError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("Fusion service returned status {0}")]
    Status(u16),

    /// Body was not JSON
    #[error("Parse error: {0}")]
    Parse(String),
}

pub type FusionFuture = Pin<Box<dyn Future<Output = Result<FusionResponse, FusionError>> + Send>>;

/// Anything that can fuse a request into a response. The scheduler only
/// depends on this; production uses `HttpFusionClient`.
pub trait FusionBackend: Send + Sync {
    fn predict(&self, request: FusionRequest) -> FusionFuture;
}

pub struct HttpFusionClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpFusionClient {
    pub fn new(base_url: &str) -> Result<Self, FusionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FusionError::Network(e.to_string()))?;
        Ok(Self::with_client(base_url, http_client))
    }

    pub fn with_client(base_url: &str, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), PREDICT_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FusionBackend for HttpFusionClient {
    fn predict(&self, request: FusionRequest) -> FusionFuture {
        let http_client = self.http_client.clone();
        let url = self.endpoint.clone();

        Box::pin(async move {
            let response = http_client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| FusionError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FusionError::Status(status.as_u16()));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| FusionError::Parse(e.to_string()))?;

            Ok(FusionResponse::from_json(&body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::types::VisualInput;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serves one canned HTTP response and hands back the request body.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            let request_body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let body = &text[split + 4..];
                    if body.len() >= length || n == 0 {
                        break body.to_string();
                    }
                }
                if n == 0 {
                    break String::new();
                }
            };

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request_body
        });

        (base, handle)
    }

    fn direct_client(base: &str) -> HttpFusionClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpFusionClient::with_client(base, http)
    }

    fn request() -> FusionRequest {
        FusionRequest {
            visual: Some(VisualInput {
                valence: 0.2,
                arousal: 0.5,
                confidence: 0.9,
            }),
            passive: None,
            video_id: "v1".into(),
            video_time_sec: 12,
        }
    }

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let client = direct_client("http://localhost:8001/");
        assert_eq!(client.endpoint(), "http://localhost:8001/fusion/predict");
    }

    #[tokio::test]
    async fn posts_payload_and_parses_response() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"valence": 0.4, "arousal": 0.6, "discrete_emotion": "calm", "strategy": "late_fusion"}"#,
        )
        .await;

        let response = direct_client(&base).predict(request()).await.unwrap();
        assert_eq!(response.valence, Some(0.4));
        assert_eq!(response.discrete_emotion.as_deref(), Some("calm"));
        assert_eq!(response.strategy.as_deref(), Some("late_fusion"));

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["videoId"], "v1");
        assert_eq!(sent["videoTimeSec"], 12);
        assert!(sent["passive"].is_null());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (base, _server) = serve_once("HTTP/1.1 503 Service Unavailable", "{}").await;
        let err = direct_client(&base).predict(request()).await.unwrap_err();
        assert!(matches!(err, FusionError::Status(503)));
    }
}
