//! reqwest implementation of the lookup and inference services.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::ServiceConfig;
use reqwest::Client;
use tracing::debug;

use crate::backend::{
    InferenceReply, InferenceRequest, InferenceService, LookupEntries, LookupRequest,
    LookupService,
};
use crate::error::ChatError;

const LOOKUP_PATH: &str = "getresponses";
const INFERENCE_PATH: &str = "ask";

/// HTTP client for the widget's backend (`/getresponses` and `/ask`).
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client for `service.base_url`.
    ///
    /// A timeout is only applied when `request_timeout_secs` is set.
    pub fn new(service: &ServiceConfig) -> Result<Self, ChatError> {
        let mut builder = Client::builder();
        if let Some(secs) = service.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: service.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl LookupService for HttpBackend {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupEntries, ChatError> {
        let url = self.endpoint(LOOKUP_PATH);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::LookupFailed(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::LookupFailed(format!(
                "lookup returned {}: {}",
                status, body
            )));
        }

        let entries: LookupEntries = response
            .json()
            .await
            .map_err(|e| ChatError::LookupFailed(format!("malformed lookup body: {}", e)))?;
        debug!(url = %url, entries = entries.len(), "Lookup response received");
        Ok(entries)
    }
}

#[async_trait]
impl InferenceService for HttpBackend {
    async fn ask(&self, request: &InferenceRequest) -> Result<InferenceReply, ChatError> {
        let url = self.endpoint(INFERENCE_PATH);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::InferenceFailed(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::InferenceFailed(format!(
                "inference returned {}: {}",
                status, body
            )));
        }

        response
            .json::<InferenceReply>()
            .await
            .map_err(|e| ChatError::InferenceFailed(format!("malformed inference body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let service = ServiceConfig {
            base_url: "https://bot.example.com/".to_string(),
            ..ServiceConfig::default()
        };
        let backend = HttpBackend::new(&service).unwrap();
        assert_eq!(backend.base_url(), "https://bot.example.com");
        assert_eq!(
            backend.endpoint(LOOKUP_PATH),
            "https://bot.example.com/getresponses"
        );
        assert_eq!(backend.endpoint(INFERENCE_PATH), "https://bot.example.com/ask");
    }

    #[test]
    fn test_new_with_timeout() {
        let service = ServiceConfig {
            request_timeout_secs: Some(5),
            ..ServiceConfig::default()
        };
        assert!(HttpBackend::new(&service).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_lookup_failure() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let service = ServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: Some(2),
            ..ServiceConfig::default()
        };
        let backend = HttpBackend::new(&service).unwrap();
        let request = LookupRequest {
            user_input: "pricing".to_string(),
            client_id: "lollypop_design".to_string(),
            session_id: None,
        };
        let err = backend.lookup(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::LookupFailed(_)));
    }
}
