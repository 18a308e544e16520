//! Remote service seams and their wire types.
//!
//! Defines the `LookupService` and `InferenceService` async traits the
//! resolver talks to, plus `MockBackend`, a scripted in-memory
//! implementation for tests and offline demos.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parley_core::{normalize_phrase, ResponseRecord};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Ordered phrase -> record mapping returned by one lookup call.
pub type LookupEntries = IndexMap<String, ResponseRecord>;

// =============================================================================
// Wire types
// =============================================================================

/// Body of `POST /getresponses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub user_input: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Body of `POST /ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub user_input: String,
    pub section_id: String,
    pub client_id: String,
    pub model_choice: String,
}

/// Body of a successful `POST /ask` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceReply {
    #[serde(default)]
    pub response: Option<String>,
}

impl InferenceReply {
    /// The answer text, if present and not blank.
    pub fn usable_text(&self) -> Option<&str> {
        self.response.as_deref().filter(|r| !r.trim().is_empty())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Keyword response lookup, keyed by user text.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Fetch the response entries for one phrase.
    ///
    /// Transport failures, non-success statuses and malformed bodies are all
    /// reported as `ChatError::LookupFailed`.
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupEntries, ChatError>;
}

/// Free-text answer generation for phrases the cache cannot answer.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Ask the inference service. A reply without text is still `Ok`; only
    /// transport failures and non-success statuses are errors.
    async fn ask(&self, request: &InferenceRequest) -> Result<InferenceReply, ChatError>;
}

// =============================================================================
// MockBackend
// =============================================================================

#[derive(Debug, Clone)]
enum InferenceScript {
    Reply(Option<String>),
    Unreachable,
}

/// Scripted backend implementing both service traits.
///
/// Lookups return the entries registered for the normalized phrase (or an
/// empty mapping). Every request is recorded for later inspection.
#[derive(Debug)]
pub struct MockBackend {
    lookups: HashMap<String, LookupEntries>,
    lookups_fail: bool,
    inference: InferenceScript,
    latency: Duration,
    lookup_calls: Mutex<Vec<LookupRequest>>,
    inference_calls: Mutex<Vec<InferenceRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            lookups: HashMap::new(),
            lookups_fail: false,
            inference: InferenceScript::Reply(None),
            latency: Duration::ZERO,
            lookup_calls: Mutex::new(Vec::new()),
            inference_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the entries returned when `phrase` is looked up.
    pub fn with_lookup<I, K>(mut self, phrase: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ResponseRecord)>,
        K: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.lookups.insert(normalize_phrase(phrase), entries);
        self
    }

    /// Make every lookup fail.
    pub fn failing_lookups(mut self) -> Self {
        self.lookups_fail = true;
        self
    }

    /// Answer every inference request with `reply`.
    pub fn with_inference_reply(mut self, reply: Option<&str>) -> Self {
        self.inference = InferenceScript::Reply(reply.map(str::to_string));
        self
    }

    /// Make every inference request fail at the transport level.
    pub fn unreachable_inference(mut self) -> Self {
        self.inference = InferenceScript::Unreachable;
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn lookup_calls(&self) -> Vec<LookupRequest> {
        self.lookup_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn inference_calls(&self) -> Vec<InferenceRequest> {
        self.inference_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl LookupService for MockBackend {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupEntries, ChatError> {
        self.lookup_calls
            .lock()
            .map_err(|e| ChatError::State(format!("mock lock poisoned: {}", e)))?
            .push(request.clone());
        self.simulate_latency().await;

        if self.lookups_fail {
            return Err(ChatError::LookupFailed("scripted failure".to_string()));
        }
        Ok(self
            .lookups
            .get(&normalize_phrase(&request.user_input))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl InferenceService for MockBackend {
    async fn ask(&self, request: &InferenceRequest) -> Result<InferenceReply, ChatError> {
        self.inference_calls
            .lock()
            .map_err(|e| ChatError::State(format!("mock lock poisoned: {}", e)))?
            .push(request.clone());
        self.simulate_latency().await;

        match &self.inference {
            InferenceScript::Reply(response) => Ok(InferenceReply {
                response: response.clone(),
            }),
            InferenceScript::Unreachable => Err(ChatError::InferenceFailed(
                "scripted transport failure".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
