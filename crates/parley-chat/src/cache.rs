//! Response cache and its refresh from the lookup service.
//!
//! The cache maps normalized phrases to response records in insertion
//! order. Order matters: substring resolution takes the first contained
//! key, and the inference fallback offers the first entry's options.

use std::sync::Arc;

use indexmap::IndexMap;
use parley_core::{normalize_phrase, CachePolicy, ResponseRecord};
use tracing::debug;

use crate::backend::{LookupEntries, LookupRequest, LookupService};
use crate::error::ChatError;
use crate::session::SessionToken;

// =============================================================================
// ResponseCache
// =============================================================================

/// Insertion-ordered phrase -> record mapping, populated by lookups.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    policy: CachePolicy,
    entries: IndexMap<String, ResponseRecord>,
}

impl ResponseCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: IndexMap::new(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Fold one lookup result into the cache according to the policy.
    ///
    /// Keys are normalized first; keys that normalize to nothing are dropped.
    /// Under `Merge` an existing key keeps its position and takes the new
    /// value; new keys are appended.
    pub fn apply(&mut self, entries: LookupEntries) {
        let normalized = entries.into_iter().filter_map(|(key, record)| {
            let key = normalize_phrase(&key);
            (!key.is_empty()).then_some((key, record))
        });

        match self.policy {
            CachePolicy::Replace => self.entries = normalized.collect(),
            CachePolicy::Merge => self.entries.extend(normalized),
        }
    }

    /// Exact lookup by normalized phrase.
    pub fn get(&self, phrase: &str) -> Option<&ResponseRecord> {
        self.entries.get(&normalize_phrase(phrase))
    }

    /// First key, in insertion order, that occurs inside `text`.
    pub fn first_contained_in(&self, text: &str) -> Option<(&str, &ResponseRecord)> {
        self.entries
            .iter()
            .find(|(key, _)| text.contains(key.as_str()))
            .map(|(key, record)| (key.as_str(), record))
    }

    /// The oldest entry still in the cache.
    pub fn first(&self) -> Option<(&str, &ResponseRecord)> {
        self.entries
            .first()
            .map(|(key, record)| (key.as_str(), record))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// CacheRefresher
// =============================================================================

/// Builds lookup requests for one deployment and fetches their entries.
#[derive(Clone)]
pub struct CacheRefresher {
    lookup: Arc<dyn LookupService>,
    client_id: String,
    include_session: bool,
}

impl CacheRefresher {
    pub fn new(lookup: Arc<dyn LookupService>, client_id: String, include_session: bool) -> Self {
        Self {
            lookup,
            client_id,
            include_session,
        }
    }

    /// Fetch entries for `phrase` without touching any cache.
    pub async fn fetch(
        &self,
        phrase: &str,
        token: Option<&SessionToken>,
    ) -> Result<LookupEntries, ChatError> {
        let request = LookupRequest {
            user_input: normalize_phrase(phrase),
            client_id: self.client_id.clone(),
            session_id: if self.include_session {
                token.map(|t| t.as_str().to_string())
            } else {
                None
            },
        };
        let entries = self.lookup.lookup(&request).await?;
        debug!(
            phrase = %request.user_input,
            entries = entries.len(),
            "Response lookup succeeded"
        );
        Ok(entries)
    }

    /// Fetch entries for `phrase` and fold them into `cache`.
    ///
    /// On failure the cache is left exactly as it was.
    pub async fn refresh(
        &self,
        cache: &mut ResponseCache,
        phrase: &str,
        token: Option<&SessionToken>,
    ) -> Result<(), ChatError> {
        let entries = self.fetch(phrase, token).await?;
        cache.apply(entries);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
