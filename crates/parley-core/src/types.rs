use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

/// How a successful lookup is folded into the response cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Every lookup overwrites the whole cache.
    Replace,
    /// Every lookup unions its entries into the cache; later values win.
    #[default]
    Merge,
}

/// How typed text is matched against the response cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The normalized text must equal a cache key.
    Exact,
    /// The first cache key (insertion order) contained in the text wins.
    #[default]
    Substring,
}

/// Which branch of the resolver produced a turn's bot message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Exact key hit in the response cache.
    CacheHit,
    /// A cache key was found inside the typed text.
    SubstringMatch,
    /// Answered by the remote inference service.
    RemoteFallback,
    /// Inference was attempted but produced no usable answer.
    FallbackFailed,
    /// Nothing matched and no fallback was available.
    Unresolved,
}

// =============================================================================
// Records
// =============================================================================

/// A cached answer plus its follow-up choices, as served by the lookup service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(rename = "response")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: Vec<String>,
}

impl ResponseRecord {
    pub fn new(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One user input and the bot output it resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    /// Normalized phrase the turn was resolved against.
    pub user_phrase: String,
    pub path: ResolutionPath,
    /// Cache key that answered the turn, for cache hits and substring matches.
    pub matched_key: Option<String>,
    pub bot_text: String,
    /// Options actually offered, after exclusion filtering.
    pub options: Vec<String>,
    /// The cache refresh for this turn failed and a stale cache was used.
    pub lookup_failed: bool,
    /// Epoch seconds.
    pub created_at: i64,
}

impl Turn {
    pub fn new(
        user_phrase: impl Into<String>,
        path: ResolutionPath,
        bot_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_phrase: user_phrase.into(),
            path,
            matched_key: None,
            bot_text: bot_text.into(),
            options: Vec::new(),
            lookup_failed: false,
            created_at: Local::now().timestamp(),
        }
    }
}

/// Normalize a phrase the way cache keys and tracked options are stored:
/// surrounding whitespace trimmed, lowercased.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  Pricing Plans \n"), "pricing plans");
        assert_eq!(normalize_phrase("   "), "");
        assert_eq!(normalize_phrase("ÉLÈVE"), "élève");
    }

    #[test]
    fn test_response_record_wire_format() {
        let json = r#"{"response": "We offer two plans.", "options": ["Basic", "Pro"]}"#;
        let record: ResponseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.text, "We offer two plans.");
        assert_eq!(record.options, vec!["Basic", "Pro"]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["response"], "We offer two plans.");
    }

    #[test]
    fn test_response_record_missing_or_null_options() {
        let missing: ResponseRecord = serde_json::from_str(r#"{"response": "hi"}"#).unwrap();
        assert!(missing.options.is_empty());

        let null: ResponseRecord =
            serde_json::from_str(r#"{"response": "hi", "options": null}"#).unwrap();
        assert!(null.options.is_empty());
    }

    #[test]
    fn test_response_record_requires_text() {
        let result: std::result::Result<ResponseRecord, _> =
            serde_json::from_str(r#"{"options": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&CachePolicy::Replace).unwrap(), "\"replace\"");
        assert_eq!(
            serde_json::to_string(&ResolutionStrategy::Substring).unwrap(),
            "\"substring\""
        );
        assert_eq!(
            serde_json::to_string(&ResolutionPath::RemoteFallback).unwrap(),
            "\"remote_fallback\""
        );
        assert_eq!(Sender::Bot.as_str(), "bot");
    }

    #[test]
    fn test_turn_new_defaults() {
        let turn = Turn::new("pricing", ResolutionPath::CacheHit, "We offer two plans.");
        assert_ne!(turn.id, Uuid::nil());
        assert!(turn.options.is_empty());
        assert!(turn.matched_key.is_none());
        assert!(!turn.lookup_failed);
        assert!((turn.created_at - Local::now().timestamp()).abs() < 2);
    }
}
