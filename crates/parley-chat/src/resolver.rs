//! Turn resolution state machine.
//!
//! Each user event runs one turn: record the phrase, refresh the response
//! cache, resolve against it (exact key or substring), optionally fall back
//! to remote inference, and deliver the bot message behind a typing
//! placeholder. At most one turn is in flight; a second event while one is
//! running is rejected with `ChatError::TurnInFlight`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use parley_core::config::{ConversationConfig, MessagesConfig};
use parley_core::{
    normalize_phrase, ParleyConfig, ResolutionPath, ResolutionStrategy, ResponseRecord, Sender,
    Turn,
};
use tracing::{debug, info, warn};

use crate::backend::{InferenceRequest, InferenceService, LookupService};
use crate::cache::CacheRefresher;
use crate::error::ChatError;
use crate::presentation::{Presentation, TypingGuard};
use crate::session::{SessionToken, WidgetSession};

/// A user action submitted to the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// A previously offered option was selected (display-cased label).
    OptionClicked(String),
    /// Free text was submitted from the input field.
    TextSubmitted(String),
}

/// Where the resolver is within the current turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolverState {
    #[default]
    Idle,
    AwaitingCacheRefresh,
    Resolving,
    Responded,
}

/// Resolves user events into bot turns.
pub struct TurnResolver {
    conversation: ConversationConfig,
    messages: MessagesConfig,
    client_id: String,
    model_choice: String,
    refresher: CacheRefresher,
    inference: Arc<dyn InferenceService>,
    ui: Arc<dyn Presentation>,
    state: Mutex<ResolverState>,
    in_flight: AtomicBool,
}

impl TurnResolver {
    pub fn new(
        config: &ParleyConfig,
        lookup: Arc<dyn LookupService>,
        inference: Arc<dyn InferenceService>,
        ui: Arc<dyn Presentation>,
    ) -> Self {
        let refresher = CacheRefresher::new(
            lookup,
            config.service.client_id.clone(),
            config.conversation.include_session_in_lookup,
        );
        Self {
            conversation: config.conversation.clone(),
            messages: config.messages.clone(),
            client_id: config.service.client_id.clone(),
            model_choice: config.service.model_choice.clone(),
            refresher,
            inference,
            ui,
            state: Mutex::new(ResolverState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    /// Run one turn for `event` against `session`.
    ///
    /// Returns `Ok(None)` for blank text submissions, which are ignored.
    /// Lookup, inference and resolution failures are rendered to the user
    /// and recorded on the returned turn rather than returned as errors.
    pub async fn handle(
        &self,
        session: &Mutex<WidgetSession>,
        event: ChatEvent,
    ) -> Result<Option<Turn>, ChatError> {
        if let ChatEvent::TextSubmitted(text) = &event {
            if text.trim().is_empty() {
                debug!("Ignoring blank submission");
                return Ok(None);
            }
        }

        let _in_flight = self.begin_turn()?;

        let turn = match event {
            ChatEvent::OptionClicked(option) => self.on_option_clicked(session, &option).await?,
            ChatEvent::TextSubmitted(text) => self.on_text_submitted(session, &text).await?,
        };

        lock_session(session)?.turns.push(turn.clone());
        self.set_state(ResolverState::Responded);
        info!(
            phrase = %turn.user_phrase,
            path = ?turn.path,
            options = turn.options.len(),
            "Turn resolved"
        );
        Ok(Some(turn))
    }

    async fn on_option_clicked(
        &self,
        session: &Mutex<WidgetSession>,
        option: &str,
    ) -> Result<Turn, ChatError> {
        let phrase = normalize_phrase(option);
        self.ui.clear_options();
        self.ui.append_message(Sender::User, option);

        let token = {
            let mut s = lock_session(session)?;
            s.tracker.record(&phrase);
            s.identity.ensure_session()
        };

        let lookup_failed = self.refresh_cache(session, &phrase, &token).await?;

        self.set_state(ResolverState::Resolving);
        let turn = {
            let s = lock_session(session)?;
            match s.cache.get(&phrase) {
                Some(record) => answer(&s, &phrase, ResolutionPath::CacheHit, &phrase, record),
                None => self.unresolved(&phrase),
            }
        };

        let mut turn = self.deliver(turn).await;
        turn.lookup_failed = lookup_failed;
        Ok(turn)
    }

    async fn on_text_submitted(
        &self,
        session: &Mutex<WidgetSession>,
        raw: &str,
    ) -> Result<Turn, ChatError> {
        let text = normalize_phrase(raw);
        self.ui.clear_options();
        self.ui.append_message(Sender::User, &text);
        self.ui.clear_input();

        let token = {
            let mut s = lock_session(session)?;
            s.tracker.record(&text);
            s.identity.ensure_session()
        };

        let lookup_failed = self.refresh_cache(session, &text, &token).await?;

        self.set_state(ResolverState::Resolving);
        let strategy = self.conversation.resolution;
        let resolved = {
            let s = lock_session(session)?;
            match strategy {
                ResolutionStrategy::Exact => s
                    .cache
                    .get(&text)
                    .map(|record| answer(&s, &text, ResolutionPath::CacheHit, &text, record)),
                ResolutionStrategy::Substring => {
                    s.cache.first_contained_in(&text).map(|(key, record)| {
                        answer(&s, &text, ResolutionPath::SubstringMatch, key, record)
                    })
                }
            }
        };

        let mut turn = match resolved {
            Some(turn) => self.deliver(turn).await,
            None if strategy == ResolutionStrategy::Substring
                && self.conversation.fallback_to_inference =>
            {
                self.fallback(session, &text, &token).await?
            }
            None => self.deliver(self.unresolved(&text)).await,
        };
        turn.lookup_failed = lookup_failed;
        Ok(turn)
    }

    /// Escalate to the inference service.
    ///
    /// A successful answer is followed by the options of the oldest cache
    /// entry, whatever it is. Those options need not relate to the answer.
    async fn fallback(
        &self,
        session: &Mutex<WidgetSession>,
        text: &str,
        token: &SessionToken,
    ) -> Result<Turn, ChatError> {
        let request = InferenceRequest {
            user_input: text.to_string(),
            section_id: token.as_str().to_string(),
            client_id: self.client_id.clone(),
            model_choice: self.model_choice.clone(),
        };
        debug!(phrase = %text, session_id = %token, "Escalating to inference");

        let typing = TypingGuard::show(self.ui.as_ref());
        let (_, outcome) = tokio::join!(self.think(), self.inference.ask(&request));

        let turn = match outcome {
            Ok(reply) => match reply.usable_text() {
                Some(reply_text) => {
                    let s = lock_session(session)?;
                    let mut turn = Turn::new(text, ResolutionPath::RemoteFallback, reply_text);
                    if let Some((key, record)) = s.cache.first() {
                        turn.matched_key = Some(key.to_string());
                        turn.options = s.tracker.filter_unseen(&record.options);
                    }
                    turn
                }
                None => {
                    let err = ChatError::InferenceFailed("reply carried no response".to_string());
                    warn!(phrase = %text, error = %err, "Inference returned nothing usable");
                    Turn::new(
                        text,
                        ResolutionPath::FallbackFailed,
                        self.messages.inference_invalid.as_str(),
                    )
                }
            },
            Err(e) => {
                warn!(phrase = %text, error = %e, "Inference request failed");
                Turn::new(
                    text,
                    ResolutionPath::FallbackFailed,
                    self.messages.inference_unreachable.as_str(),
                )
            }
        };

        typing.finish();
        self.emit(&turn);
        Ok(turn)
    }

    /// Refresh the cache for `phrase`. Returns whether the lookup failed;
    /// a failed lookup leaves the cache as it was.
    async fn refresh_cache(
        &self,
        session: &Mutex<WidgetSession>,
        phrase: &str,
        token: &SessionToken,
    ) -> Result<bool, ChatError> {
        self.set_state(ResolverState::AwaitingCacheRefresh);
        match self.refresher.fetch(phrase, Some(token)).await {
            Ok(entries) => {
                lock_session(session)?.cache.apply(entries);
                Ok(false)
            }
            Err(e) => {
                warn!(phrase = %phrase, error = %e, "Response lookup failed; keeping existing cache");
                Ok(true)
            }
        }
    }

    /// Show the typing placeholder for the think delay, then emit `turn`.
    async fn deliver(&self, turn: Turn) -> Turn {
        let typing = TypingGuard::show(self.ui.as_ref());
        self.think().await;
        typing.finish();
        self.emit(&turn);
        turn
    }

    fn emit(&self, turn: &Turn) {
        self.ui.append_message(Sender::Bot, &turn.bot_text);
        if !turn.options.is_empty() {
            self.ui.present_options(&turn.options);
        }
    }

    fn unresolved(&self, phrase: &str) -> Turn {
        let err = ChatError::Unresolved(phrase.to_string());
        debug!(error = %err, "No cached response");
        Turn::new(
            phrase,
            ResolutionPath::Unresolved,
            self.messages.not_understood.as_str(),
        )
    }

    async fn think(&self) {
        let delay = self.conversation.typing_delay();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }

    fn begin_turn(&self) -> Result<InFlight<'_>, ChatError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatError::TurnInFlight)?;
        Ok(InFlight { resolver: self })
    }

    fn set_state(&self, next: ResolverState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }
}

/// Build a turn answered from a cache record, filtering its options.
fn answer(
    session: &WidgetSession,
    phrase: &str,
    path: ResolutionPath,
    key: &str,
    record: &ResponseRecord,
) -> Turn {
    let mut turn = Turn::new(phrase, path, record.text.as_str());
    turn.matched_key = Some(key.to_string());
    turn.options = session.tracker.filter_unseen(&record.options);
    turn
}

pub(crate) fn lock_session(
    session: &Mutex<WidgetSession>,
) -> Result<MutexGuard<'_, WidgetSession>, ChatError> {
    session
        .lock()
        .map_err(|e| ChatError::State(format!("session lock poisoned: {}", e)))
}

/// Marks a turn as running; released on every exit path.
struct InFlight<'a> {
    resolver: &'a TurnResolver,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.resolver.state() != ResolverState::Responded {
            self.resolver.set_state(ResolverState::Idle);
        }
        self.resolver.in_flight.store(false, Ordering::Release);
    }
}

// =============================================================================
// Tests
// =============================================================================
