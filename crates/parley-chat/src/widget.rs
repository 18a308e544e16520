//! The chat widget: session owner and entry point for user events.

use std::sync::{Arc, Mutex};

use parley_core::{ParleyConfig, Turn};
use tracing::info;

use crate::backend::{InferenceService, LookupService};
use crate::error::ChatError;
use crate::presentation::Presentation;
use crate::resolver::{lock_session, ChatEvent, ResolverState, TurnResolver};
use crate::session::{SessionToken, WidgetSession};

/// Whether the widget frame is expanded on the host page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Closed,
    Open,
}

/// One embedded chat widget instance.
pub struct ChatWidget {
    session: Mutex<WidgetSession>,
    resolver: TurnResolver,
    ui: Arc<dyn Presentation>,
    visibility: Mutex<Visibility>,
}

impl ChatWidget {
    pub fn new(
        config: &ParleyConfig,
        lookup: Arc<dyn LookupService>,
        inference: Arc<dyn InferenceService>,
        ui: Arc<dyn Presentation>,
    ) -> Self {
        Self {
            session: Mutex::new(WidgetSession::new(config.conversation.cache_policy)),
            resolver: TurnResolver::new(config, lookup, inference, Arc::clone(&ui)),
            ui,
            visibility: Mutex::new(Visibility::Closed),
        }
    }

    /// Build a widget whose lookup and inference share one backend.
    pub fn with_backend<B>(config: &ParleyConfig, backend: Arc<B>, ui: Arc<dyn Presentation>) -> Self
    where
        B: LookupService + InferenceService + 'static,
    {
        Self::new(config, backend.clone(), backend, ui)
    }

    /// Expand the widget, creating the session token if needed.
    pub fn open(&self) -> Result<SessionToken, ChatError> {
        let token = lock_session(&self.session)?.identity.ensure_session();
        self.set_visibility(Visibility::Open)?;
        Ok(token)
    }

    pub fn close(&self) -> Result<(), ChatError> {
        self.set_visibility(Visibility::Closed)
    }

    /// Flip between open and closed. Returns the new visibility.
    pub fn toggle(&self) -> Result<Visibility, ChatError> {
        match self.visibility() {
            Visibility::Open => self.close()?,
            Visibility::Closed => {
                self.open()?;
            }
        }
        Ok(self.visibility())
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.lock().map(|v| *v).unwrap_or_default()
    }

    /// Submit typed text. Blank input is ignored and yields `None`.
    pub async fn submit_text(&self, text: &str) -> Result<Option<Turn>, ChatError> {
        self.resolver
            .handle(&self.session, ChatEvent::TextSubmitted(text.to_string()))
            .await
    }

    /// Select one of the currently offered options.
    pub async fn click_option(&self, option: &str) -> Result<Option<Turn>, ChatError> {
        self.resolver
            .handle(&self.session, ChatEvent::OptionClicked(option.to_string()))
            .await
    }

    /// Turns resolved so far, oldest first.
    pub fn history(&self) -> Result<Vec<Turn>, ChatError> {
        Ok(lock_session(&self.session)?.turns.clone())
    }

    pub fn session_token(&self) -> Option<SessionToken> {
        lock_session(&self.session)
            .ok()
            .and_then(|s| s.identity.token().cloned())
    }

    /// Phrases currently held in the response cache, in insertion order.
    pub fn cached_phrases(&self) -> Result<Vec<String>, ChatError> {
        Ok(lock_session(&self.session)?
            .cache
            .keys()
            .map(str::to_string)
            .collect())
    }

    pub fn state(&self) -> ResolverState {
        self.resolver.state()
    }

    fn set_visibility(&self, next: Visibility) -> Result<(), ChatError> {
        let mut visibility = self
            .visibility
            .lock()
            .map_err(|e| ChatError::State(format!("visibility lock poisoned: {}", e)))?;
        if *visibility != next {
            *visibility = next;
            info!(visibility = ?next, "Widget visibility changed");
            self.ui.set_expanded(next == Visibility::Open);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::presentation::{PresentationEvent, RecordingPresentation};
    use parley_core::{ResolutionPath, ResponseRecord};

    fn make_widget(backend: MockBackend) -> (ChatWidget, Arc<RecordingPresentation>) {
        let mut config = ParleyConfig::default();
        config.conversation.typing_delay_ms = 0;
        let ui = Arc::new(RecordingPresentation::new());
        let widget = ChatWidget::with_backend(&config, Arc::new(backend), ui.clone());
        (widget, ui)
    }

    #[test]
    fn test_open_creates_token_once() {
        let (widget, ui) = make_widget(MockBackend::new());
        assert!(widget.session_token().is_none());
        assert_eq!(widget.visibility(), Visibility::Closed);

        let first = widget.open().unwrap();
        let second = widget.open().unwrap();
        assert_eq!(first, second);
        assert_eq!(widget.session_token(), Some(first));
        // Expanding twice notifies the host once
        assert_eq!(ui.events(), vec![PresentationEvent::Expanded(true)]);
    }

    #[test]
    fn test_toggle_round_trip_keeps_token() {
        let (widget, ui) = make_widget(MockBackend::new());

        assert_eq!(widget.toggle().unwrap(), Visibility::Open);
        let token = widget.session_token().unwrap();
        assert_eq!(widget.toggle().unwrap(), Visibility::Closed);
        assert_eq!(widget.toggle().unwrap(), Visibility::Open);

        assert_eq!(widget.session_token(), Some(token));
        assert_eq!(
            ui.events(),
            vec![
                PresentationEvent::Expanded(true),
                PresentationEvent::Expanded(false),
                PresentationEvent::Expanded(true),
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_before_open_still_creates_token() {
        let (widget, _ui) = make_widget(MockBackend::new().with_inference_reply(Some("Hi there!")));
        let turn = widget.submit_text("hello").await.unwrap().unwrap();

        assert_eq!(turn.path, ResolutionPath::RemoteFallback);
        assert!(widget.session_token().is_some());
    }

    #[tokio::test]
    async fn test_conversation_flow_records_history() {
        let backend = MockBackend::new()
            .with_lookup(
                "pricing",
                [(
                    "pricing",
                    ResponseRecord::new("Two plans.", vec!["basic".into(), "pro".into()]),
                )],
            )
            .with_lookup(
                "basic",
                [(
                    "basic",
                    ResponseRecord::new("Basic is free.", vec!["pro".into(), "pricing".into()]),
                )],
            );
        let (widget, ui) = make_widget(backend);
        widget.open().unwrap();

        widget.submit_text("Pricing").await.unwrap();
        assert_eq!(
            ui.visible_options(),
            Some(vec!["basic".to_string(), "pro".to_string()])
        );

        widget.click_option("basic").await.unwrap();
        assert_eq!(ui.visible_options(), Some(vec!["pro".to_string()]));

        assert!(widget.submit_text("  ").await.unwrap().is_none());

        let history = widget.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_phrase, "pricing");
        assert_eq!(history[1].bot_text, "Basic is free.");
        assert_eq!(widget.cached_phrases().unwrap(), vec!["pricing", "basic"]);
        assert_eq!(widget.state(), ResolverState::Responded);
    }
}
