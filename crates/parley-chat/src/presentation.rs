//! Presentation adapter seam.
//!
//! The engine owns no rendering. It drives a `Presentation` implementation
//! (DOM bridge, terminal, test recorder) and receives user events back as
//! calls into `ChatWidget`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use parley_core::Sender;

/// Identifies one visible typing placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypingHandle(pub u64);

/// Rendering operations the engine needs from its host.
///
/// Methods take `&self`; adapters keep their own interior mutability.
pub trait Presentation: Send + Sync {
    fn append_message(&self, sender: Sender, text: &str);

    /// Show clickable choices. Selecting one must come back as
    /// `ChatWidget::click_option`.
    fn present_options(&self, options: &[String]);

    fn clear_options(&self);

    fn clear_input(&self);

    fn show_typing(&self) -> TypingHandle;

    fn remove_typing(&self, handle: TypingHandle);

    /// Ask the host page to expand or collapse the widget frame.
    fn set_expanded(&self, _expanded: bool) {}
}

// =============================================================================
// TypingGuard
// =============================================================================

/// A shown typing placeholder that is removed exactly once: explicitly via
/// `finish`, or on drop if the turn is abandoned.
pub(crate) struct TypingGuard<'a> {
    ui: &'a dyn Presentation,
    handle: Option<TypingHandle>,
}

impl<'a> TypingGuard<'a> {
    pub(crate) fn show(ui: &'a dyn Presentation) -> Self {
        let handle = ui.show_typing();
        Self {
            ui,
            handle: Some(handle),
        }
    }

    pub(crate) fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            self.ui.remove_typing(handle);
        }
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.ui.remove_typing(handle);
        }
    }
}

// =============================================================================
// RecordingPresentation
// =============================================================================

/// Everything a `RecordingPresentation` was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentationEvent {
    Message { sender: Sender, text: String },
    Options(Vec<String>),
    OptionsCleared,
    InputCleared,
    TypingShown(TypingHandle),
    TypingRemoved(TypingHandle),
    Expanded(bool),
}

/// Headless adapter that records every call.
#[derive(Debug, Default)]
pub struct RecordingPresentation {
    events: Mutex<Vec<PresentationEvent>>,
    next_handle: AtomicU64,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Messages appended so far, as `(sender, text)` pairs.
    pub fn messages(&self) -> Vec<(Sender, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresentationEvent::Message { sender, text } => Some((sender, text)),
                _ => None,
            })
            .collect()
    }

    /// The most recently presented option set, if options are showing.
    pub fn visible_options(&self) -> Option<Vec<String>> {
        let mut visible = None;
        for event in self.events() {
            match event {
                PresentationEvent::Options(options) => visible = Some(options),
                PresentationEvent::OptionsCleared => visible = None,
                _ => {}
            }
        }
        visible
    }

    pub fn typing_shown(&self) -> usize {
        self.count(|e| matches!(e, PresentationEvent::TypingShown(_)))
    }

    pub fn typing_removed(&self) -> usize {
        self.count(|e| matches!(e, PresentationEvent::TypingRemoved(_)))
    }

    fn count(&self, pred: impl Fn(&PresentationEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: PresentationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Presentation for RecordingPresentation {
    fn append_message(&self, sender: Sender, text: &str) {
        self.push(PresentationEvent::Message {
            sender,
            text: text.to_string(),
        });
    }

    fn present_options(&self, options: &[String]) {
        self.push(PresentationEvent::Options(options.to_vec()));
    }

    fn clear_options(&self) {
        self.push(PresentationEvent::OptionsCleared);
    }

    fn clear_input(&self) {
        self.push(PresentationEvent::InputCleared);
    }

    fn show_typing(&self) -> TypingHandle {
        let handle = TypingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.push(PresentationEvent::TypingShown(handle));
        handle
    }

    fn remove_typing(&self, handle: TypingHandle) {
        self.push(PresentationEvent::TypingRemoved(handle));
    }

    fn set_expanded(&self, expanded: bool) {
        self.push(PresentationEvent::Expanded(expanded));
    }
}
