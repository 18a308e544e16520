//! Conversation engine for the Parley chat widget.
//!
//! Owns the per-widget session (token, response cache, option tracker),
//! resolves each user event against the cache or the remote inference
//! service, and drives a presentation adapter with the result.

pub mod backend;
pub mod cache;
pub mod error;
pub mod http;
pub mod presentation;
pub mod resolver;
pub mod session;
pub mod tracker;
pub mod widget;

pub use backend::{
    InferenceReply, InferenceRequest, InferenceService, LookupRequest, LookupService, MockBackend,
};
pub use cache::{CacheRefresher, ResponseCache};
pub use error::ChatError;
pub use http::HttpBackend;
pub use presentation::{Presentation, PresentationEvent, RecordingPresentation, TypingHandle};
pub use resolver::{ChatEvent, ResolverState, TurnResolver};
pub use session::{SessionIdentity, SessionToken, WidgetSession};
pub use tracker::OptionTracker;
pub use widget::{ChatWidget, Visibility};
