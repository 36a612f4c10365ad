//! Early-hint speculative preloading.
//!
//! A 103 (Early Hints) response may carry `Link: <...>; rel=preload; as=...` headers
//! before the real response is ready. This crate starts a fetch for each distinct,
//! same-origin, supported hint so the resource is cached by the time the document
//! asks for it, and cancels those fetches once the navigation no longer needs them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod admission;
pub mod channel;
pub mod destination;
pub mod error;
pub mod http;
pub mod key;
pub mod link_header;
pub mod ongoing;
pub mod preloader;
pub mod request;
pub mod service;

/// Re-export common types for easier usage
pub use admission::{maybe_create_and_insert_preload, AdmissionRejection};
pub use channel::{ChannelEvent, ChannelId, ChannelService, ListenerId, NetworkEvent, RedirectKind, RedirectVerifier};
pub use destination::{AsDestination, CorsMode};
pub use error::{CancelReason, PreloadError};
pub use http::{HttpChannelService, PreloadCache};
pub use key::PreloadHashKey;
pub use link_header::LinkHeader;
pub use ongoing::OngoingEarlyHints;
pub use preloader::{EarlyHintPreloader, PreloaderState, EARLY_HINT_HEADER, EARLY_HINT_HEADER_VALUE};
pub use request::ChannelRequest;
pub use service::{EarlyHintStats, EarlyHintsService, FinalResponseCategory};

/// Privacy level applied to the headers of preload requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivacyLevel {
    /// Maximum privacy: randomize all possible fingerprinting vectors
    Maximum,
    /// High privacy but with potential minor site compatibility
    High,
    /// Balanced between privacy and compatibility
    Balanced,
    /// Custom user-defined privacy settings
    Custom,
}

/// Early hints configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyHintsConfig {
    /// Whether hints start preloads at all
    pub enabled: bool,
    /// Privacy level for preload requests
    pub privacy_level: PrivacyLevel,
    /// Whether to refuse preloads over plain HTTP
    pub enforce_https: bool,
    /// Timeout for a single preload request
    pub request_timeout: Duration,
    /// Maximum number of responses kept in the preload cache
    pub max_cache_entries: usize,
}

impl Default for EarlyHintsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            privacy_level: PrivacyLevel::High,
            enforce_https: true,
            request_timeout: Duration::from_secs(30),
            max_cache_entries: 256,
        }
    }
}
