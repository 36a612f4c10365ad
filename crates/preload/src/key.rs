//! The dedup key of a speculative load.

use citadel_security::Principal;
use url::Url;

use crate::destination::{AsDestination, CorsMode};

/// Identifies a preload by destination, URL, triggering principal and CORS mode.
/// Two hints that produce equal keys share one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreloadHashKey {
    destination: AsDestination,
    uri: Url,
    principal: Principal,
    cors_mode: CorsMode,
}

impl PreloadHashKey {
    /// Build the key for an early-hint preload. Returns `None` for destinations early
    /// hints do not preload.
    pub fn for_early_hint(destination: AsDestination, uri: &Url, principal: &Principal) -> Option<Self> {
        let cors_mode = destination.early_hint_cors_mode()?;
        Some(Self {
            destination,
            uri: uri.clone(),
            principal: principal.clone(),
            cors_mode,
        })
    }

    pub fn destination(&self) -> AsDestination {
        self.destination
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn cors_mode(&self) -> CorsMode {
        self.cors_mode
    }
}

impl std::fmt::Display for PreloadHashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({:?}, {})", self.destination, self.uri, self.cors_mode, self.principal)
    }
}
