//! Preload destinations (`as` values) and what each one means for a speculative load.
//!
//! Every destination is described by one row of [`DESTINATIONS`]. Early hints only
//! preload destinations whose row defines a CORS mode; enabling another one is a
//! change to the table.

use citadel_security::ContentPolicyType;

/// The parsed `as` attribute of a preload link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsDestination {
    Invalid,
    Audio,
    Font,
    Image,
    Script,
    Style,
    Track,
    Video,
    Fetch,
}

/// CORS mode of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorsMode {
    /// No CORS, the response is opaque to cross-origin documents
    NoCors,
    Anonymous,
    UseCredentials,
}

struct DestinationInfo {
    kind: AsDestination,
    token: &'static str,
    content_policy: ContentPolicyType,
    /// CORS mode for early-hint preloads; `None` means early hints never preload this kind
    early_hint_cors: Option<CorsMode>,
}

const DESTINATIONS: &[DestinationInfo] = &[
    DestinationInfo {
        kind: AsDestination::Audio,
        token: "audio",
        content_policy: ContentPolicyType::Audio,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Font,
        token: "font",
        content_policy: ContentPolicyType::Font,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Image,
        token: "image",
        content_policy: ContentPolicyType::Image,
        early_hint_cors: Some(CorsMode::NoCors),
    },
    DestinationInfo {
        kind: AsDestination::Script,
        token: "script",
        content_policy: ContentPolicyType::Script,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Style,
        token: "style",
        content_policy: ContentPolicyType::Stylesheet,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Track,
        token: "track",
        content_policy: ContentPolicyType::Track,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Video,
        token: "video",
        content_policy: ContentPolicyType::Video,
        early_hint_cors: None,
    },
    DestinationInfo {
        kind: AsDestination::Fetch,
        token: "fetch",
        content_policy: ContentPolicyType::Fetch,
        early_hint_cors: None,
    },
];

impl AsDestination {
    /// Parse an `as` token, ASCII case-insensitively. Unknown tokens are `Invalid`.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        DESTINATIONS
            .iter()
            .find(|info| info.token.eq_ignore_ascii_case(token))
            .map(|info| info.kind)
            .unwrap_or(AsDestination::Invalid)
    }

    fn info(self) -> Option<&'static DestinationInfo> {
        DESTINATIONS.iter().find(|info| info.kind == self)
    }

    pub fn is_valid(self) -> bool {
        self != AsDestination::Invalid
    }

    pub fn as_str(self) -> &'static str {
        self.info().map(|info| info.token).unwrap_or("")
    }

    pub fn content_policy_type(self) -> ContentPolicyType {
        self.info()
            .map(|info| info.content_policy)
            .unwrap_or(ContentPolicyType::Invalid)
    }

    /// The CORS mode an early-hint preload of this kind uses, if early hints preload it at all
    pub fn early_hint_cors_mode(self) -> Option<CorsMode> {
        self.info().and_then(|info| info.early_hint_cors)
    }
}

impl std::fmt::Display for AsDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
