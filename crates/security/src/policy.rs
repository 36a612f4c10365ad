//! Load-info security modes and content policy classification.

use serde::{Deserialize, Serialize};

/// How the security checks of a load treat cross-origin targets and the security
/// context of the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityFlags {
    /// Same-origin only; the result inherits the loader's security context
    RequireSameOriginInheritsSecContext,
    /// Same-origin only; data: URLs are blocked
    RequireSameOriginDataIsBlocked,
    /// Cross-origin allowed; the result inherits the loader's security context
    AllowCrossOriginInheritsSecContext,
    /// Cross-origin allowed; the result gets a null security context
    AllowCrossOriginSecContextIsNull,
    /// Cross-origin requires CORS
    RequireCorsInheritsSecContext,
}

/// Classification of a load for content policy checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentPolicyType {
    Invalid,
    Image,
    Font,
    Script,
    Stylesheet,
    Audio,
    Video,
    Track,
    Fetch,
}

impl ContentPolicyType {
    pub fn is_valid(self) -> bool {
        self != ContentPolicyType::Invalid
    }

    /// The `Accept` header a load of this type sends
    pub fn accept_header(self) -> &'static str {
        match self {
            ContentPolicyType::Image => "image/avif,image/webp,image/png,image/svg+xml,image/*;q=0.8,*/*;q=0.5",
            ContentPolicyType::Font => "application/font-woff2;q=1.0,application/font-woff;q=0.9,*/*;q=0.8",
            ContentPolicyType::Script => "*/*",
            ContentPolicyType::Stylesheet => "text/css,*/*;q=0.1",
            ContentPolicyType::Audio | ContentPolicyType::Video => {
                "video/webm,audio/ogg,audio/wav,audio/*;q=0.9,application/ogg;q=0.7,video/*;q=0.6,*/*;q=0.5"
            }
            ContentPolicyType::Track => "text/vtt,*/*;q=0.5",
            ContentPolicyType::Fetch | ContentPolicyType::Invalid => "*/*",
        }
    }
}
