//! Referrer policy and referrer computation.

use serde::{Deserialize, Serialize};
use url::Url;

/// <https://w3c.github.io/webappsec-referrer-policy/#referrer-policies>
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferrerPolicy {
    /// ""
    #[default]
    EmptyString,
    /// "no-referrer"
    NoReferrer,
    /// "no-referrer-when-downgrade"
    NoReferrerWhenDowngrade,
    /// "origin"
    Origin,
    /// "same-origin"
    SameOrigin,
    /// "origin-when-cross-origin"
    OriginWhenCrossOrigin,
    /// "unsafe-url"
    UnsafeUrl,
    /// "strict-origin"
    StrictOrigin,
    /// "strict-origin-when-cross-origin"
    StrictOriginWhenCrossOrigin,
}

impl ReferrerPolicy {
    /// Parse a `referrerpolicy` attribute value. Unknown values yield the empty policy.
    pub fn from_attribute(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "no-referrer" => ReferrerPolicy::NoReferrer,
            "no-referrer-when-downgrade" => ReferrerPolicy::NoReferrerWhenDowngrade,
            "origin" => ReferrerPolicy::Origin,
            "same-origin" => ReferrerPolicy::SameOrigin,
            "origin-when-cross-origin" => ReferrerPolicy::OriginWhenCrossOrigin,
            "unsafe-url" => ReferrerPolicy::UnsafeUrl,
            "strict-origin" => ReferrerPolicy::StrictOrigin,
            "strict-origin-when-cross-origin" => ReferrerPolicy::StrictOriginWhenCrossOrigin,
            _ => ReferrerPolicy::EmptyString,
        }
    }

    /// The policy actually applied once the empty string falls back to the default
    pub fn effective(self) -> Self {
        match self {
            ReferrerPolicy::EmptyString => ReferrerPolicy::StrictOriginWhenCrossOrigin,
            policy => policy,
        }
    }
}

impl std::fmt::Display for ReferrerPolicy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = match self {
            ReferrerPolicy::EmptyString => "",
            ReferrerPolicy::NoReferrer => "no-referrer",
            ReferrerPolicy::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            ReferrerPolicy::Origin => "origin",
            ReferrerPolicy::SameOrigin => "same-origin",
            ReferrerPolicy::OriginWhenCrossOrigin => "origin-when-cross-origin",
            ReferrerPolicy::UnsafeUrl => "unsafe-url",
            ReferrerPolicy::StrictOrigin => "strict-origin",
            ReferrerPolicy::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        };
        write!(formatter, "{string}")
    }
}

/// The referrer source of a request together with the policy that governs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferrerInfo {
    original_referrer: Url,
    policy: ReferrerPolicy,
}

impl ReferrerInfo {
    pub fn new(original_referrer: Url, policy: ReferrerPolicy) -> Self {
        Self {
            original_referrer,
            policy,
        }
    }

    pub fn original_referrer(&self) -> &Url {
        &self.original_referrer
    }

    pub fn policy(&self) -> ReferrerPolicy {
        self.policy
    }

    /// <https://w3c.github.io/webappsec-referrer-policy/#determine-requests-referrer>
    ///
    /// Returns the value of the `Referer` header for a request to `target`, if any.
    pub fn referrer_for(&self, target: &Url) -> Option<Url> {
        let source = &self.original_referrer;
        let cross_origin = source.origin() != target.origin();
        let downgrade = source.scheme() == "https" && target.scheme() != "https";

        match self.policy.effective() {
            ReferrerPolicy::NoReferrer | ReferrerPolicy::EmptyString => None,
            ReferrerPolicy::Origin => strip_url(source, true),
            ReferrerPolicy::SameOrigin if cross_origin => None,
            ReferrerPolicy::SameOrigin => strip_url(source, false),
            ReferrerPolicy::UnsafeUrl => strip_url(source, false),
            ReferrerPolicy::OriginWhenCrossOrigin => strip_url(source, cross_origin),
            ReferrerPolicy::StrictOrigin if downgrade => None,
            ReferrerPolicy::StrictOrigin => strip_url(source, true),
            ReferrerPolicy::StrictOriginWhenCrossOrigin if downgrade => None,
            ReferrerPolicy::StrictOriginWhenCrossOrigin => strip_url(source, cross_origin),
            ReferrerPolicy::NoReferrerWhenDowngrade if downgrade => None,
            ReferrerPolicy::NoReferrerWhenDowngrade => strip_url(source, false),
        }
    }
}

/// <https://w3c.github.io/webappsec-referrer-policy/#strip-url>
fn strip_url(url: &Url, origin_only: bool) -> Option<Url> {
    if url.scheme() != "https" && url.scheme() != "http" {
        return None;
    }

    let mut referrer = url.clone();
    // http(s) URLs always have a host, so clearing credentials cannot fail
    let _ = referrer.set_username("");
    let _ = referrer.set_password(None);
    referrer.set_fragment(None);
    if origin_only {
        referrer.set_path("");
        referrer.set_query(None);
    }
    Some(referrer)
}
