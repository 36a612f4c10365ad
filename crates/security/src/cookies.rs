//! Cookie jar settings carried by every load.
//!
//! The partition key is derived from the top-level site so that anything a
//! speculative load leaves behind (cookies, cache entries) stays scoped to the
//! navigation's site.

use serde::{Deserialize, Serialize};
use url::Url;

/// Cookie behavior for a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CookieBehavior {
    /// Accept all cookies
    Accept,
    /// Reject third-party cookies
    RejectForeign,
    /// Reject all cookies
    Reject,
    /// Accept third-party cookies only from sites already visited
    LimitForeign,
    /// Reject trackers and partition all other third-party state
    #[default]
    RejectTrackersAndPartitionForeign,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CookieJarSettings {
    behavior: CookieBehavior,
    partition_key: String,
}

impl CookieJarSettings {
    /// Build settings for a navigation whose top-level document is `top_level`
    pub fn for_top_level(top_level: &Url, behavior: CookieBehavior) -> Self {
        Self {
            behavior,
            partition_key: partition_key_for(top_level),
        }
    }

    pub fn behavior(&self) -> CookieBehavior {
        self.behavior
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl Default for CookieJarSettings {
    fn default() -> Self {
        Self {
            behavior: CookieBehavior::default(),
            partition_key: String::new(),
        }
    }
}

/// `(scheme,host)` of the top-level site; ports are ignored like site comparison does.
fn partition_key_for(url: &Url) -> String {
    match url.host_str() {
        Some(host) => format!("({},{})", url.scheme(), host),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_ignores_path_and_port() {
        let a = CookieJarSettings::for_top_level(
            &Url::parse("https://example.com:8443/a/b").unwrap(),
            CookieBehavior::Accept,
        );
        let b = CookieJarSettings::for_top_level(
            &Url::parse("https://example.com/c").unwrap(),
            CookieBehavior::Accept,
        );
        assert_eq!(a.partition_key(), "(https,example.com)");
        assert_eq!(a.partition_key(), b.partition_key());
    }

    #[test]
    fn test_cookie_behavior() {
        let url = Url::parse("https://example.com/").unwrap();
        let reject = CookieJarSettings::for_top_level(&url, CookieBehavior::Reject);
        assert_eq!(reject.behavior(), CookieBehavior::Reject);
        assert_eq!(CookieJarSettings::default().behavior(), CookieBehavior::default());
    }

    #[test]
    fn test_settings_round_trip_through_json() {
        let settings = CookieJarSettings::for_top_level(
            &Url::parse("https://example.com/").unwrap(),
            CookieBehavior::LimitForeign,
        );
        let json = serde_json::to_string(&settings).unwrap();
        let back: CookieJarSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }
}
