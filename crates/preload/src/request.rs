use std::collections::HashMap;

use citadel_security::{ContentPolicyType, CookieJarSettings, Principal, ReferrerInfo, SecurityFlags};
use rand::Rng;
use url::Url;

use crate::channel::ListenerId;
use crate::error::PreloadError;
use crate::PrivacyLevel;

/// Everything a channel service needs to open a channel
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    /// Target URL
    url: Url,

    /// Receiver of the channel's events
    listener: ListenerId,

    /// Principal the load is performed on behalf of
    triggering_principal: Principal,

    /// Security mode of the load
    security_flags: SecurityFlags,

    /// Content policy classification
    content_policy_type: ContentPolicyType,

    /// Cookie jar the load belongs to
    cookie_jar_settings: CookieJarSettings,

    /// Referrer source and policy
    referrer_info: Option<ReferrerInfo>,

    /// Request headers set by the caller
    headers: HashMap<String, String>,
}

impl ChannelRequest {
    /// Create a request for `url`. Only http and https URLs can be opened.
    pub fn new(
        url: &Url,
        listener: ListenerId,
        triggering_principal: Principal,
        security_flags: SecurityFlags,
        content_policy_type: ContentPolicyType,
        cookie_jar_settings: CookieJarSettings,
    ) -> Result<Self, PreloadError> {
        if !is_http_scheme(url) {
            return Err(PreloadError::NotHttpChannel(url.to_string()));
        }

        Ok(Self {
            url: url.clone(),
            listener,
            triggering_principal,
            security_flags,
            content_policy_type,
            cookie_jar_settings,
            referrer_info: None,
            headers: HashMap::new(),
        })
    }

    /// The request a redirect to `url` continues with. Caller-set headers are not carried over.
    pub fn redirected(&self, url: &Url) -> Result<Self, PreloadError> {
        if !is_http_scheme(url) {
            return Err(PreloadError::NotHttpChannel(url.to_string()));
        }

        Ok(Self {
            url: url.clone(),
            headers: HashMap::new(),
            ..self.clone()
        })
    }

    pub fn set_referrer_info(&mut self, referrer_info: ReferrerInfo) {
        self.referrer_info = Some(referrer_info);
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Add a header to the request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_request_header(name, value);
        self
    }

    /// Headers to put on the wire: Accept for the content type, privacy headers for
    /// `privacy_level`, the computed Referer, then the caller's headers.
    pub fn prepared_headers(&self, privacy_level: PrivacyLevel) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Accept".to_string(),
            self.content_policy_type.accept_header().to_string(),
        );

        match privacy_level {
            PrivacyLevel::Maximum => {
                headers.insert("User-Agent".to_string(), random_user_agent());
                headers.insert("DNT".to_string(), "1".to_string());
                headers.insert("Sec-GPC".to_string(), "1".to_string());
            }
            PrivacyLevel::High => {
                headers.insert("User-Agent".to_string(), generic_user_agent());
                headers.insert("DNT".to_string(), "1".to_string());
                headers.insert("Sec-GPC".to_string(), "1".to_string());
            }
            PrivacyLevel::Balanced => {
                headers.insert("User-Agent".to_string(), standard_user_agent());
                headers.insert("DNT".to_string(), "1".to_string());
            }
            PrivacyLevel::Custom => {}
        }

        // Maximum privacy never sends a referrer
        if privacy_level != PrivacyLevel::Maximum {
            if let Some(referrer) = self
                .referrer_info
                .as_ref()
                .and_then(|info| info.referrer_for(&self.url))
            {
                headers.insert("Referer".to_string(), referrer.to_string());
            }
        }

        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        headers
    }

    // Getters

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn triggering_principal(&self) -> &Principal {
        &self.triggering_principal
    }

    pub fn security_flags(&self) -> SecurityFlags {
        self.security_flags
    }

    pub fn content_policy_type(&self) -> ContentPolicyType {
        self.content_policy_type
    }

    pub fn cookie_jar_settings(&self) -> &CookieJarSettings {
        &self.cookie_jar_settings
    }

    pub fn referrer_info(&self) -> Option<&ReferrerInfo> {
        self.referrer_info.as_ref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a caller-set header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Generate a random User-Agent to prevent fingerprinting
fn random_user_agent() -> String {
    let mut rng = rand::thread_rng();

    let browsers = [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/118.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/117.0",
        "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/117.0",
    ];

    browsers[rng.gen_range(0..browsers.len())].to_string()
}

/// Generate a generic User-Agent that doesn't reveal too much
fn generic_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36".to_string()
}

fn standard_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36".to_string()
}
