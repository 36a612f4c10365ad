//! Turning a `Link` header from a 103 response into a preload.
//!
//! Every check here fails quietly: a hint that cannot be preloaded is simply not
//! preloaded, and the real load later goes through the normal path.

use citadel_security::{
    check_same_origin_uri, resolve_uri, CookieJarSettings, Principal, ReferrerInfo, ReferrerPolicy,
    SecurityFlags,
};
use log::{debug, warn};
use url::Url;

use crate::channel::ChannelService;
use crate::destination::AsDestination;
use crate::error::CancelReason;
use crate::key::PreloadHashKey;
use crate::link_header::LinkHeader;
use crate::ongoing::OngoingEarlyHints;
use crate::preloader::EarlyHintPreloader;

/// Why a hint did not start a preload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionRejection {
    /// Early hints are turned off
    Disabled,
    /// `rel` is not `preload`
    NotPreload,
    /// `as` is missing or unknown
    InvalidDestination,
    /// `href` does not resolve against the base URI
    InvalidUri,
    /// The target is not same-origin with the base URI
    CrossOrigin,
    /// Early hints do not preload this destination
    UnsupportedDestination,
    /// An equal preload is already registered
    Duplicate,
    /// The destination has no content policy type
    InvalidContentPolicy,
    /// The channel could not be opened
    OpenFailed,
}

impl AdmissionRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionRejection::Disabled => "disabled",
            AdmissionRejection::NotPreload => "not-preload",
            AdmissionRejection::InvalidDestination => "invalid-destination",
            AdmissionRejection::InvalidUri => "invalid-uri",
            AdmissionRejection::CrossOrigin => "cross-origin",
            AdmissionRejection::UnsupportedDestination => "unsupported-destination",
            AdmissionRejection::Duplicate => "duplicate",
            AdmissionRejection::InvalidContentPolicy => "invalid-content-policy",
            AdmissionRejection::OpenFailed => "open-failed",
        }
    }
}

impl std::fmt::Display for AdmissionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start a preload for `header` unless it is not a same-origin preload of a supported
/// destination or an equal preload is already in `ongoing`.
pub fn maybe_create_and_insert_preload(
    ongoing: &mut OngoingEarlyHints,
    net: &mut dyn ChannelService,
    header: &LinkHeader,
    base_uri: &Url,
    triggering_principal: &Principal,
    cookie_jar_settings: &CookieJarSettings,
) -> Result<PreloadHashKey, AdmissionRejection> {
    if !header.is_preload() {
        return Err(AdmissionRejection::NotPreload);
    }

    // return early when it's definitely not an asset type we preload;
    // the key generation below would catch it as well
    let destination = AsDestination::parse(&header.as_);
    if !destination.is_valid() {
        return Err(AdmissionRejection::InvalidDestination);
    }

    let uri = resolve_uri(&header.href, base_uri).map_err(|_| AdmissionRejection::InvalidUri)?;

    // Only make same origin preloads
    check_same_origin_uri(base_uri, &uri).map_err(|_| AdmissionRejection::CrossOrigin)?;

    let key = PreloadHashKey::for_early_hint(destination, &uri, triggering_principal)
        .ok_or(AdmissionRejection::UnsupportedDestination)?;

    if ongoing.contains(&key) {
        return Err(AdmissionRejection::Duplicate);
    }

    let content_policy_type = destination.content_policy_type();
    if !content_policy_type.is_valid() {
        return Err(AdmissionRejection::InvalidContentPolicy);
    }

    let referrer_policy = ReferrerPolicy::from_attribute(&header.referrer_policy);
    let referrer_info = ReferrerInfo::new(base_uri.clone(), referrer_policy);

    let mut preloader = EarlyHintPreloader::new(uri, ongoing.next_listener_id());
    preloader
        .open_channel(
            net,
            triggering_principal,
            SecurityFlags::AllowCrossOriginInheritsSecContext,
            content_policy_type,
            referrer_info,
            cookie_jar_settings,
        )
        .map_err(|e| {
            if e.is_open_failure() {
                debug!("early hint preload not opened: {}", e);
            } else {
                warn!("early hint preload failed to open: {}", e);
            }
            AdmissionRejection::OpenFailed
        })?;

    debug!("early hint preload started for {}", key);
    if let Err(mut rejected) = ongoing.add(key.clone(), preloader) {
        rejected.cancel_channel(net, CancelReason::Aborted);
        return Err(AdmissionRejection::Duplicate);
    }

    Ok(key)
}
