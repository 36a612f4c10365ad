//! The early-hints side of one navigation.
//!
//! Created when the navigation starts accepting 103 responses and dropped with the
//! navigation. It owns the registry and the channel service, and keeps statistics
//! about the hints it saw.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use citadel_security::{CookieJarSettings, Principal};
use log::{debug, info};
use serde::Serialize;
use url::Url;

use crate::admission::{maybe_create_and_insert_preload, AdmissionRejection};
use crate::channel::{ChannelService, NetworkEvent};
use crate::key::PreloadHashKey;
use crate::link_header::LinkHeader;
use crate::ongoing::OngoingEarlyHints;
use crate::EarlyHintsConfig;

/// How the navigation's final response turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinalResponseCategory {
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Anything else
    Other,
    /// The navigation was cancelled before a final response
    Cancelled,
}

impl FinalResponseCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => FinalResponseCategory::Success,
            300..=399 => FinalResponseCategory::Redirection,
            400..=499 => FinalResponseCategory::ClientError,
            500..=599 => FinalResponseCategory::ServerError,
            _ => FinalResponseCategory::Other,
        }
    }
}

/// Statistics about early hints for the current navigation
#[derive(Debug, Default, Clone, Serialize)]
pub struct EarlyHintStats {
    /// Link records received in 103 responses
    pub hints_received: usize,

    /// Preloads started
    pub preloads_started: usize,

    /// Rejected hints by reason
    pub rejected: HashMap<String, usize>,

    /// Bytes read by preloads
    pub bytes_prefetched: u64,

    /// Outcome of the navigation, once known
    pub final_response: Option<FinalResponseCategory>,

    /// Time between the first hint and the final response
    pub time_to_final_response: Option<Duration>,
}

pub struct EarlyHintsService<N: ChannelService> {
    config: EarlyHintsConfig,
    ongoing: OngoingEarlyHints,
    network: N,
    stats: EarlyHintStats,
    first_early_hint: Option<Instant>,
    canceled: bool,
}

impl<N: ChannelService> EarlyHintsService<N> {
    pub fn new(config: EarlyHintsConfig, network: N) -> Self {
        Self {
            config,
            ongoing: OngoingEarlyHints::new(),
            network,
            stats: EarlyHintStats::default(),
            first_early_hint: None,
            canceled: false,
        }
    }

    /// Handle the Link records of one 103 response
    pub fn early_hint(
        &mut self,
        headers: &[LinkHeader],
        base_uri: &Url,
        triggering_principal: &Principal,
        cookie_jar_settings: &CookieJarSettings,
    ) {
        if self.first_early_hint.is_none() {
            self.first_early_hint = Some(Instant::now());
        }

        for header in headers {
            let _ = self.admit_hint(header, base_uri, triggering_principal, cookie_jar_settings);
        }
    }

    /// Run one Link record through admission. The result is informational only.
    pub fn admit_hint(
        &mut self,
        header: &LinkHeader,
        base_uri: &Url,
        triggering_principal: &Principal,
        cookie_jar_settings: &CookieJarSettings,
    ) -> Result<PreloadHashKey, AdmissionRejection> {
        self.stats.hints_received += 1;

        let result = if self.config.enabled {
            maybe_create_and_insert_preload(
                &mut self.ongoing,
                &mut self.network,
                header,
                base_uri,
                triggering_principal,
                cookie_jar_settings,
            )
        } else {
            Err(AdmissionRejection::Disabled)
        };

        match &result {
            Ok(_) => self.stats.preloads_started += 1,
            Err(reason) => {
                debug!("early hint {} skipped: {}", header.href, reason);
                *self.stats.rejected.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
        result
    }

    /// Deliver a channel event. Must be called from the thread that owns the navigation.
    pub fn on_network_event(&mut self, event: NetworkEvent) {
        self.ongoing.on_network_event(&mut self.network, event);
    }

    /// The navigation's final response arrived; preloads that have not finished by now are
    /// no longer useful.
    pub fn final_response(&mut self, status: u16) {
        self.record_outcome(FinalResponseCategory::from_status(status));
        self.cancel_all_ongoing_preloads();
    }

    /// The navigation was aborted
    pub fn cancel(&mut self) {
        if self.canceled {
            return;
        }
        self.canceled = true;
        self.record_outcome(FinalResponseCategory::Cancelled);
        self.cancel_all_ongoing_preloads();
    }

    pub fn cancel_all_ongoing_preloads(&mut self) {
        self.ongoing.cancel_all_ongoing_preloads(&mut self.network);
    }

    fn record_outcome(&mut self, category: FinalResponseCategory) {
        if self.stats.final_response.is_some() {
            return;
        }

        self.stats.final_response = Some(category);
        self.stats.time_to_final_response = self.first_early_hint.map(|first| first.elapsed());
        info!(
            "early hints: {} hints, {} preloads, final response {:?}",
            self.stats.hints_received, self.stats.preloads_started, category
        );
    }

    pub fn stats(&self) -> EarlyHintStats {
        EarlyHintStats {
            bytes_prefetched: self.ongoing.bytes_read(),
            ..self.stats.clone()
        }
    }

    pub fn ongoing(&self) -> &OngoingEarlyHints {
        &self.ongoing
    }

    pub fn ongoing_mut(&mut self) -> &mut OngoingEarlyHints {
        &mut self.ongoing
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn config(&self) -> &EarlyHintsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_response_categories() {
        assert_eq!(FinalResponseCategory::from_status(200), FinalResponseCategory::Success);
        assert_eq!(FinalResponseCategory::from_status(304), FinalResponseCategory::Redirection);
        assert_eq!(FinalResponseCategory::from_status(404), FinalResponseCategory::ClientError);
        assert_eq!(FinalResponseCategory::from_status(503), FinalResponseCategory::ServerError);
        assert_eq!(FinalResponseCategory::from_status(103), FinalResponseCategory::Other);
    }
}
