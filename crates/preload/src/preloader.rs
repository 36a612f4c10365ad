//! A single speculative fetch started from an early hint.
//!
//! The preloader opens one channel, throws the body away (the point of the fetch is
//! the cache entry it leaves behind) and checks every redirect against the URL it
//! was created for. Redirects are adopted in two steps: the offered channel is held
//! as `redirect_channel` until the network layer confirms the redirect happened.

use bytes::Bytes;
use citadel_security::{
    check_same_origin_uri, ContentPolicyType, CookieJarSettings, Principal, ReferrerInfo,
    SecurityFlags,
};
use log::{debug, trace};
use url::Url;

use crate::channel::{ChannelEvent, ChannelId, ChannelService, ListenerId, RedirectKind, RedirectVerifier};
use crate::error::{CancelReason, PreloadError};
use crate::request::ChannelRequest;

/// Request header marking a request as an early-hint preload
pub const EARLY_HINT_HEADER: &str = "X-Moz";
pub const EARLY_HINT_HEADER_VALUE: &str = "early hint";

const LOG_TARGET: &str = "early_hints";

/// Lifecycle of a preloader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloaderState {
    Idle,
    Opening,
    Active,
    Redirecting,
    Completed,
    Cancelled,
}

impl PreloaderState {
    pub fn is_finished(self) -> bool {
        matches!(self, PreloaderState::Completed | PreloaderState::Cancelled)
    }
}

#[derive(Debug)]
pub struct EarlyHintPreloader {
    uri: Url,
    listener: ListenerId,
    channel: Option<ChannelId>,
    redirect_channel: Option<ChannelId>,
    state: PreloaderState,
    bytes_read: u64,
}

impl EarlyHintPreloader {
    pub fn new(uri: Url, listener: ListenerId) -> Self {
        Self {
            uri,
            listener,
            channel: None,
            redirect_channel: None,
            state: PreloaderState::Idle,
            bytes_read: 0,
        }
    }

    /// Open the channel for this preloader's URI. On error nothing was started and the
    /// preloader must be dropped.
    pub fn open_channel(
        &mut self,
        net: &mut dyn ChannelService,
        triggering_principal: &Principal,
        security_flags: SecurityFlags,
        content_policy_type: ContentPolicyType,
        referrer_info: ReferrerInfo,
        cookie_jar_settings: &CookieJarSettings,
    ) -> Result<(), PreloadError> {
        self.state = PreloaderState::Opening;

        let request = ChannelRequest::new(
            &self.uri,
            self.listener,
            triggering_principal.clone(),
            security_flags,
            content_policy_type,
            cookie_jar_settings.clone(),
        )
        .map(|mut request| {
            request.set_referrer_info(referrer_info);
            request.set_request_header(EARLY_HINT_HEADER, EARLY_HINT_HEADER_VALUE);
            request
        });

        match request.and_then(|request| net.async_open(request)) {
            Ok(channel) => {
                debug!(target: LOG_TARGET, "EarlyHintPreloader opened {} for {}", channel, self.uri);
                self.channel = Some(channel);
                self.state = PreloaderState::Active;
                Ok(())
            }
            Err(e) => {
                debug!(target: LOG_TARGET, "EarlyHintPreloader failed to open {}: {}", self.uri, e);
                self.channel = None;
                self.state = PreloaderState::Idle;
                Err(e)
            }
        }
    }

    /// Cancel the active channel, dropping any redirect that is still waiting for its result.
    /// Does nothing once the preloader has no channel.
    pub fn cancel_channel(&mut self, net: &mut dyn ChannelService, reason: CancelReason) {
        // The redirect may have been offered but not yet confirmed
        self.redirect_channel = None;
        if let Some(channel) = self.channel.take() {
            debug!(target: LOG_TARGET, "EarlyHintPreloader cancelling {} ({})", channel, reason);
            net.cancel(channel, reason);
            self.state = PreloaderState::Cancelled;
        }
    }

    /// Dispatch a channel event to the matching handler
    pub fn on_channel_event(&mut self, net: &mut dyn ChannelService, channel: ChannelId, event: ChannelEvent) {
        match event {
            ChannelEvent::StartRequest => self.on_start_request(net, channel),
            ChannelEvent::DataAvailable { offset, data } => {
                self.on_data_available(channel, offset, data);
            }
            ChannelEvent::StopRequest { status } => self.on_stop_request(channel, status),
            ChannelEvent::Redirect {
                new_channel,
                kind,
                verifier,
            } => self.on_channel_redirect(net, channel, new_channel, kind, verifier),
            ChannelEvent::RedirectResult { proceeding } => self.on_redirect_result(proceeding),
        }
    }

    pub fn on_start_request(&mut self, net: &mut dyn ChannelService, channel: ChannelId) {
        trace!(target: LOG_TARGET, "EarlyHintPreloader::on_start_request {}", channel);
        if self.channel != Some(channel) {
            return;
        }

        // no need to prefetch an asset that is already in the cache
        if net.is_from_cache(channel) {
            debug!(target: LOG_TARGET, "{} is already in the cache; canceling prefetch", self.uri);
            self.cancel_channel(net, CancelReason::BindingAborted);
        }
    }

    /// Read and discard. Returns the number of bytes consumed.
    pub fn on_data_available(&mut self, channel: ChannelId, offset: u64, data: Bytes) -> u64 {
        if self.channel != Some(channel) {
            return 0;
        }

        let read = data.len() as u64;
        self.bytes_read += read;
        trace!(target: LOG_TARGET, "prefetched {} bytes [offset={}]", read, offset);
        read
    }

    pub fn on_stop_request(&mut self, channel: ChannelId, status: Result<(), PreloadError>) {
        trace!(target: LOG_TARGET, "EarlyHintPreloader::on_stop_request {} {:?}", channel, status);
        if self.channel != Some(channel) {
            return;
        }

        self.channel = None;
        self.state = match status {
            Err(ref e) if e.is_cancellation() => PreloaderState::Cancelled,
            _ => PreloaderState::Completed,
        };
    }

    /// Vet a redirect offered by the active channel. Only same-origin targets (relative to
    /// the URI this preloader was created for) are accepted, and the new channel is not
    /// adopted until [`on_redirect_result`](Self::on_redirect_result) confirms it.
    pub fn on_channel_redirect(
        &mut self,
        net: &mut dyn ChannelService,
        old_channel: ChannelId,
        new_channel: ChannelId,
        kind: RedirectKind,
        verifier: RedirectVerifier,
    ) {
        if self.channel != Some(old_channel) {
            verifier.on_redirect_verify_callback(Err(CancelReason::Aborted));
            return;
        }

        let Some(new_uri) = net.channel_uri(new_channel) else {
            verifier.on_redirect_verify_callback(Err(CancelReason::Aborted));
            return;
        };

        // abort the request if redirecting to a cross-origin resource
        if check_same_origin_uri(&self.uri, &new_uri).is_err() {
            debug!(target: LOG_TARGET, "rejecting cross-origin {:?} redirect {} -> {}", kind, self.uri, new_uri);
            verifier.on_redirect_verify_callback(Err(CancelReason::Aborted));
            return;
        }

        // Request headers are not forwarded to the new channel
        if let Err(e) = net.set_request_header(new_channel, EARLY_HINT_HEADER, EARLY_HINT_HEADER_VALUE) {
            debug!(target: LOG_TARGET, "cannot mark redirect target {}: {}", new_uri, e);
            verifier.on_redirect_verify_callback(Err(CancelReason::Aborted));
            return;
        }

        self.redirect_channel = Some(new_channel);
        self.state = PreloaderState::Redirecting;
        verifier.on_redirect_verify_callback(Ok(()));
    }

    pub fn on_redirect_result(&mut self, proceeding: bool) {
        if let Some(redirect_channel) = self.redirect_channel.take() {
            if proceeding {
                self.channel = Some(redirect_channel);
            }
        }

        if self.state == PreloaderState::Redirecting {
            self.state = PreloaderState::Active;
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn redirect_channel(&self) -> Option<ChannelId> {
        self.redirect_channel
    }

    pub fn state(&self) -> PreloaderState {
        self.state
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
