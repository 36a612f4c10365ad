//! Shared fixtures: a deterministic in-memory channel service and hint helpers.

#![allow(dead_code)]

pub mod hint_server;

use std::collections::{HashMap, HashSet, VecDeque};

use citadel_preload::{
    CancelReason, ChannelEvent, ChannelId, ChannelRequest, ChannelService, EarlyHintsService, LinkHeader,
    ListenerId, NetworkEvent, PreloadError, RedirectKind, RedirectVerifier,
};
use citadel_security::{CookieBehavior, CookieJarSettings, Principal};
use futures::channel::oneshot;
use url::Url;

pub const BASE: &str = "https://example.com/index.html";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn base() -> Url {
    url(BASE)
}

pub fn principal() -> Principal {
    Principal::content(&base())
}

pub fn cookie_jar() -> CookieJarSettings {
    CookieJarSettings::for_top_level(&base(), CookieBehavior::default())
}

pub fn preload(href: &str, as_: &str) -> LinkHeader {
    LinkHeader::new(href, "preload").with_as(as_)
}

/// Channel service that never touches the network.
///
/// Channels are numbered in open order. Events are only produced when a test asks for
/// them, except the `StopRequest` that follows a cancel, which is queued on `pending`.
#[derive(Default)]
pub struct FakeNetwork {
    pub next: u64,
    pub opened: Vec<(ChannelId, ChannelRequest)>,
    pub uris: HashMap<ChannelId, Url>,
    pub listeners: HashMap<ChannelId, ListenerId>,
    pub headers: HashMap<ChannelId, HashMap<String, String>>,
    pub cached: HashSet<Url>,
    pub cancelled: Vec<(ChannelId, CancelReason)>,
    pub finished: HashSet<ChannelId>,
    pub pending: VecDeque<NetworkEvent>,
    pub fail_open: bool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, uri: Url, listener: ListenerId) -> ChannelId {
        self.next += 1;
        let id = ChannelId(self.next);
        self.uris.insert(id, uri);
        self.listeners.insert(id, listener);
        id
    }

    /// Number of requests that were actually opened for `uri`
    pub fn requests_to(&self, uri: &str) -> usize {
        self.opened
            .iter()
            .filter(|(_, request)| request.url().as_str() == uri)
            .count()
    }

    pub fn cancel_count(&self, channel: ChannelId) -> usize {
        self.cancelled.iter().filter(|(id, _)| *id == channel).count()
    }

    pub fn listener_of(&self, channel: ChannelId) -> ListenerId {
        self.listeners[&channel]
    }

    /// Event addressed to whoever listens on `channel`
    pub fn event(&self, channel: ChannelId, event: ChannelEvent) -> NetworkEvent {
        NetworkEvent::new(self.listener_of(channel), channel, event)
    }

    /// Offer a redirect of `channel` to `target`. Returns the new channel, the event to
    /// deliver and the receiving end of the verify callback.
    pub fn offer_redirect(
        &mut self,
        channel: ChannelId,
        target: &str,
    ) -> (ChannelId, NetworkEvent, oneshot::Receiver<Result<(), CancelReason>>) {
        let listener = self.listener_of(channel);
        let new_channel = self.allocate(url(target), listener);
        let (verifier, verdict) = RedirectVerifier::new();
        let event = NetworkEvent::new(
            listener,
            channel,
            ChannelEvent::Redirect {
                new_channel,
                kind: RedirectKind::Temporary,
                verifier,
            },
        );
        (new_channel, event, verdict)
    }
}

impl ChannelService for FakeNetwork {
    fn async_open(&mut self, request: ChannelRequest) -> Result<ChannelId, PreloadError> {
        if self.fail_open {
            return Err(PreloadError::ConnectionError("offline".to_string()));
        }
        let id = self.allocate(request.url().clone(), request.listener());
        self.headers.insert(id, request.headers().clone());
        self.opened.push((id, request));
        Ok(id)
    }

    fn is_from_cache(&self, channel: ChannelId) -> bool {
        self.uris
            .get(&channel)
            .map_or(false, |uri| self.cached.contains(uri))
    }

    fn channel_uri(&self, channel: ChannelId) -> Option<Url> {
        self.uris.get(&channel).cloned()
    }

    fn set_request_header(&mut self, channel: ChannelId, name: &str, value: &str) -> Result<(), PreloadError> {
        if !self.uris.contains_key(&channel) {
            return Err(PreloadError::UnknownChannel(channel.0));
        }
        self.headers
            .entry(channel)
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn cancel(&mut self, channel: ChannelId, reason: CancelReason) {
        self.cancelled.push((channel, reason));
        if self.finished.insert(channel) {
            let listener = self.listener_of(channel);
            self.pending.push_back(NetworkEvent::new(
                listener,
                channel,
                ChannelEvent::StopRequest {
                    status: Err(PreloadError::Cancelled(reason)),
                },
            ));
        }
    }
}

/// Deliver every queued event to `service`
pub fn drain(service: &mut EarlyHintsService<FakeNetwork>) {
    while let Some(event) = service.network_mut().pending.pop_front() {
        service.on_network_event(event);
    }
}
