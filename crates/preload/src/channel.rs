//! The network collaborator seen from a preloader: channel ids, channel events and
//! the [`ChannelService`] trait.
//!
//! Channels report back through [`NetworkEvent`] messages. Whoever owns the
//! navigation drains those messages on one thread and hands them to the registry,
//! so the preloader state machine only ever advances from that thread.

use bytes::Bytes;
use futures::channel::oneshot;
use url::Url;

use crate::error::{CancelReason, PreloadError};
use crate::request::ChannelRequest;

/// Identifies one network channel. A redirect produces a new channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// Identifies the event sink (a preloader) that receives a channel's events, across redirects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Kind of redirect being offered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// 302, 303, 307
    Temporary,
    /// 301, 308
    Permanent,
}

impl RedirectKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            301 | 308 => RedirectKind::Permanent,
            _ => RedirectKind::Temporary,
        }
    }
}

/// Outcome a listener reports for an offered redirect
pub type RedirectVerdict = Result<(), CancelReason>;

/// Callback half of the redirect verification round-trip.
///
/// The channel service keeps the receiving half and waits on it before it decides
/// whether the redirect proceeds.
pub struct RedirectVerifier {
    sender: oneshot::Sender<RedirectVerdict>,
}

impl RedirectVerifier {
    pub fn new() -> (Self, oneshot::Receiver<RedirectVerdict>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn on_redirect_verify_callback(self, verdict: RedirectVerdict) {
        // The channel may already be gone; nothing is waiting for the verdict then.
        let _ = self.sender.send(verdict);
    }
}

impl std::fmt::Debug for RedirectVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectVerifier")
            .field("canceled", &self.sender.is_canceled())
            .finish()
    }
}

/// Events a channel delivers to its listener
#[derive(Debug)]
pub enum ChannelEvent {
    StartRequest,
    DataAvailable { offset: u64, data: Bytes },
    StopRequest { status: Result<(), PreloadError> },
    /// The channel wants to redirect to `new_channel`; the listener must answer through `verifier`
    Redirect {
        new_channel: ChannelId,
        kind: RedirectKind,
        verifier: RedirectVerifier,
    },
    /// Final word on the last offered redirect
    RedirectResult { proceeding: bool },
}

#[derive(Debug)]
pub struct NetworkEvent {
    pub listener: ListenerId,
    pub channel: ChannelId,
    pub event: ChannelEvent,
}

impl NetworkEvent {
    pub fn new(listener: ListenerId, channel: ChannelId, event: ChannelEvent) -> Self {
        Self { listener, channel, event }
    }
}

/// The network layer a preloader drives.
///
/// `async_open` returns as soon as the channel exists; everything after that is
/// reported through [`NetworkEvent`]s addressed to the request's listener.
pub trait ChannelService {
    /// Create a channel for `request` and start it asynchronously
    fn async_open(&mut self, request: ChannelRequest) -> Result<ChannelId, PreloadError>;

    /// Whether the channel's response is being served from a local cache
    fn is_from_cache(&self, channel: ChannelId) -> bool;

    /// Final URI of the channel
    fn channel_uri(&self, channel: ChannelId) -> Option<Url>;

    /// Set an outgoing request header on a channel that has not been sent yet
    fn set_request_header(&mut self, channel: ChannelId, name: &str, value: &str) -> Result<(), PreloadError>;

    /// Cancel the channel. The listener still receives a `StopRequest`.
    fn cancel(&mut self, channel: ChannelId, reason: CancelReason);
}
