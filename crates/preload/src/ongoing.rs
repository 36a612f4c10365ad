//! Per-navigation registry of early-hint preloads.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::channel::{ChannelEvent, ChannelService, ListenerId, NetworkEvent};
use crate::error::CancelReason;
use crate::key::PreloadHashKey;
use crate::preloader::{EarlyHintPreloader, PreloaderState};

/// Owns every preloader started for one navigation, keyed by [`PreloadHashKey`].
///
/// Finished preloaders stay in the map so that a later hint for the same resource is
/// still recognised as a duplicate.
#[derive(Debug, Default)]
pub struct OngoingEarlyHints {
    preloads: HashMap<PreloadHashKey, EarlyHintPreloader>,
    listeners: HashMap<ListenerId, PreloadHashKey>,
    next_listener: u64,
}

impl OngoingEarlyHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the listener id for a preloader that is about to be created
    pub fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    pub fn contains(&self, key: &PreloadHashKey) -> bool {
        self.preloads.contains_key(key)
    }

    /// Insert `preloader` under `key` unless the key is already taken. A rejected
    /// preloader is handed back so the caller can cancel it.
    pub fn add(&mut self, key: PreloadHashKey, preloader: EarlyHintPreloader) -> Result<(), EarlyHintPreloader> {
        if self.preloads.contains_key(&key) {
            warn!("duplicate early hint preload for {}", key);
            return Err(preloader);
        }

        self.listeners.insert(preloader.listener(), key.clone());
        self.preloads.insert(key, preloader);
        Ok(())
    }

    /// Cancel every preloader's channel. Entries stay in the registry.
    pub fn cancel_all_ongoing_preloads(&mut self, net: &mut dyn ChannelService) {
        debug!("cancelling {} early hint preloads", self.preloads.len());
        for preloader in self.preloads.values_mut() {
            preloader.cancel_channel(net, CancelReason::Aborted);
        }
    }

    /// Route a channel event to the preloader listening on it
    pub fn on_network_event(&mut self, net: &mut dyn ChannelService, event: NetworkEvent) {
        let NetworkEvent {
            listener,
            channel,
            event,
        } = event;

        let preloader = self
            .listeners
            .get(&listener)
            .and_then(|key| self.preloads.get_mut(key));

        match preloader {
            Some(preloader) => preloader.on_channel_event(net, channel, event),
            None => {
                trace!("dropping event for unknown listener {:?} on {}", listener, channel);
                if let ChannelEvent::Redirect { verifier, .. } = event {
                    verifier.on_redirect_verify_callback(Err(CancelReason::Aborted));
                }
            }
        }
    }

    /// Drop finished entries so their resources may be hinted again. Returns how many
    /// entries were removed.
    pub fn purge_finished(&mut self) -> usize {
        let before = self.preloads.len();
        self.preloads.retain(|_, preloader| !preloader.state().is_finished());
        let preloads = &self.preloads;
        self.listeners.retain(|_, key| preloads.contains_key(key));
        before - self.preloads.len()
    }

    pub fn get(&self, key: &PreloadHashKey) -> Option<&EarlyHintPreloader> {
        self.preloads.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PreloadHashKey, &EarlyHintPreloader)> {
        self.preloads.iter()
    }

    pub fn len(&self) -> usize {
        self.preloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preloads.is_empty()
    }

    /// Number of preloaders that still hold a channel
    pub fn active_count(&self) -> usize {
        self.preloads
            .values()
            .filter(|preloader| preloader.channel().is_some())
            .count()
    }

    pub fn count_in_state(&self, state: PreloaderState) -> usize {
        self.preloads
            .values()
            .filter(|preloader| preloader.state() == state)
            .count()
    }

    /// Total bytes read by all preloaders
    pub fn bytes_read(&self) -> u64 {
        self.preloads.values().map(EarlyHintPreloader::bytes_read).sum()
    }
}
