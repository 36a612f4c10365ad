#![no_main]

use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use citadel_preload::{
    maybe_create_and_insert_preload, CancelReason, ChannelId, ChannelRequest, ChannelService, LinkHeader,
    OngoingEarlyHints, PreloadError,
};
use citadel_security::{is_same_origin, CookieJarSettings, Principal};
use std::collections::HashMap;
use url::Url;

#[derive(Arbitrary, Debug)]
struct HintFuzzInput {
    base_path: String,
    hints: Vec<FuzzHint>,
}

#[derive(Arbitrary, Debug)]
struct FuzzHint {
    href: String,
    rel: String,
    as_: String,
    referrer_policy: String,
}

/// Records opens and cancels without touching the network
#[derive(Default)]
struct RecordingChannels {
    opened: Vec<Url>,
    cancels: HashMap<ChannelId, usize>,
}

impl ChannelService for RecordingChannels {
    fn async_open(&mut self, request: ChannelRequest) -> Result<ChannelId, PreloadError> {
        self.opened.push(request.url().clone());
        Ok(ChannelId(self.opened.len() as u64))
    }

    fn is_from_cache(&self, _channel: ChannelId) -> bool {
        false
    }

    fn channel_uri(&self, channel: ChannelId) -> Option<Url> {
        let index = (channel.0 as usize).checked_sub(1)?;
        self.opened.get(index).cloned()
    }

    fn set_request_header(&mut self, _channel: ChannelId, _name: &str, _value: &str) -> Result<(), PreloadError> {
        Ok(())
    }

    fn cancel(&mut self, channel: ChannelId, _reason: CancelReason) {
        *self.cancels.entry(channel).or_insert(0) += 1;
    }
}

fuzz_target!(|input: HintFuzzInput| {
    let Ok(base) = Url::parse("https://example.com/").and_then(|root| root.join(&input.base_path)) else {
        return;
    };
    let principal = Principal::content(&base);
    let cookie_jar = CookieJarSettings::default();

    let mut ongoing = OngoingEarlyHints::new();
    let mut net = RecordingChannels::default();

    for hint in &input.hints {
        let header = LinkHeader::new(&hint.href, &hint.rel)
            .with_as(&hint.as_)
            .with_referrer_policy(&hint.referrer_policy);
        let _ = maybe_create_and_insert_preload(&mut ongoing, &mut net, &header, &base, &principal, &cookie_jar);
    }

    // Every open belongs to exactly one registry entry and stays same-origin
    assert_eq!(net.opened.len(), ongoing.len());
    for url in &net.opened {
        assert!(is_same_origin(url, &base), "cross-origin preload of {}", url);
    }

    ongoing.cancel_all_ongoing_preloads(&mut net);
    ongoing.cancel_all_ongoing_preloads(&mut net);
    assert_eq!(net.cancels.len(), net.opened.len());
    assert!(net.cancels.values().all(|count| *count == 1));
});
