mod common;

use citadel_preload::{
    maybe_create_and_insert_preload, AdmissionRejection, AsDestination, CancelReason, ChannelEvent, CorsMode,
    LinkHeader, ListenerId, OngoingEarlyHints, PreloaderState, PrivacyLevel, EARLY_HINT_HEADER, EARLY_HINT_HEADER_VALUE,
};
use citadel_security::{OriginAttributes, Principal, ReferrerPolicy};

use common::{base, cookie_jar, init_logging, preload, principal, url, FakeNetwork};

fn admit(
    ongoing: &mut OngoingEarlyHints,
    net: &mut FakeNetwork,
    header: &LinkHeader,
) -> Result<citadel_preload::PreloadHashKey, AdmissionRejection> {
    maybe_create_and_insert_preload(ongoing, net, header, &base(), &principal(), &cookie_jar())
}

#[test]
fn test_identical_hints_open_one_request() {
    init_logging();
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    let key = admit(&mut ongoing, &mut net, &preload("/img/logo.png", "image")).unwrap();
    assert_eq!(key.destination(), AsDestination::Image);
    assert_eq!(key.cors_mode(), CorsMode::NoCors);

    // Same resource spelled differently
    let second = admit(&mut ongoing, &mut net, &preload("https://example.com/img/logo.png", "IMAGE"));
    assert_eq!(second, Err(AdmissionRejection::Duplicate));

    assert_eq!(net.opened.len(), 1);
    assert_eq!(ongoing.len(), 1);
    assert!(ongoing.contains(&key));
}

#[test]
fn test_duplicate_of_finished_preload_is_still_rejected() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    admit(&mut ongoing, &mut net, &preload("/a.png", "image")).unwrap();
    let channel = net.opened[0].0;
    let event = net.event(channel, ChannelEvent::StartRequest);
    ongoing.on_network_event(&mut net, event);
    let event = net.event(channel, ChannelEvent::StopRequest { status: Ok(()) });
    ongoing.on_network_event(&mut net, event);
    assert_eq!(ongoing.count_in_state(PreloaderState::Completed), 1);

    assert_eq!(
        admit(&mut ongoing, &mut net, &preload("/a.png", "image")),
        Err(AdmissionRejection::Duplicate)
    );
    assert_eq!(net.opened.len(), 1);
}

#[test]
fn test_different_principals_do_not_share_a_preload() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();
    let header = preload("/a.png", "image");

    let private = Principal::content_with_attributes(
        &base(),
        OriginAttributes {
            private_browsing_id: 1,
            ..Default::default()
        },
    );
    maybe_create_and_insert_preload(&mut ongoing, &mut net, &header, &base(), &principal(), &cookie_jar()).unwrap();
    maybe_create_and_insert_preload(&mut ongoing, &mut net, &header, &base(), &private, &cookie_jar()).unwrap();

    assert_eq!(net.opened.len(), 2);
    assert_eq!(ongoing.len(), 2);
}

#[test]
fn test_cross_origin_hints_never_open_requests() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    for href in [
        "https://cdn.example.com/a.png",
        "http://example.com/a.png",
        "https://example.com:8443/a.png",
        "https://tracker.test/pixel.png",
    ] {
        assert_eq!(
            admit(&mut ongoing, &mut net, &preload(href, "image")),
            Err(AdmissionRejection::CrossOrigin),
            "{href}"
        );
    }

    assert!(net.opened.is_empty());
    assert!(ongoing.is_empty());
}

#[test]
fn test_unsupported_destinations_are_skipped() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    for as_ in ["script", "style", "font", "fetch", "video"] {
        assert_eq!(
            admit(&mut ongoing, &mut net, &preload("/asset", as_)),
            Err(AdmissionRejection::UnsupportedDestination),
            "{as_}"
        );
    }
    for as_ in ["", "document", "img"] {
        assert_eq!(
            admit(&mut ongoing, &mut net, &preload("/asset", as_)),
            Err(AdmissionRejection::InvalidDestination),
            "{as_:?}"
        );
    }

    assert!(net.opened.is_empty());
    assert!(ongoing.is_empty());
}

#[test]
fn test_non_preload_and_unresolvable_hints() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    let preconnect = LinkHeader::new("/a.png", "preconnect").with_as("image");
    assert_eq!(
        admit(&mut ongoing, &mut net, &preconnect),
        Err(AdmissionRejection::NotPreload)
    );
    assert_eq!(
        admit(&mut ongoing, &mut net, &preload("https://[::1", "image")),
        Err(AdmissionRejection::InvalidUri)
    );
    assert!(net.opened.is_empty());
}

#[test]
fn test_open_failure_leaves_registry_untouched() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork {
        fail_open: true,
        ..Default::default()
    };

    assert_eq!(
        admit(&mut ongoing, &mut net, &preload("/a.png", "image")),
        Err(AdmissionRejection::OpenFailed)
    );
    assert!(ongoing.is_empty());

    // A later hint for the same resource may try again
    net.fail_open = false;
    assert!(admit(&mut ongoing, &mut net, &preload("/a.png", "image")).is_ok());
}

#[test]
fn test_request_carries_marker_and_referrer() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();

    admit(&mut ongoing, &mut net, &preload("/a.png", "image")).unwrap();
    admit(
        &mut ongoing,
        &mut net,
        &preload("/b.png", "image").with_referrer_policy("no-referrer"),
    )
    .unwrap();

    let (first, request) = &net.opened[0];
    assert_eq!(
        net.headers[first].get(EARLY_HINT_HEADER).map(String::as_str),
        Some(EARLY_HINT_HEADER_VALUE)
    );
    let prepared = request.prepared_headers(PrivacyLevel::High);
    assert_eq!(
        prepared.get("Referer").map(String::as_str),
        Some("https://example.com/index.html")
    );
    assert_eq!(prepared.get("Accept").map(String::as_str), Some(request.content_policy_type().accept_header()));

    let (_, request) = &net.opened[1];
    assert_eq!(
        request.referrer_info().map(|info| info.policy()),
        Some(ReferrerPolicy::NoReferrer)
    );
    assert!(!request.prepared_headers(PrivacyLevel::High).contains_key("Referer"));
}

#[test]
fn test_cancel_all_cancels_each_active_request_once() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();
    for href in ["/a.png", "/b.png", "/c.png"] {
        admit(&mut ongoing, &mut net, &preload(href, "image")).unwrap();
    }

    // One of them has already finished
    let done = net.opened[2].0;
    let event = net.event(done, ChannelEvent::StopRequest { status: Ok(()) });
    ongoing.on_network_event(&mut net, event);

    ongoing.cancel_all_ongoing_preloads(&mut net);
    ongoing.cancel_all_ongoing_preloads(&mut net);

    assert_eq!(net.cancel_count(net.opened[0].0), 1);
    assert_eq!(net.cancel_count(net.opened[1].0), 1);
    assert_eq!(net.cancel_count(done), 0);
    assert!(net.cancelled.iter().all(|(_, reason)| *reason == CancelReason::Aborted));

    // Entries are kept
    assert_eq!(ongoing.len(), 3);
    assert_eq!(ongoing.active_count(), 0);
    assert_eq!(ongoing.count_in_state(PreloaderState::Cancelled), 2);
}

#[test]
fn test_events_for_unknown_listener_are_dropped() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();
    admit(&mut ongoing, &mut net, &preload("/a.png", "image")).unwrap();

    // A channel nobody in this registry listens to
    let stray = ListenerId(99);
    let channel = net.opened[0].0;
    net.listeners.insert(channel, stray);
    let (_, event, mut verdict) = net.offer_redirect(channel, "https://example.com/elsewhere.png");
    ongoing.on_network_event(&mut net, event);

    assert_eq!(verdict.try_recv().unwrap(), Some(Err(CancelReason::Aborted)));
    assert_eq!(ongoing.count_in_state(PreloaderState::Active), 1);
}

#[test]
fn test_purge_finished_allows_refetch() {
    let mut ongoing = OngoingEarlyHints::new();
    let mut net = FakeNetwork::new();
    admit(&mut ongoing, &mut net, &preload("/a.png", "image")).unwrap();
    admit(&mut ongoing, &mut net, &preload("/b.png", "image")).unwrap();

    let done = net.opened[0].0;
    let event = net.event(done, ChannelEvent::StopRequest { status: Ok(()) });
    ongoing.on_network_event(&mut net, event);

    assert_eq!(ongoing.purge_finished(), 1);
    assert_eq!(ongoing.len(), 1);
    assert!(admit(&mut ongoing, &mut net, &preload("/a.png", "image")).is_ok());
    assert_eq!(net.requests_to(url("https://example.com/a.png").as_str()), 2);
}
