use citadel_preload::{EarlyHintsConfig, EarlyHintsService, HttpChannelService, LinkHeader};
use citadel_security::{CookieBehavior, CookieJarSettings, Principal};
use std::error::Error;
use std::time::Duration;
use url::Url;

/// Usage: early_hints_demo [PAGE_URL] [HREF AS]...
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let page = Url::parse(&args.next().unwrap_or_else(|| "https://example.com/".to_string()))?;

    let rest: Vec<String> = args.collect();
    let mut hints: Vec<LinkHeader> = rest
        .chunks(2)
        .map(|pair| LinkHeader::new(&pair[0], "preload").with_as(pair.get(1).map_or("image", String::as_str)))
        .collect();
    if hints.is_empty() {
        hints = vec![
            LinkHeader::new("/favicon.ico", "preload").with_as("image"),
            LinkHeader::new("/favicon.ico", "preload").with_as("image"),
            LinkHeader::new("/app.js", "preload").with_as("script"),
            LinkHeader::new("https://cdn.example.net/logo.png", "preload").with_as("image"),
        ];
    }

    let config = EarlyHintsConfig::default();
    let (network, mut events) = HttpChannelService::new(&config)?;
    let mut service = EarlyHintsService::new(config, network);

    let principal = Principal::content(&page);
    let cookie_jar = CookieJarSettings::for_top_level(&page, CookieBehavior::default());

    println!("103 Early Hints for {} with {} link(s)", page, hints.len());
    service.early_hint(&hints, &page, &principal, &cookie_jar);
    for (key, preloader) in service.ongoing().iter() {
        println!("- preloading {} [{:?}]", key, preloader.state());
    }

    // Give the preloads a moment before the "final response" arrives
    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => service.on_network_event(event),
                None => break,
            },
        }
        if service.ongoing().active_count() == 0 {
            break;
        }
    }

    service.final_response(200);
    while let Ok(event) = events.try_recv() {
        service.on_network_event(event);
    }

    for (key, preloader) in service.ongoing().iter() {
        println!(
            "- {} finished as {:?} after {} bytes",
            key,
            preloader.state(),
            preloader.bytes_read()
        );
    }
    println!("\nStats:\n{}", serde_json::to_string_pretty(&service.stats())?);

    Ok(())
}
