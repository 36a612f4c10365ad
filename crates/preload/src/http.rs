//! HTTP channels for preloads, backed by reqwest on the tokio runtime.
//!
//! Each opened channel runs as an abortable tokio task. Tasks never touch preloader
//! state; they only send [`NetworkEvent`]s into an unbounded channel that the
//! navigation drains on its own thread. Redirects are not followed by reqwest: every
//! hop is offered to the listener and only taken once the listener has verified it.
//! A resource already in the cache only reports its start and waits to be aborted.
//!
//! Use one `HttpChannelService` per navigation. The [`PreloadCache`] it fills can be
//! shared between navigations with [`HttpChannelService::with_cache`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use futures::future::{AbortHandle, Abortable};
use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};
use reqwest::header::{CACHE_CONTROL, LOCATION};
use reqwest::redirect::Policy;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use url::Url;

use crate::channel::{ChannelEvent, ChannelId, ChannelService, ListenerId, NetworkEvent, RedirectKind, RedirectVerifier};
use crate::error::{CancelReason, PreloadError};
use crate::request::ChannelRequest;
use crate::{EarlyHintsConfig, PrivacyLevel};

const MAX_REDIRECTS: usize = 20;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A response left behind by a preload
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl CachedResponse {
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Responses fetched by preloads, partitioned by cookie jar partition key
#[derive(Debug)]
pub struct PreloadCache {
    entries: RwLock<HashMap<(String, String), CachedResponse>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl PreloadCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_ttl(max_entries, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            default_ttl,
        }
    }

    /// Fresh entry for `url` in `partition`
    pub fn lookup(&self, partition: &str, url: &Url) -> Option<CachedResponse> {
        let entries = self.entries.read();
        entries
            .get(&(partition.to_string(), url.as_str().to_string()))
            .filter(|entry| entry.is_fresh())
            .cloned()
    }

    pub fn contains(&self, partition: &str, url: &Url) -> bool {
        self.lookup(partition, url).is_some()
    }

    /// Store a response unless its Cache-Control forbids it. Returns whether it was stored.
    pub fn store(
        &self,
        partition: &str,
        url: &Url,
        status: u16,
        headers: HashMap<String, String>,
        body: Bytes,
    ) -> bool {
        if !(200..300).contains(&status) || self.max_entries == 0 {
            return false;
        }

        let cache_control = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CACHE_CONTROL.as_str()))
            .map(|(_, value)| value.as_str());
        let Some(ttl) = cache_ttl(cache_control, self.default_ttl) else {
            trace!("not caching {}: {:?}", url, cache_control);
            return false;
        };

        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.insert(
            (partition.to_string(), url.as_str().to_string()),
            CachedResponse {
                status,
                headers,
                body,
                stored_at: now,
                expires_at: now + ttl,
            },
        );

        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    debug!("Evicted preload cache entry: {}", key.1);
                }
                None => break,
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Lifetime of a response given its Cache-Control header; `None` means do not store
fn cache_ttl(cache_control: Option<&str>, default_ttl: Duration) -> Option<Duration> {
    let Some(cache_control) = cache_control.map(str::to_ascii_lowercase) else {
        return Some(default_ttl);
    };

    let mut ttl = default_ttl;
    for directive in cache_control.split(',').map(str::trim) {
        if directive == "no-store" || directive == "no-cache" {
            return None;
        }
        if let Some(seconds) = directive.strip_prefix("max-age=") {
            match seconds.trim_matches('"').parse::<u64>() {
                Ok(0) => return None,
                Ok(seconds) => ttl = Duration::from_secs(seconds),
                Err(_) => {}
            }
        }
    }
    Some(ttl)
}

struct ChannelEntry {
    request: ChannelRequest,
    /// Id of the first channel of the redirect chain; all hops share one task
    task: u64,
    abort: AbortHandle,
    from_cache: bool,
    finished: bool,
}

type ChannelTable = Arc<Mutex<HashMap<ChannelId, ChannelEntry>>>;

/// State shared between the service and its channel tasks
#[derive(Clone)]
struct ChannelContext {
    client: reqwest::Client,
    channels: ChannelTable,
    next_channel: Arc<AtomicU64>,
    cache: Arc<PreloadCache>,
    events: mpsc::UnboundedSender<NetworkEvent>,
    privacy_level: PrivacyLevel,
    /// How long a cache hit waits for its listener to cancel it
    cache_hold: Duration,
}

impl ChannelContext {
    fn allocate_id(&self) -> ChannelId {
        ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn request(&self, channel: ChannelId) -> Option<ChannelRequest> {
        let channels = self.channels.lock();
        channels
            .get(&channel)
            .filter(|entry| !entry.finished)
            .map(|entry| entry.request.clone())
    }

    /// Send an event unless the channel has finished or was cancelled. The table lock is
    /// held while sending so a concurrent cancel cannot slip in between.
    fn emit(&self, listener: ListenerId, channel: ChannelId, event: ChannelEvent) -> bool {
        let channels = self.channels.lock();
        match channels.get(&channel) {
            Some(entry) if !entry.finished => self.events.send(NetworkEvent::new(listener, channel, event)).is_ok(),
            _ => false,
        }
    }

    fn finish(&self, listener: ListenerId, channel: ChannelId, status: Result<(), PreloadError>) {
        let mut channels = self.channels.lock();
        if let Some(entry) = channels.get_mut(&channel) {
            if !entry.finished {
                entry.finished = true;
                let _ = self.events.send(NetworkEvent::new(
                    listener,
                    channel,
                    ChannelEvent::StopRequest { status },
                ));
            }
        }
    }

    /// Retire a channel without notifying its listener
    fn retire(&self, channel: ChannelId) {
        if let Some(entry) = self.channels.lock().get_mut(&channel) {
            entry.finished = true;
        }
    }

    fn mark_from_cache(&self, channel: ChannelId) {
        if let Some(entry) = self.channels.lock().get_mut(&channel) {
            entry.from_cache = true;
        }
    }

    fn register_redirect(&self, request: ChannelRequest, task: u64, abort: AbortHandle) -> ChannelId {
        let id = self.allocate_id();
        self.channels.lock().insert(
            id,
            ChannelEntry {
                request,
                task,
                abort,
                from_cache: false,
                finished: false,
            },
        );
        id
    }
}

/// Channel service performing real HTTP requests
pub struct HttpChannelService {
    context: ChannelContext,
    runtime: Handle,
    enforce_https: bool,
}

impl HttpChannelService {
    /// Create a service with its own cache. Must be called from within a tokio runtime.
    /// Events for every channel arrive on the returned receiver.
    pub fn new(config: &EarlyHintsConfig) -> Result<(Self, mpsc::UnboundedReceiver<NetworkEvent>), PreloadError> {
        Self::with_cache(config, Arc::new(PreloadCache::new(config.max_cache_entries)))
    }

    pub fn with_cache(
        config: &EarlyHintsConfig,
        cache: Arc<PreloadCache>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NetworkEvent>), PreloadError> {
        let runtime = Handle::try_current().map_err(|e| PreloadError::RuntimeUnavailable(e.to_string()))?;

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(config.request_timeout)
            .build()?;

        let (events, receiver) = mpsc::unbounded_channel();
        let context = ChannelContext {
            client,
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_channel: Arc::new(AtomicU64::new(0)),
            cache,
            events,
            privacy_level: config.privacy_level,
            cache_hold: config.request_timeout,
        };

        Ok((
            Self {
                context,
                runtime,
                enforce_https: config.enforce_https,
            },
            receiver,
        ))
    }

    pub fn cache(&self) -> Arc<PreloadCache> {
        Arc::clone(&self.context.cache)
    }

    /// Channels that have not finished yet
    pub fn live_channels(&self) -> usize {
        self.context
            .channels
            .lock()
            .values()
            .filter(|entry| !entry.finished)
            .count()
    }
}

/// Dropping the service ends its navigation: running channel tasks are aborted
/// without further events and the channel table is emptied.
impl Drop for HttpChannelService {
    fn drop(&mut self) {
        let mut channels = self.context.channels.lock();
        let live = channels.values().filter(|entry| !entry.finished).count();
        for entry in channels.values() {
            entry.abort.abort();
        }
        channels.clear();
        if live > 0 {
            debug!("aborted {} preload channels on drop", live);
        }
    }
}

impl ChannelService for HttpChannelService {
    fn async_open(&mut self, request: ChannelRequest) -> Result<ChannelId, PreloadError> {
        if self.enforce_https && request.url().scheme() != "https" {
            return Err(PreloadError::HttpsEnforcementError(format!(
                "Non-HTTPS URL: {}. HTTPS is required for privacy and security.",
                request.url()
            )));
        }

        let channel = self.context.allocate_id();
        let listener = request.listener();
        let (abort, registration) = AbortHandle::new_pair();
        self.context.channels.lock().insert(
            channel,
            ChannelEntry {
                request,
                task: channel.0,
                abort: abort.clone(),
                from_cache: false,
                finished: false,
            },
        );

        let task = run_channel(self.context.clone(), listener, channel, abort);
        self.runtime.spawn(Abortable::new(task, registration));
        Ok(channel)
    }

    fn is_from_cache(&self, channel: ChannelId) -> bool {
        self.context
            .channels
            .lock()
            .get(&channel)
            .map_or(false, |entry| entry.from_cache)
    }

    fn channel_uri(&self, channel: ChannelId) -> Option<Url> {
        self.context
            .channels
            .lock()
            .get(&channel)
            .map(|entry| entry.request.url().clone())
    }

    fn set_request_header(&mut self, channel: ChannelId, name: &str, value: &str) -> Result<(), PreloadError> {
        match self.context.channels.lock().get_mut(&channel) {
            Some(entry) if !entry.finished => {
                entry.request.set_request_header(name, value);
                Ok(())
            }
            _ => Err(PreloadError::UnknownChannel(channel.0)),
        }
    }

    fn cancel(&mut self, channel: ChannelId, reason: CancelReason) {
        let mut channels = self.context.channels.lock();
        let Some(entry) = channels.get(&channel) else {
            return;
        };
        if entry.finished {
            return;
        }

        let task = entry.task;
        let listener = entry.request.listener();
        entry.abort.abort();
        for entry in channels.values_mut().filter(|entry| entry.task == task) {
            entry.finished = true;
        }

        debug!("cancelled {} ({})", channel, reason);
        let _ = self.context.events.send(NetworkEvent::new(
            listener,
            channel,
            ChannelEvent::StopRequest {
                status: Err(PreloadError::Cancelled(reason)),
            },
        ));
    }
}

async fn run_channel(ctx: ChannelContext, listener: ListenerId, first_channel: ChannelId, abort: AbortHandle) {
    let mut channel = first_channel;
    let mut redirects = 0;

    loop {
        let Some(request) = ctx.request(channel) else {
            return;
        };
        let url = request.url().clone();
        let partition = request.cookie_jar_settings().partition_key().to_string();

        // A cached resource has nothing left to warm. Report the start and hold the
        // channel so the listener can abort it; the body is never sent.
        if ctx.cache.contains(&partition, &url) {
            ctx.mark_from_cache(channel);
            ctx.emit(listener, channel, ChannelEvent::StartRequest);
            tokio::time::sleep(ctx.cache_hold).await;
            trace!("{} served from cache without being cancelled", url);
            ctx.finish(listener, channel, Ok(()));
            return;
        }

        let mut builder = ctx.client.get(url.clone());
        for (name, value) in request.prepared_headers(ctx.privacy_level) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("preload request for {} failed: {}", url, e);
                ctx.finish(listener, channel, Err(PreloadError::HttpError(e)));
                return;
            }
        };

        let status = response.status().as_u16();
        if let Some(target) = redirect_target(&url, &response) {
            if redirects >= MAX_REDIRECTS {
                ctx.finish(listener, channel, Err(PreloadError::TooManyRedirects(redirects)));
                return;
            }

            let next = match request.redirected(&target) {
                Ok(next) => next,
                Err(e) => {
                    ctx.finish(listener, channel, Err(e));
                    return;
                }
            };

            let new_channel = ctx.register_redirect(next, first_channel.0, abort.clone());
            let (verifier, verdict) = RedirectVerifier::new();
            ctx.emit(
                listener,
                channel,
                ChannelEvent::Redirect {
                    new_channel,
                    kind: RedirectKind::from_status(status),
                    verifier,
                },
            );

            // A dropped verifier counts as a veto
            let proceeding = matches!(verdict.await, Ok(Ok(())));
            ctx.emit(listener, channel, ChannelEvent::RedirectResult { proceeding });

            if !proceeding {
                ctx.retire(new_channel);
                ctx.finish(listener, channel, Err(PreloadError::Cancelled(CancelReason::Aborted)));
                return;
            }

            trace!("following redirect {} -> {}", url, target);
            ctx.retire(channel);
            channel = new_channel;
            redirects += 1;
            continue;
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        ctx.emit(listener, channel, ChannelEvent::StartRequest);

        let mut body = BytesMut::new();
        let mut offset = 0u64;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    let len = chunk.len() as u64;
                    ctx.emit(listener, channel, ChannelEvent::DataAvailable { offset, data: chunk });
                    offset += len;
                }
                Ok(None) => break,
                Err(e) => {
                    ctx.finish(listener, channel, Err(PreloadError::HttpError(e)));
                    return;
                }
            }
        }

        if ctx.cache.store(&partition, &url, status, headers, body.freeze()) {
            trace!("cached preload of {} ({} bytes)", url, offset);
        }
        ctx.finish(listener, channel, Ok(()));
        break;
    }
}

/// Target of a 3xx response with a usable Location header
fn redirect_target(url: &Url, response: &reqwest::Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    url.join(location).ok()
}
