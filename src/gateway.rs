//! Upstream access: fetching the ranked list and user collections.
//!
//! `BggService` owns the request policy (reference caching, queued-export
//! retries, error classification). The raw HTTP exchange sits behind the
//! [`Transport`] trait so the policy runs the same against the browser
//! `fetch` API and against scripted responses in tests.

use crate::cache::{Clock, ReferenceCache, SystemClock};
use crate::config::{GatewayConfig, TOP100_CACHE_KEY, TOP_N};
use crate::parse::{parse_collection_xml, parse_top100_html, CollectionDocument, ParseError};
use crate::utils::encode_query_value;
use crate::ReferenceSet;
use log::{debug, info, warn};
use std::fmt;
use std::rc::Rc;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    MissingUsername,
    Network(String),
    Timeout {
        url: String,
        timeout_ms: u32,
    },
    HttpStatus {
        url: String,
        status: u16,
    },
    UserNotFound {
        username: String,
        message: String,
    },
    PrivateCollection {
        username: String,
    },
    Api {
        username: String,
        message: String,
    },
    /// The export was still queued after every retry.
    StillQueued {
        username: String,
        attempts: usize,
    },
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::MissingUsername => write!(f, "Username is required"),
            FetchError::Network(msg) => write!(f, "Network error: {}", msg),
            FetchError::Timeout { url, timeout_ms } => {
                write!(f, "Request to {} timed out after {} ms", url, timeout_ms)
            }
            FetchError::HttpStatus { url, status } => {
                write!(f, "Upstream returned HTTP {} for {}", status, url)
            }
            FetchError::UserNotFound { username, message } => {
                write!(f, "User '{}' not found: {}", username, message)
            }
            FetchError::PrivateCollection { username } => {
                write!(f, "Collection of user '{}' is private", username)
            }
            FetchError::Api { username, message } => {
                write!(f, "BGG API error for user '{}': {}", username, message)
            }
            FetchError::StillQueued { username, attempts } => write!(
                f,
                "Collection for '{}' is still being prepared after {} attempts",
                username, attempts
            ),
            FetchError::Malformed(msg) => write!(f, "Malformed upstream response: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<ParseError> for FetchError {
    fn from(e: ParseError) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

/// Map an upstream error message onto the matching error variant.
fn classify_api_error(username: &str, message: String) -> FetchError {
    let lower = message.to_lowercase();
    if lower.contains("invalid username") || lower.contains("not found") {
        FetchError::UserNotFound {
            username: username.to_string(),
            message,
        }
    } else if lower.contains("private") {
        FetchError::PrivateCollection {
            username: username.to_string(),
        }
    } else {
        FetchError::Api {
            username: username.to_string(),
            message,
        }
    }
}

/// Minimal HTTP client surface used by the gateway.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: &str, timeout_ms: u32) -> Result<HttpResponse, FetchError>;

    /// Wait before retrying a queued request.
    async fn pause(&self, ms: u32);
}

/// `Transport` backed by `window.fetch`, aborting requests that exceed their timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserTransport;

fn js_error(value: wasm_bindgen::JsValue) -> FetchError {
    FetchError::Network(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

impl Transport for BrowserTransport {
    async fn get(&self, url: &str, timeout_ms: u32) -> Result<HttpResponse, FetchError> {
        use gloo_timers::callback::Timeout;
        use std::cell::Cell;
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;
        use web_sys::{AbortController, Request, RequestInit, RequestMode, Response};

        let controller = AbortController::new().map_err(js_error)?;
        let init = RequestInit::new();
        init.set_method("GET");
        init.set_mode(RequestMode::Cors);
        init.set_signal(Some(&controller.signal()));
        let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;

        let timed_out = Rc::new(Cell::new(false));
        // Dropping the timer cancels it, so it must live until the body is read.
        let _timer = {
            let controller = controller.clone();
            let timed_out = Rc::clone(&timed_out);
            Timeout::new(timeout_ms, move || {
                timed_out.set(true);
                controller.abort();
            })
        };
        let on_error = |value| {
            if timed_out.get() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_ms,
                }
            } else {
                js_error(value)
            }
        };

        let value = JsFuture::from(gloo_utils::window().fetch_with_request(&request))
            .await
            .map_err(on_error)?;
        let response: Response = value.dyn_into().map_err(js_error)?;
        let status = response.status();
        let text = JsFuture::from(response.text().map_err(js_error)?)
            .await
            .map_err(on_error)?;

        Ok(HttpResponse {
            status,
            body: text.as_string().unwrap_or_default(),
        })
    }

    async fn pause(&self, ms: u32) {
        gloo_timers::future::TimeoutFuture::new(ms).await;
    }
}

/// Fetches ranked games and collections, caching the ranked list.
pub struct BggService<T, C = SystemClock> {
    transport: T,
    cache: Rc<ReferenceCache<C>>,
    config: GatewayConfig,
}

impl<T: Transport, C: Clock> BggService<T, C> {
    pub fn new(transport: T, cache: Rc<ReferenceCache<C>>, config: GatewayConfig) -> Self {
        Self {
            transport,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Rc<ReferenceCache<C>> {
        &self.cache
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The ranked reference list, served from cache while it is fresh.
    pub async fn fetch_top100(&self) -> Result<Rc<ReferenceSet>, FetchError> {
        if let Some(cached) = self.cache.get(TOP100_CACHE_KEY) {
            debug!("Serving {} ranked games from cache", cached.len());
            return Ok(cached);
        }

        let url = &self.config.top100_url;
        let response = self.transport.get(url, self.config.timeout_ms).await?;
        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.clone(),
                status: response.status,
            });
        }

        let reference = Rc::new(ReferenceSet::new(parse_top100_html(&response.body, TOP_N)));
        if reference.is_empty() {
            warn!("Ranked page yielded no games; caching the empty list anyway");
        }
        info!("Fetched {} ranked games", reference.len());

        self.cache.set_shared(
            TOP100_CACHE_KEY,
            Rc::clone(&reference),
            self.config.top100_ttl_ms as i64,
        );
        Ok(reference)
    }

    /// Ids of the games `username` owns, deduplicated in upstream order.
    ///
    /// An empty list means the collection is empty or not visible; lookups
    /// the upstream rejects come back as errors.
    pub async fn fetch_user_collection(&self, username: &str) -> Result<Vec<String>, FetchError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(FetchError::MissingUsername);
        }

        let url = format!(
            "{}?username={}&own=1",
            self.config.collection_url,
            encode_query_value(username)
        );
        let attempts = self.config.retry_attempts.max(1);

        for attempt in 1..=attempts {
            let response = self.transport.get(&url, self.config.timeout_ms).await?;

            let queued_message = if response.status == 202 {
                Some("request accepted".to_string())
            } else {
                match parse_collection_xml(&response.body) {
                    Ok(CollectionDocument::ApiError(message)) => {
                        return Err(classify_api_error(username, message));
                    }
                    _ if !response.is_success() => {
                        return Err(FetchError::HttpStatus {
                            url,
                            status: response.status,
                        });
                    }
                    Ok(CollectionDocument::Queued(message)) => Some(message),
                    Ok(CollectionDocument::NoItemsRoot) => {
                        info!("User {} has empty collection or collection is private", username);
                        return Ok(Vec::new());
                    }
                    Ok(CollectionDocument::Items(ids)) => {
                        if ids.is_empty() {
                            info!("User {} collection exists but has no games", username);
                        } else {
                            info!("User {} owns {} games", username, ids.len());
                        }
                        return Ok(ids);
                    }
                    Err(e) => {
                        warn!("Failed to parse collection response for '{}': {}", username, e);
                        return Err(e.into());
                    }
                }
            };

            if let Some(message) = queued_message {
                debug!(
                    "Collection for '{}' queued ({}), attempt {}/{}",
                    username, message, attempt, attempts
                );
                if attempt < attempts {
                    self.transport.pause(self.config.retry_delay_ms).await;
                }
            }
        }

        Err(FetchError::StillQueued {
            username: username.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::TOP100_TTL_MS;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        responses: RefCell<VecDeque<Result<HttpResponse, FetchError>>>,
        urls: RefCell<Vec<String>>,
        pauses: RefCell<Vec<u32>>,
    }

    impl Scripted {
        fn with(responses: Vec<Result<HttpResponse, FetchError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                ..Default::default()
            }
        }
    }

    impl Transport for &Scripted {
        async fn get(&self, url: &str, _timeout_ms: u32) -> Result<HttpResponse, FetchError> {
            self.urls.borrow_mut().push(url.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
        }

        async fn pause(&self, ms: u32) {
            self.pauses.borrow_mut().push(ms);
        }
    }

    const PAGE: &str = r#"<a class="primary" href="/boardgame/1/a">Alpha</a>
                          <a class="primary" href="/boardgame/2/b">Beta</a>"#;

    fn service(script: &Scripted) -> (BggService<&Scripted, ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(10_000);
        let cache = Rc::new(ReferenceCache::with_clock(clock.clone()));
        (BggService::new(script, cache, GatewayConfig::default()), clock)
    }

    #[test]
    fn top100_is_cached_until_ttl() {
        let script = Scripted::with(vec![Ok(HttpResponse::ok(PAGE)), Ok(HttpResponse::ok(PAGE))]);
        let (service, clock) = service(&script);

        let first = block_on(service.fetch_top100()).unwrap();
        assert_eq!(first.len(), 2);
        clock.advance(TOP100_TTL_MS - 1);
        let second = block_on(service.fetch_top100()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(script.urls.borrow().len(), 1);

        clock.advance(1);
        block_on(service.fetch_top100()).unwrap();
        assert_eq!(script.urls.borrow().len(), 2);
    }

    #[test]
    fn top100_http_failure_is_not_cached() {
        let script = Scripted::with(vec![Ok(HttpResponse {
            status: 503,
            body: String::new(),
        })]);
        let (service, _) = service(&script);
        let err = block_on(service.fetch_top100()).unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn collection_url_is_encoded() {
        let script = Scripted::with(vec![Ok(HttpResponse::ok("<items></items>"))]);
        let (service, _) = service(&script);
        assert_eq!(block_on(service.fetch_user_collection(" a b ")).unwrap(), Vec::<String>::new());
        assert_eq!(
            script.urls.borrow()[0],
            "https://boardgamegeek.com/xmlapi2/collection?username=a%20b&own=1"
        );
    }

    #[test]
    fn queued_export_is_retried() {
        let script = Scripted::with(vec![
            Ok(HttpResponse {
                status: 202,
                body: "<message>Please try again later</message>".into(),
            }),
            Ok(HttpResponse::ok("<message>Please try again later</message>")),
            Ok(HttpResponse::ok(r#"<items><item objectid="9"/></items>"#)),
        ]);
        let (service, _) = service(&script);
        assert_eq!(block_on(service.fetch_user_collection("alice")).unwrap(), vec!["9"]);
        assert_eq!(script.pauses.borrow().len(), 2);
    }

    #[test]
    fn queued_export_gives_up() {
        let queued = || {
            Ok(HttpResponse {
                status: 202,
                body: String::new(),
            })
        };
        let script = Scripted::with((0..5).map(|_| queued()).collect());
        let (service, _) = service(&script);
        let err = block_on(service.fetch_user_collection("alice")).unwrap_err();
        assert_eq!(
            err,
            FetchError::StillQueued {
                username: "alice".into(),
                attempts: 5
            }
        );
        assert_eq!(script.pauses.borrow().len(), 4);
    }

    #[test]
    fn api_errors_are_classified() {
        let script = Scripted::with(vec![
            Ok(HttpResponse::ok(
                "<errors><error><message>Invalid username specified</message></error></errors>",
            )),
            Ok(HttpResponse::ok("<errors><error><message>Collection is private</message></error></errors>")),
            Ok(HttpResponse::ok("<errors><error><message>Rate limited</message></error></errors>")),
        ]);
        let (service, _) = service(&script);
        assert!(matches!(
            block_on(service.fetch_user_collection("ghost")),
            Err(FetchError::UserNotFound { .. })
        ));
        assert!(matches!(
            block_on(service.fetch_user_collection("shy")),
            Err(FetchError::PrivateCollection { .. })
        ));
        assert!(matches!(
            block_on(service.fetch_user_collection("busy")),
            Err(FetchError::Api { .. })
        ));
    }

    #[test]
    fn missing_items_root_is_empty_collection() {
        let script = Scripted::with(vec![Ok(HttpResponse::ok("<?xml version=\"1.0\"?><nothing/>"))]);
        let (service, _) = service(&script);
        assert!(block_on(service.fetch_user_collection("quiet")).unwrap().is_empty());
    }

    #[test]
    fn blank_username_is_rejected_without_request() {
        let script = Scripted::default();
        let (service, _) = service(&script);
        assert_eq!(
            block_on(service.fetch_user_collection("   ")),
            Err(FetchError::MissingUsername)
        );
        assert!(script.urls.borrow().is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        let script = Scripted::with(vec![Ok(HttpResponse::ok(""))]);
        let (service, _) = service(&script);
        assert!(matches!(
            block_on(service.fetch_user_collection("alice")),
            Err(FetchError::Malformed(_))
        ));
    }
}
