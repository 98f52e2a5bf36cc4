//! HTTP access to the job search endpoint, with retry and failure classification.
//!
//! # Architecture
//!
//! - [`FetchOnce`]: one request, one classified outcome
//! - [`HttpFetcher`]: the `reqwest` implementation of [`FetchOnce`]
//! - [`RetryFetch`]: decorator that retries transient failures of any [`FetchOnce`]
//! - [`PageSource`]: what the pager consumes; implemented by [`RetryFetch`]
//!
//! # Classification
//!
//! | Outcome | Result |
//! |---------|--------|
//! | HTTP 429 | [`ScrapeError::RateLimited`], not retried |
//! | HTTP 403 | [`ScrapeError::AccessBlocked`], not retried |
//! | TLS / certificate failure | [`ScrapeError::SecureChannelFailure`], not retried |
//! | Connection error and every probe host unreachable | [`ScrapeError::NoConnectivity`], not retried |
//! | Timeout, other connection error, other HTTP status | [`ScrapeError::Transient`], retried |
//!
//! When transient failures exhaust the attempt budget the page source returns
//! `Ok(None)`: no page is available, but the run may continue.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::SearchQuery;
use crate::observer::{Observer, ScrapeEvent};
use rand::{Rng, rng};
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, UPGRADE_INSECURE_REQUESTS,
};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::instrument;

/// Guest job search endpoint.
pub const SEARCH_ENDPOINT: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";

/// Origin used to absolutize listing links.
pub const SITE_ORIGIN: &str = "https://www.linkedin.com";

/// Public DNS resolvers used to tell "target unreachable" from "offline".
pub const PROBE_HOSTS: [&str; 3] = ["8.8.8.8:53", "1.1.1.1:53", "208.67.222.222:53"];

/// Source of raw result pages for the pager.
pub trait PageSource {
    /// Fetch the results page starting at `offset`.
    ///
    /// Returns `Ok(None)` when transient failures used up the attempt budget,
    /// and `Err` only for terminal failures.
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        offset: usize,
    ) -> Result<Option<String>, ScrapeError>;
}

/// A single, unretried request for one results page.
pub trait FetchOnce {
    async fn fetch_once(&self, query: &SearchQuery, offset: usize) -> Result<String, ScrapeError>;
}

/// Answers "is this machine online at all?".
pub trait ConnectivityProbe {
    async fn is_online(&self) -> bool;
}

/// Probes connectivity by opening TCP connections to well-known hosts.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    hosts: Vec<SocketAddr>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        TcpProbe {
            hosts: PROBE_HOSTS.iter().filter_map(|h| h.parse().ok()).collect(),
            timeout,
        }
    }
}

impl ConnectivityProbe for TcpProbe {
    #[instrument(level = "debug", skip_all)]
    async fn is_online(&self) -> bool {
        for host in &self.hosts {
            if let Ok(Ok(_)) = timeout(self.timeout, TcpStream::connect(host)).await {
                return true;
            }
        }
        false
    }
}

/// Transport settings, usually derived from [`ScraperConfig`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub retry_jitter_ms: u64,
}

impl From<&ScraperConfig> for TransportSettings {
    fn from(config: &ScraperConfig) -> Self {
        TransportSettings {
            endpoint: SEARCH_ENDPOINT.to_string(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_attempts: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            retry_jitter_ms: config.retry_jitter_ms,
        }
    }
}

/// Build the request URL for one results page.
pub fn search_url(endpoint: &str, query: &SearchQuery, offset: usize) -> String {
    let mut url = format!(
        "{endpoint}?keywords={}&location={}&start={offset}",
        urlencoding::encode(query.keywords()),
        urlencoding::encode(query.location()),
    );
    if let Some(level) = query.experience() {
        url.push_str("&f_E=");
        url.push_str(level.code());
    }
    url
}

/// Issues one GET per call with browser-like headers.
#[derive(Debug)]
pub struct HttpFetcher<P> {
    client: reqwest::Client,
    endpoint: String,
    probe: P,
}

impl<P: ConnectivityProbe> HttpFetcher<P> {
    pub fn new(settings: &TransportSettings, probe: P) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(HttpFetcher {
            client,
            endpoint: settings.endpoint.clone(),
            probe,
        })
    }

    async fn classify_send_error(&self, e: reqwest::Error) -> ScrapeError {
        if e.is_timeout() {
            return ScrapeError::Transient(format!("request timed out: {e}"));
        }
        if looks_like_tls_failure(&e) {
            return ScrapeError::SecureChannelFailure(error_chain(&e));
        }
        if e.is_connect() {
            if !self.probe.is_online().await {
                return ScrapeError::NoConnectivity;
            }
            return ScrapeError::Transient(format!("connection error: {}", error_chain(&e)));
        }
        ScrapeError::Transient(format!("request failed: {}", error_chain(&e)))
    }
}

impl<P: ConnectivityProbe> FetchOnce for HttpFetcher<P> {
    #[instrument(level = "debug", skip_all, fields(offset = offset))]
    async fn fetch_once(&self, query: &SearchQuery, offset: usize) -> Result<String, ScrapeError> {
        let url = search_url(&self.endpoint, query, offset);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return Err(self.classify_send_error(e).await),
        };

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(ScrapeError::RateLimited),
            StatusCode::FORBIDDEN => Err(ScrapeError::AccessBlocked),
            s if s.is_success() => response
                .text()
                .await
                .map_err(|e| ScrapeError::Transient(format!("failed reading body: {e}"))),
            s => Err(ScrapeError::Transient(format!("HTTP status {s}"))),
        }
    }
}

/// Retries transient failures of the wrapped fetcher with a fixed delay.
///
/// The delay between attempts is `retry_delay` plus up to `retry_jitter_ms`
/// of random jitter.
pub struct RetryFetch<T> {
    inner: T,
    max_attempts: u32,
    retry_delay: Duration,
    retry_jitter_ms: u64,
    observer: Arc<dyn Observer>,
}

impl<T: FetchOnce> RetryFetch<T> {
    pub fn new(inner: T, settings: &TransportSettings, observer: Arc<dyn Observer>) -> Self {
        RetryFetch {
            inner,
            max_attempts: settings.max_attempts.max(1),
            retry_delay: settings.retry_delay,
            retry_jitter_ms: settings.retry_jitter_ms,
            observer,
        }
    }

    fn backoff(&self) -> Duration {
        if self.retry_jitter_ms == 0 {
            return self.retry_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=self.retry_jitter_ms);
        self.retry_delay + Duration::from_millis(jitter_ms)
    }
}

impl<T: FetchOnce> PageSource for RetryFetch<T> {
    #[instrument(level = "info", skip_all, fields(offset = offset))]
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        offset: usize,
    ) -> Result<Option<String>, ScrapeError> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.inner.fetch_once(query, offset).await {
                Ok(body) => return Ok(Some(body)),
                Err(error) if error.is_terminal() => {
                    self.observer.on_event(&ScrapeEvent::PageFailed {
                        offset,
                        error: error.clone(),
                    });
                    return Err(error);
                }
                Err(error) => {
                    self.observer.on_event(&ScrapeEvent::AttemptFailed {
                        offset,
                        attempt,
                        max: self.max_attempts,
                        error: error.clone(),
                    });
                    last_error = Some(error);
                    if attempt < self.max_attempts {
                        sleep(self.backoff()).await;
                    }
                }
            }
        }

        if let Some(error) = last_error {
            self.observer.on_event(&ScrapeEvent::PageFailed { offset, error });
        }
        Ok(None)
    }
}

/// Build the production page source from settings.
pub fn http_page_source(
    settings: &TransportSettings,
    probe_timeout: Duration,
    observer: Arc<dyn Observer>,
) -> Result<RetryFetch<HttpFetcher<TcpProbe>>, reqwest::Error> {
    let fetcher = HttpFetcher::new(settings, TcpProbe::new(probe_timeout))?;
    Ok(RetryFetch::new(fetcher, settings, observer))
}

fn error_chain(e: &dyn Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

/// Only the causes are inspected; the top-level message embeds the request URL.
fn looks_like_tls_failure(e: &reqwest::Error) -> bool {
    let Some(cause) = e.source() else {
        return false;
    };
    let chain = error_chain(cause).to_lowercase();
    [
        "certificate",
        "handshake",
        "ssl routines",
        "wrong version number",
        "corrupt message",
    ]
        .iter()
        .any(|marker| chain.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedProbe(bool);

    impl ConnectivityProbe for FixedProbe {
        async fn is_online(&self) -> bool {
            self.0
        }
    }

    fn settings(endpoint: String) -> TransportSettings {
        TransportSettings {
            endpoint,
            user_agent: "test-agent".into(),
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            retry_jitter_ms: 0,
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("rust developer", "Berlin", Some("entry"), 10, 500).unwrap()
    }

    fn build_source(
        settings: &TransportSettings,
        online: bool,
    ) -> (
        RetryFetch<HttpFetcher<FixedProbe>>,
        mpsc::UnboundedReceiver<ScrapeEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = HttpFetcher::new(settings, FixedProbe(online)).unwrap();
        let observer: Arc<dyn Observer> = Arc::new(ChannelObserver::new(tx));
        (RetryFetch::new(fetcher, settings, observer), rx)
    }

    #[test]
    fn search_url_encodes_parameters() {
        let url = search_url("https://example.test/search", &query(), 50);
        assert_eq!(
            url,
            "https://example.test/search?keywords=rust%20developer&location=Berlin&start=50&f_E=2"
        );

        let q = SearchQuery::new("c++", "", None, 1, 1).unwrap();
        let url = search_url("https://example.test/search", &q, 0);
        assert_eq!(url, "https://example.test/search?keywords=c%2B%2B&location=&start=0");
    }

    #[tokio::test]
    async fn returns_body_and_sends_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("keywords", "rust developer"))
            .and(query_param("location", "Berlin"))
            .and(query_param("start", "25"))
            .and(query_param("f_E", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<li>job</li>"))
            .expect(1)
            .mount(&server)
            .await;

        let (source, _rx) = build_source(&settings(format!("{}/search", server.uri())), true);
        let page = source.fetch_page(&query(), 25).await.unwrap();
        assert_eq!(page.as_deref(), Some("<li>job</li>"));
    }

    #[tokio::test]
    async fn rate_limit_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let (source, mut rx) = build_source(&settings(format!("{}/search", server.uri())), true);
        let err = source.fetch_page(&query(), 0).await.unwrap_err();
        assert_eq!(err, ScrapeError::RateLimited);
        assert_eq!(
            rx.try_recv().unwrap(),
            ScrapeEvent::PageFailed {
                offset: 0,
                error: ScrapeError::RateLimited
            }
        );
    }

    #[tokio::test]
    async fn forbidden_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let (source, _rx) = build_source(&settings(format!("{}/search", server.uri())), true);
        let err = source.fetch_page(&query(), 0).await.unwrap_err();
        assert_eq!(err, ScrapeError::AccessBlocked);
    }

    #[tokio::test]
    async fn server_errors_exhaust_retries_into_no_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (source, mut rx) = build_source(&settings(format!("{}/search", server.uri())), true);
        assert_eq!(source.fetch_page(&query(), 0).await, Ok(None));

        let mut attempts = 0;
        let mut failed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                ScrapeEvent::AttemptFailed { .. } => attempts += 1,
                ScrapeEvent::PageFailed { .. } => failed += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!((attempts, failed), (3, 1));
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let (source, _rx) = build_source(&settings(format!("{}/search", server.uri())), true);
        assert_eq!(source.fetch_page(&query(), 0).await, Ok(Some("ok".to_string())));
    }

    #[tokio::test]
    async fn timeouts_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mut settings = settings(format!("{}/search", server.uri()));
        settings.timeout = Duration::from_millis(50);
        settings.max_attempts = 2;
        let fetcher = HttpFetcher::new(&settings, FixedProbe(true)).unwrap();

        let err = fetcher.fetch_once(&query(), 0).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transient(_)), "{err:?}");
    }

    #[tokio::test]
    async fn tls_failure_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let endpoint = format!("{}/search", server.uri().replace("http://", "https://"));
        let (source, mut rx) = build_source(&settings(endpoint), true);
        let err = source.fetch_page(&query(), 0).await.unwrap_err();
        assert!(matches!(err, ScrapeError::SecureChannelFailure(_)), "{err:?}");
        assert!(matches!(
            rx.try_recv().unwrap(),
            ScrapeEvent::PageFailed {
                error: ScrapeError::SecureChannelFailure(_),
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connection_failure_while_offline_is_no_connectivity() {
        let (source, _rx) = build_source(&settings("http://127.0.0.1:1/search".into()), false);
        let err = source.fetch_page(&query(), 0).await.unwrap_err();
        assert_eq!(err, ScrapeError::NoConnectivity);
    }

    #[tokio::test]
    async fn connection_failure_while_online_is_retried() {
        let (source, mut rx) = build_source(&settings("http://127.0.0.1:1/search".into()), true);
        assert_eq!(source.fetch_page(&query(), 0).await, Ok(None));

        let attempts = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, ScrapeEvent::AttemptFailed { .. }))
            .count();
        assert_eq!(attempts, 3);
    }
}
