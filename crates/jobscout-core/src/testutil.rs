//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TransportSettings;
use crate::engine::{SearchContext, SourceRequest};
use crate::error::{AppError, ExchangeError};
use crate::models::{JobPost, Site};
use crate::traits::{Cleaner, Exchange, ExchangeFactory, SourceProvider};
use crate::transport::{HttpRequestSpec, HttpResult};

// ---------------------------------------------------------------------------
// MockExchange
// ---------------------------------------------------------------------------

/// Mock exchange with scripted responses.
///
/// A request whose URL has a route gets that route's response every time.
/// Otherwise the next queued response is popped; when the queue is empty
/// the fallback status is returned.
#[derive(Clone)]
pub struct MockExchange {
    queue: Arc<Mutex<VecDeque<Result<HttpResult, ExchangeError>>>>,
    routes: Arc<Mutex<HashMap<String, Result<HttpResult, ExchangeError>>>>,
    fallback_status: u16,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<HttpRequestSpec>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockExchange {
    pub fn with_responses(responses: Vec<Result<HttpResult, ExchangeError>>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(responses.into())),
            routes: Arc::new(Mutex::new(HashMap::new())),
            fallback_status: 200,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues empty-bodied responses with the given statuses.
    pub fn with_statuses(statuses: &[u16]) -> Self {
        Self::with_responses(
            statuses
                .iter()
                .map(|status| Ok(HttpResult::new(*status, "", "")))
                .collect(),
        )
    }

    /// Exchange that answers only routed URLs and 404s everything else.
    pub fn routed() -> Self {
        Self {
            fallback_status: 404,
            ..Self::with_responses(Vec::new())
        }
    }

    pub fn with_route(self, url: &str, response: Result<HttpResult, ExchangeError>) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), response);
        self
    }

    /// Routes `url` to a 200 `text/html` page.
    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_route(
            url,
            Ok(HttpResult::new(200, url, html).with_header("content-type", "text/html; charset=utf-8")),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequestSpec> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|spec| spec.url).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> Result<HttpResult, ExchangeError> {
        if let Some(routed) = self.routes.lock().unwrap().get(url) {
            return routed.clone();
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResult::new(self.fallback_status, url, "")))
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn send(
        &self,
        spec: &HttpRequestSpec,
        _timeout: Duration,
    ) -> Result<HttpResult, ExchangeError> {
        self.requests.lock().unwrap().push(spec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.next_response(&spec.url).map(|mut result| {
            if result.url.is_empty() {
                result.url = spec.url.clone();
            }
            result
        })
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockExchangeFactory
// ---------------------------------------------------------------------------

/// Factory that hands out the same MockExchange for every search.
#[derive(Clone)]
pub struct MockExchangeFactory {
    exchange: MockExchange,
    create_error: Arc<Mutex<Option<AppError>>>,
}

impl MockExchangeFactory {
    pub fn new(exchange: MockExchange) -> Self {
        Self {
            exchange,
            create_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_create_error(error: AppError) -> Self {
        Self {
            exchange: MockExchange::with_responses(Vec::new()),
            create_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ExchangeFactory for MockExchangeFactory {
    fn create(&self, _settings: &TransportSettings) -> Result<Arc<dyn Exchange>, AppError> {
        if let Some(e) = self.create_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(Arc::new(self.exchange.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

/// Mock provider that returns a fixed batch or a one-shot error.
#[derive(Clone)]
pub struct MockProvider {
    site: Site,
    jobs: Vec<JobPost>,
    error: Arc<Mutex<Option<AppError>>>,
    /// Issued through the shared transport before answering.
    fetch_url: Option<String>,
    delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<SourceRequest>>>,
}

impl MockProvider {
    pub fn new(site: Site, jobs: Vec<JobPost>) -> Self {
        Self {
            site,
            jobs,
            error: Arc::new(Mutex::new(None)),
            fetch_url: None,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(site: Site, error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
            ..Self::new(site, Vec::new())
        }
    }

    pub fn fetching(mut self, url: &str) -> Self {
        self.fetch_url = Some(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceProvider for MockProvider {
    fn site(&self) -> Site {
        self.site
    }

    async fn search(
        &self,
        request: &SourceRequest,
        ctx: &SearchContext<'_>,
    ) -> Result<Vec<JobPost>, AppError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(url) = &self.fetch_url {
            ctx.transport
                .request(HttpRequestSpec::get(url.clone()).source(self.site))
                .await?;
        }

        let error = self.error.lock().unwrap().take();
        match error {
            Some(e) => Err(e),
            None => Ok(self.jobs.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that strips tags with a naive scan.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    pub fn new() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner whose first call returns an error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Default for MockCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        let mut text = String::with_capacity(html.len());
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => {
                    in_tag = false;
                    text.push(' ');
                }
                _ if !in_tag => text.push(ch),
                _ => {}
            }
        }
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}
