//! Resilient HTTP transport shared by every provider of one search.
//!
//! Each logical request is bounded by the global limiter and, when tagged
//! with a site, by that site's adaptive limiter. Transient failures are
//! retried with full-jitter exponential backoff; the retry budget depends on
//! whether the request fetches a listing page or a detail page.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::adaptive::SourceConcurrencyState;
use crate::config::{RetryPolicy, TransportSettings};
use crate::error::{AppError, ExchangeError, TransportError, is_transient_status};
use crate::limiter::Limiter;
use crate::models::Site;
use crate::traits::Exchange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the retry budget of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestKind {
    List,
    Detail,
    #[default]
    Other,
}

/// One logical HTTP exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    /// Overrides the transport's default timeout for this request.
    pub timeout: Option<Duration>,
    pub source: Option<Site>,
    pub kind: RequestKind,
}

impl HttpRequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter. Empty values are skipped.
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.query.push((name.into(), value));
        }
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the body and sets a JSON content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, AppError> {
        self.body = Some(serde_json::to_string(value)?);
        if self.header_value("content-type").is_none() {
            self.headers
                .push(("content-type".into(), "application/json".into()));
        }
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn source(mut self, site: Site) -> Self {
        self.source = Some(site);
        self
    }

    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outcome of one completed exchange, whatever its status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResult {
    pub status: u16,
    pub ok: bool,
    pub text: String,
    /// Header names are lowercase.
    pub headers: Vec<(String, String)>,
    /// URL after redirects.
    pub url: String,
}

impl HttpResult {
    pub fn new(status: u16, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            status,
            ok: (200..300).contains(&status),
            text: text.into(),
            headers: Vec::new(),
            url: url.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.ok {
            Ok(self)
        } else {
            Err(TransportError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

/// Per-search HTTP transport. Created by the engine, closed exactly once.
pub struct Transport {
    exchange: Arc<dyn Exchange>,
    retry: RetryPolicy,
    timeout: Duration,
    global: Limiter,
    sources: HashMap<Site, SourceConcurrencyState>,
    adaptive: bool,
    default_headers: Vec<(String, String)>,
    closed: AtomicBool,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("global_limit", &self.global.limit())
            .field("adaptive", &self.adaptive)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Transport {
    pub fn new(settings: &TransportSettings, exchange: Arc<dyn Exchange>) -> Self {
        let sources = Site::ALL
            .into_iter()
            .map(|site| {
                (
                    site,
                    SourceConcurrencyState::new(settings.source_concurrency(site)),
                )
            })
            .collect();

        Self {
            exchange,
            retry: settings.retry.clone(),
            timeout: settings.request_timeout(),
            global: Limiter::new(settings.max_global_concurrency),
            sources,
            adaptive: settings.adaptive_concurrency,
            default_headers: settings.default_headers.clone(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn global_limit(&self) -> usize {
        self.global.limit()
    }

    /// Current adaptive limit of a site.
    pub fn source_limit(&self, site: Site) -> Option<usize> {
        self.sources.get(&site).map(SourceConcurrencyState::limit)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Performs `spec` with limiting and retries.
    ///
    /// A completed exchange is returned even when its status is an error,
    /// once retries no longer apply; use [`HttpResult::error_for_status`] to
    /// turn it into an error. Network failures surface as
    /// [`TransportError::Exhausted`].
    pub async fn request(&self, spec: HttpRequestSpec) -> Result<HttpResult, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let spec = self.merge_default_headers(spec);
        let budget = match spec.kind {
            RequestKind::List => self.retry.list_page_retries,
            RequestKind::Detail | RequestKind::Other => self.retry.detail_page_retries,
        };
        let timeout = spec.timeout.unwrap_or(self.timeout);
        let source = spec.source.and_then(|site| self.sources.get(&site));

        let mut attempt: u32 = 0;
        loop {
            let outcome = self.attempt(&spec, source, timeout).await;
            let can_retry = attempt < budget;

            match outcome {
                Ok(result) => {
                    self.observe(source, result.status);
                    if !(can_retry && is_transient_status(result.status)) {
                        return Ok(result);
                    }
                    tracing::debug!(
                        url = %spec.url,
                        status = result.status,
                        attempt,
                        "Retrying after transient status"
                    );
                }
                Err(err) => {
                    // Timeouts and resets count against the source like a 503.
                    if err.is_transient() {
                        self.observe(source, 503);
                    }
                    if !(can_retry && err.is_transient()) {
                        tracing::warn!(url = %spec.url, attempts = attempt + 1, error = %err, "Request failed");
                        return Err(TransportError::Exhausted {
                            url: spec.url,
                            attempts: attempt + 1,
                            last: err,
                        });
                    }
                    tracing::debug!(url = %spec.url, attempt, error = %err, "Retrying after network error");
                }
            }

            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Performs `spec`, requires a success status and decodes the JSON body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        spec: HttpRequestSpec,
    ) -> Result<T, AppError> {
        let result = self.request(spec).await?.error_for_status()?;
        result.json()
    }

    /// Releases the connection layer. Later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.exchange.close().await;
        tracing::debug!("Transport closed");
    }

    async fn attempt(
        &self,
        spec: &HttpRequestSpec,
        source: Option<&SourceConcurrencyState>,
        timeout: Duration,
    ) -> Result<HttpResult, ExchangeError> {
        let _global = self.global.acquire().await;
        let _source = match source {
            Some(state) => Some(state.limiter().acquire().await),
            None => None,
        };

        match tokio::time::timeout(timeout, self.exchange.send(spec, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExchangeError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn observe(&self, source: Option<&SourceConcurrencyState>, status: u16) {
        if self.adaptive
            && let Some(state) = source
        {
            state.record(status);
        }
    }

    fn merge_default_headers(&self, mut spec: HttpRequestSpec) -> HttpRequestSpec {
        let missing: Vec<_> = self
            .default_headers
            .iter()
            .filter(|(name, _)| spec.header_value(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            let explicit = std::mem::take(&mut spec.headers);
            spec.headers = missing.into_iter().chain(explicit).collect();
        }
        spec
    }
}
