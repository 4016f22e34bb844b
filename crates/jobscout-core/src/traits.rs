use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TransportSettings;
use crate::engine::{SearchContext, SourceRequest};
use crate::error::{AppError, ExchangeError};
use crate::models::{JobPost, Site};
use crate::transport::{HttpRequestSpec, HttpResult};

/// Performs one HTTP exchange. No retries, no limiting.
///
/// Implementations own the connection resources (pools, proxy tunnels) and
/// release them in `close`.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn send(&self, spec: &HttpRequestSpec, timeout: Duration)
    -> Result<HttpResult, ExchangeError>;

    /// Releases every pooled connection. Called once per transport.
    async fn close(&self);
}

/// Builds the connection layer for one search from its transport settings.
pub trait ExchangeFactory: Send + Sync {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn Exchange>, AppError>;
}

/// Turns one source request into raw job postings.
///
/// A provider signals failure by returning `Err`; the engine tags it with
/// the provider's site. The transport in `ctx` must not be retained past
/// the call.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn site(&self) -> Site;

    async fn search(
        &self,
        request: &SourceRequest,
        ctx: &SearchContext<'_>,
    ) -> Result<Vec<JobPost>, AppError>;
}

/// Converts raw HTML into text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}
