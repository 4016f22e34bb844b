pub mod adaptive;
pub mod config;
pub mod country;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod salary;
pub mod traits;
pub mod transport;

#[cfg(test)]
pub mod testutil;

pub use config::{EnrichmentConfig, EnrichmentMode, ResolvedConfig, TransportSettings};
pub use country::Country;
pub use engine::{
    CompiledSearchRequest, FailurePolicy, ProviderRegistry, SearchContext, SearchEngine,
    SearchRequest, SourceRequest,
};
pub use enrichment::Enricher;
pub use error::{AppError, ExchangeError, TransportError};
pub use models::{JobPost, NormalizedJob, Site};
pub use traits::{Cleaner, Exchange, ExchangeFactory, SourceProvider};
pub use transport::{HttpRequestSpec, HttpResult, RequestKind, Transport};
