//! reqwest-backed [`Exchange`]: one pooled client per origin, or one per proxy
//! when proxies are configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use jobscout_core::config::TransportSettings;
use jobscout_core::error::{AppError, ExchangeError, TransportError};
use jobscout_core::traits::{Exchange, ExchangeFactory};
use jobscout_core::transport::{HttpRequestSpec, HttpResult, Method};
use reqwest::{Certificate, Client, Proxy};
use url::Url;

/// Rotation slot: either a direct connection or a proxy URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxy(String),
}

/// Normalises one configured proxy entry.
///
/// `localhost` means a direct connection, entries without a scheme are taken
/// as HTTP proxies. Blank entries are ignored.
pub fn normalize_proxy(raw: &str) -> Option<Route> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("localhost") {
        return Some(Route::Direct);
    }
    if raw.contains("://") {
        Some(Route::Proxy(raw.to_string()))
    } else {
        Some(Route::Proxy(format!("http://{raw}")))
    }
}

/// Key of the client that serves `url` directly.
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

pub struct PooledExchange {
    routes: Vec<Route>,
    next_route: AtomicUsize,
    user_agent: Option<String>,
    ca_cert: Option<Certificate>,
    clients: Mutex<HashMap<String, Client>>,
}

impl PooledExchange {
    pub fn new(settings: &TransportSettings) -> Result<Self, AppError> {
        let ca_cert = match &settings.ca_cert_path {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    TransportError::Build(format!("failed to read CA bundle {}: {e}", path.display()))
                })?;
                Some(
                    Certificate::from_pem(&pem)
                        .map_err(|e| TransportError::Build(format!("invalid CA bundle: {e}")))?,
                )
            }
            None => None,
        };

        let routes: Vec<Route> = settings
            .proxies
            .iter()
            .filter_map(|raw| normalize_proxy(raw))
            .collect();

        // Build proxy clients eagerly so a malformed proxy fails construction.
        let exchange = Self {
            routes,
            next_route: AtomicUsize::new(0),
            user_agent: settings.user_agent.clone(),
            ca_cert,
            clients: Mutex::new(HashMap::new()),
        };
        for route in &exchange.routes {
            if let Route::Proxy(proxy) = route {
                let client = exchange
                    .build_client(Some(proxy.as_str()))
                    .map_err(|e| TransportError::Build(e.to_string()))?;
                exchange.lock_clients().insert(proxy.clone(), client);
            }
        }

        tracing::debug!(
            proxies = exchange.routes.len(),
            ca_bundle = exchange.ca_cert.is_some(),
            "Created pooled exchange"
        );
        Ok(exchange)
    }

    /// Number of clients currently pooled.
    pub fn pool_size(&self) -> usize {
        self.lock_clients().len()
    }

    /// Next rotation slot, round-robin. `Direct` when no proxies are set.
    pub fn next_route(&self) -> Route {
        if self.routes.is_empty() {
            return Route::Direct;
        }
        let index = self.next_route.fetch_add(1, Ordering::Relaxed) % self.routes.len();
        self.routes[index].clone()
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, Client>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build_client(&self, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder();
        builder = match proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy)?),
            None => builder.no_proxy(),
        };
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(cert) = &self.ca_cert {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder.build()
    }

    fn client_for(&self, url: &Url) -> Result<Client, ExchangeError> {
        let (key, proxy) = match self.next_route() {
            Route::Direct => (origin_key(url), None),
            Route::Proxy(proxy) => (proxy.clone(), Some(proxy)),
        };

        let mut clients = self.lock_clients();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let client = self
            .build_client(proxy.as_deref())
            .map_err(|e| ExchangeError::Invalid(e.to_string()))?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

fn target_url(spec: &HttpRequestSpec) -> Result<Url, ExchangeError> {
    let mut url =
        Url::parse(&spec.url).map_err(|e| ExchangeError::Invalid(format!("{}: {e}", spec.url)))?;
    if !spec.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &spec.query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Whole milliseconds, saturating for durations too long to fit.
fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

fn map_error(err: reqwest::Error, timeout: Duration) -> ExchangeError {
    if err.is_timeout() {
        ExchangeError::Timeout(millis(timeout))
    } else if err.is_connect() {
        ExchangeError::Connect(err.to_string())
    } else if err.is_builder() {
        ExchangeError::Invalid(err.to_string())
    } else if err.is_request() || err.is_body() || err.is_decode() {
        ExchangeError::Interrupted(err.to_string())
    } else {
        ExchangeError::Other(err.to_string())
    }
}

#[async_trait]
impl Exchange for PooledExchange {
    async fn send(
        &self,
        spec: &HttpRequestSpec,
        timeout: Duration,
    ) -> Result<HttpResult, ExchangeError> {
        let url = target_url(spec)?;
        let client = self.client_for(&url)?;

        let method = match spec.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Head => reqwest::Method::HEAD,
        };
        let mut request = client.request(method, url).timeout(timeout);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|e| map_error(e, timeout))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_lowercase(), value.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(|e| map_error(e, timeout))?;

        let mut result = HttpResult::new(status, final_url, text);
        result.headers = headers;
        Ok(result)
    }

    async fn close(&self) {
        let released = {
            let mut clients = self.lock_clients();
            let count = clients.len();
            clients.clear();
            count
        };
        tracing::debug!(clients = released, "Released pooled clients");
    }
}

/// Builds a [`PooledExchange`] per search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestExchangeFactory;

impl ReqwestExchangeFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ExchangeFactory for ReqwestExchangeFactory {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn Exchange>, AppError> {
        Ok(Arc::new(PooledExchange::new(settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Redirect};
    use axum::routing::{get, post};
    use jobscout_core::models::Site;
    use jobscout_core::transport::{RequestKind, Transport};

    async fn spawn_server() -> String {
        let app = Router::new()
            .route(
                "/page",
                get(|| async {
                    (
                        [("content-type", "text/html"), ("x-trace", "abc")],
                        "<p>Hello</p>",
                    )
                }),
            )
            .route("/moved", get(|| async { Redirect::temporary("/page") }))
            .route(
                "/echo",
                post(
                    |uri: axum::http::Uri, headers: HeaderMap, body: String| async move {
                        let marker = headers
                            .get("x-marker")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        format!("{}|{}|{}", uri.query().unwrap_or(""), marker, body)
                    },
                ),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
            .route(
                "/busy",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response() }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn exchange() -> PooledExchange {
        PooledExchange::new(&TransportSettings::default()).unwrap()
    }

    #[test]
    fn test_normalize_proxy() {
        assert_eq!(normalize_proxy("localhost"), Some(Route::Direct));
        assert_eq!(
            normalize_proxy(" proxy.example:8080 "),
            Some(Route::Proxy("http://proxy.example:8080".into()))
        );
        assert_eq!(
            normalize_proxy("socks5://10.0.0.1:1080"),
            Some(Route::Proxy("socks5://10.0.0.1:1080".into()))
        );
        assert_eq!(normalize_proxy("   "), None);
    }

    #[test]
    fn test_routes_rotate_round_robin() {
        let settings = TransportSettings {
            proxies: vec!["localhost".into(), "proxy.example:8080".into()],
            ..Default::default()
        };
        let exchange = PooledExchange::new(&settings).unwrap();
        let proxy = Route::Proxy("http://proxy.example:8080".into());

        assert_eq!(exchange.next_route(), Route::Direct);
        assert_eq!(exchange.next_route(), proxy);
        assert_eq!(exchange.next_route(), Route::Direct);
        assert_eq!(exchange.pool_size(), 1);
    }

    #[test]
    fn test_missing_ca_bundle_fails_construction() {
        let settings = TransportSettings {
            ca_cert_path: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        let err = PooledExchange::new(&settings).err().unwrap();
        assert!(matches!(err, AppError::Transport(TransportError::Build(_))));
    }

    #[tokio::test]
    async fn test_send_returns_status_headers_and_final_url() {
        let base = spawn_server().await;
        let exchange = exchange();

        let result = exchange
            .send(&HttpRequestSpec::get(format!("{base}/moved")), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert!(result.ok);
        assert_eq!(result.text, "<p>Hello</p>");
        assert_eq!(result.url, format!("{base}/page"));
        assert_eq!(result.header("x-trace"), Some("abc"));
        assert!(result.headers.iter().all(|(name, _)| name == &name.to_lowercase()));
    }

    #[tokio::test]
    async fn test_send_passes_query_headers_and_body() {
        let base = spawn_server().await;
        let exchange = exchange();
        let spec = HttpRequestSpec::post(format!("{base}/echo"))
            .query("q", "rust developer")
            .query("empty", "")
            .header("X-Marker", "m1")
            .body("payload");

        let result = exchange.send(&spec, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.text, "q=rust+developer|m1|payload");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let base = spawn_server().await;
        let result = exchange()
            .send(&HttpRequestSpec::get(format!("{base}/busy")), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, 503);
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let base = spawn_server().await;
        let err = exchange()
            .send(
                &HttpRequestSpec::get(format!("{base}/slow")),
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Timeout(100));
        assert!(err.is_transient());
    }

    #[test]
    fn test_timeout_millis_saturate() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = exchange()
            .send(&HttpRequestSpec::get(format!("http://{addr}/")), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Connect(_)), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let err = exchange()
            .send(&HttpRequestSpec::get("not a url"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Invalid(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_clients_pooled_per_origin_and_released_on_close() {
        let first = spawn_server().await;
        let second = spawn_server().await;
        let exchange = exchange();

        for url in [
            format!("{first}/page"),
            format!("{first}/busy"),
            format!("{second}/page"),
        ] {
            exchange
                .send(&HttpRequestSpec::get(url), Duration::from_secs(5))
                .await
                .unwrap();
        }
        assert_eq!(exchange.pool_size(), 2);

        exchange.close().await;
        assert_eq!(exchange.pool_size(), 0);
    }

    #[tokio::test]
    async fn test_requests_go_through_configured_proxy() {
        // A plain HTTP proxy receives the request for the target host; the
        // test server answers it by path.
        let proxy = spawn_server().await;
        let settings = TransportSettings {
            proxies: vec![proxy.trim_start_matches("http://").to_string()],
            ..Default::default()
        };
        let exchange = PooledExchange::new(&settings).unwrap();

        let result = exchange
            .send(
                &HttpRequestSpec::get("http://jobs.invalid/page"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(result.text, "<p>Hello</p>");
        assert_eq!(exchange.pool_size(), 1);
    }

    #[tokio::test]
    async fn test_factory_drives_full_transport() {
        let base = spawn_server().await;
        let settings = TransportSettings {
            user_agent: Some("jobscout-test/1.0".into()),
            ..Default::default()
        };
        let exchange = ReqwestExchangeFactory::new().create(&settings).unwrap();
        let transport = Transport::new(&settings, exchange);

        let result = transport
            .request(
                HttpRequestSpec::get(format!("{base}/page"))
                    .source(Site::Indeed)
                    .kind(RequestKind::Detail),
            )
            .await
            .unwrap();
        assert_eq!(result.content_type(), Some("text/html"));

        transport.close().await;
        assert!(transport.is_closed());
    }
}
