use crate::client::rate_limiter::RateLimiter;
use crate::client::response::{ApiResponse, Metadata};
use crate::repositories::cache::{CacheStats, ResponseCache, DEFAULT_TTL};
use crate::{Error, Result};
use reqwest::header::{HeaderMap, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{redirect, Client, Method};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_ANY: &str = "*/*";

/// Error fields checked, in order, in a JSON error body
const ERROR_FIELDS: [&str; 4] = ["error", "message", "detail", "error_message"];

/// Connection settings for one upstream API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Display name used in error messages; lower-cased it names the cache partition
    pub api_name: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum spacing between dispatched requests
    pub rate_limit_delay: Option<Duration>,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_name: api_name.into(),
            timeout: Duration::from_secs(30),
            rate_limit_delay: None,
            cache_enabled: true,
            cache_dir: crate::config::default_cache_dir(),
            cache_ttl: DEFAULT_TTL,
            user_agent: format!(
                "{}/{} (Biomedical Research Tool)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Body of a POST request; JSON and form encoding are mutually exclusive
#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

impl PostBody {
    /// Build a form body from borrowed pairs
    pub fn form<K: ToString, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Self::Empty => Vec::new(),
            Self::Json(value) => serde_json::to_vec(value)?,
            Self::Form(pairs) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
                .into_bytes(),
        })
    }
}

/// Whether a request may be answered from, and stored into, the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Use,
    /// Always reach the network; nothing is stored
    Bypass,
}

/// Ordered query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Add the parameter only when a value is present
    #[must_use]
    pub fn push_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(key, value),
            None => self,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Live connection state, created lazily and dropped on close
struct Transport {
    http: Client,
    cache: Option<ResponseCache>,
}

/// A successful (2xx) response, from the network or the cache
#[derive(Debug, Clone)]
struct RawResponse {
    body: Vec<u8>,
}

/// Cached, paced, error-normalizing HTTP client shared by every per-API client
pub struct BaseApiClient {
    config: ClientConfig,
    limiter: RateLimiter,
    transport: Option<Transport>,
}

impl fmt::Debug for BaseApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseApiClient")
            .field("api_name", &self.config.api_name)
            .field("base_url", &self.config.base_url)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl BaseApiClient {
    /// Create a client; no connection or cache is opened until first use
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_delay);
        Self {
            config,
            limiter,
            transport: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn api_name(&self) -> &str {
        &self.config.api_name
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Create the transport (and open the cache partition) if not already open.
    /// An unusable cache store leaves the client uncached rather than failing.
    pub fn open(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }

        let http = Client::builder()
            .timeout(self.config.timeout)
            .redirect(redirect::Policy::limited(10))
            .gzip(true)
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| self.transport_error(&e))?;

        let cache = if self.config.cache_enabled {
            match ResponseCache::open(
                &self.config.cache_dir,
                &self.config.api_name,
                self.config.cache_ttl,
            ) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(
                        "{} cache unavailable at {}, continuing uncached: {}",
                        self.config.api_name,
                        self.config.cache_dir.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "Opened {} client (cache: {})",
            self.config.api_name,
            if cache.is_some() { "on" } else { "off" }
        );
        self.transport = Some(Transport { http, cache });
        Ok(())
    }

    /// Release the transport. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        if let Some(cache) = transport.cache {
            if let Err(e) = cache.flush() {
                warn!("Failed to flush {} cache: {}", self.config.api_name, e);
            }
        }
        debug!("Closed {} client", self.config.api_name);
    }

    /// Counters of the open cache partition, if any
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.transport
            .as_ref()
            .and_then(|t| t.cache.as_ref())
            .map(ResponseCache::cache_stats)
    }

    /// GET `base_url + path`, decoded as JSON
    pub async fn get_json(&mut self, path: &str, params: Option<&QueryParams>) -> Result<Value> {
        let url = self.endpoint(path);
        let raw = self
            .execute(Method::GET, &url, params, &PostBody::Empty, ACCEPT_JSON, CacheMode::Use)
            .await?;
        self.decode_json(&raw)
    }

    /// GET `base_url + path`, returned as text
    pub async fn get_text(&mut self, path: &str, params: Option<&QueryParams>) -> Result<String> {
        let url = self.endpoint(path);
        let raw = self
            .execute(Method::GET, &url, params, &PostBody::Empty, ACCEPT_ANY, CacheMode::Use)
            .await?;
        Ok(String::from_utf8_lossy(&raw.body).into_owned())
    }

    /// GET an absolute URL, returned as text
    pub async fn get_text_absolute(
        &mut self,
        url: &str,
        params: Option<&QueryParams>,
        mode: CacheMode,
    ) -> Result<String> {
        let raw = self
            .execute(Method::GET, url, params, &PostBody::Empty, ACCEPT_ANY, mode)
            .await?;
        Ok(String::from_utf8_lossy(&raw.body).into_owned())
    }

    /// GET an absolute URL, decoded as JSON
    pub async fn get_json_absolute(
        &mut self,
        url: &str,
        params: Option<&QueryParams>,
        mode: CacheMode,
    ) -> Result<Value> {
        let raw = self
            .execute(Method::GET, url, params, &PostBody::Empty, ACCEPT_JSON, mode)
            .await?;
        self.decode_json(&raw)
    }

    /// POST to `base_url + path`, decoded as JSON
    pub async fn post_json(
        &mut self,
        path: &str,
        body: PostBody,
        params: Option<&QueryParams>,
    ) -> Result<Value> {
        let url = self.endpoint(path);
        let raw = self
            .execute(Method::POST, &url, params, &body, ACCEPT_JSON, CacheMode::Use)
            .await?;
        self.decode_json(&raw)
    }

    /// POST to `base_url + path`, returned as text
    pub async fn post_text(
        &mut self,
        path: &str,
        body: PostBody,
        params: Option<&QueryParams>,
    ) -> Result<String> {
        let url = self.endpoint(path);
        let raw = self
            .execute(Method::POST, &url, params, &body, ACCEPT_ANY, CacheMode::Use)
            .await?;
        Ok(String::from_utf8_lossy(&raw.body).into_owned())
    }

    /// See [`crate::client::format_response`]
    #[must_use]
    pub fn format_response(
        &self,
        data: impl Into<ApiResponse>,
        metadata: Option<Metadata>,
    ) -> ApiResponse {
        crate::client::response::format_response(data, metadata)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn execute(
        &mut self,
        method: Method,
        url: &str,
        params: Option<&QueryParams>,
        body: &PostBody,
        accept: &str,
        mode: CacheMode,
    ) -> Result<RawResponse> {
        self.limiter.acquire().await;

        let mut request_url = Url::parse(url).map_err(|e| Error::Transport {
            api: self.config.api_name.clone(),
            message: format!("invalid URL '{url}': {e}"),
        })?;
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            request_url.query_pairs_mut().extend_pairs(params.iter());
        }
        info!("HTTP Request: {} {}", method, redacted(&request_url));

        self.open()?;
        let api = self.config.api_name.as_str();
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| Error::Service(format!("{api} client is not open")))?;

        let encoded = body.encode()?;
        let cache = match mode {
            CacheMode::Use => transport.cache.as_ref(),
            CacheMode::Bypass => None,
        };
        let key = cache.map(|_| {
            ResponseCache::request_key(method.as_str(), request_url.as_str(), accept, &encoded)
        });

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            match cache.lookup(key) {
                Ok(Some(entry)) => {
                    debug!("Serving {} from {} cache", request_url, api);
                    return Ok(RawResponse { body: entry.body });
                }
                Ok(None) => {}
                Err(e) => warn!("{} cache lookup failed: {}", api, e),
            }
        }

        let mut request = transport
            .http
            .request(method, request_url)
            .header(ACCEPT, accept);
        request = match body {
            PostBody::Empty => request,
            PostBody::Json(_) => request
                .header(CONTENT_TYPE, "application/json")
                .body(encoded),
            PostBody::Form(_) => request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded),
        };

        let response = request.send().await.map_err(|e| {
            error!("HTTP Error: {}", e);
            self.transport_error(&e)
        })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("");
        let status_error = response.error_for_status_ref().err().map(|e| e.to_string());
        let content_type = header_str(response.headers(), CONTENT_TYPE.as_str());
        let no_store = header_str(response.headers(), CACHE_CONTROL.as_str())
            .is_some_and(|v| v.to_ascii_lowercase().contains("no-store"));

        let bytes = response.bytes().await.map_err(|e| {
            error!("HTTP Error: {}", e);
            self.transport_error(&e)
        })?;

        if let Some(raw_text) = status_error {
            error!("HTTP Response: {} {}", status.as_u16(), reason);
            return Err(Error::HttpStatus {
                api: api.to_string(),
                status: status.as_u16(),
                detail: error_detail(&bytes).unwrap_or(raw_text),
            });
        }
        info!("HTTP Response: {} {}", status.as_u16(), reason);

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if no_store {
                debug!("Not caching {} response: no-store", api);
            } else if let Err(e) = cache.store(key, status.as_u16(), content_type, bytes.to_vec()) {
                warn!("{} cache store failed: {}", api, e);
            }
        }

        Ok(RawResponse {
            body: bytes.to_vec(),
        })
    }

    fn decode_json(&self, raw: &RawResponse) -> Result<Value> {
        serde_json::from_slice(&raw.body).map_err(|e| Error::Decode {
            api: self.config.api_name.clone(),
            message: e.to_string(),
        })
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        Error::Transport {
            api: self.config.api_name.clone(),
            message: err.to_string(),
        }
    }
}

impl Drop for BaseApiClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// URL for logs, with credential-like query values masked
fn redacted(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| is_secret(&k)) {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret(&k) { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

fn is_secret(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("apikey") || key.contains("api_key") || key == "key" || key.contains("token")
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First of the known error fields in a JSON object body
fn error_detail(body: &[u8]) -> Option<String> {
    let Value::Object(map) = serde_json::from_slice::<Value>(body).ok()? else {
        return None;
    };
    ERROR_FIELDS
        .iter()
        .find_map(|field| map.get(*field))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
}
