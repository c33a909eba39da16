//! Typed client for the remote commerce API.
//!
//! One reqwest client serves every endpoint the storefront consumes: the
//! product catalog, session-based authentication, and purchase submission.
//! The catalog is cached via `moka` (5-minute TTL). Session probes are also
//! cached (30-second TTL); moka's coalescing loader doubles as a
//! single-flight guard, so concurrent probes for the same session produce a
//! single upstream request.
//!
//! Credentialed endpoints take the upstream session cookie pair
//! (`name=value`) as relayed by the browser and forward it verbatim in the
//! `Cookie` header.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use thiserror::Error;
use tracing::{debug, instrument};

use maple_market_core::{Product, ProductId};

use types::{Credentials, Identity, PurchaseRequest, SignupRequest};

/// Upstream request timeout. The original client had none; the transport
/// default is too generous for a page render.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog cache TTL.
const CATALOG_TTL: Duration = Duration::from_secs(300);

/// Session probe cache TTL. Short, so a logout performed out-of-band shows
/// up quickly.
const SESSION_TTL: Duration = Duration::from_secs(30);

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport failure (connect, timeout, malformed body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request; the message is surfaced verbatim on
    /// login/signup/checkout forms.
    #[error("{0}")]
    Rejected(String),

    /// Upstream failure observed through a shared cache load.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Successful login: the returned identity plus the upstream session cookie
/// pair (`name=value`) to relay to the browser, when the API set one.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub session: Option<String>,
}

/// Client for the remote commerce API.
///
/// Cheaply cloneable; all shared state lives behind an `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    catalog: Cache<(), Arc<Vec<Product>>>,
    sessions: Cache<String, Option<Identity>>,
}

impl ApiClient {
    /// Create a new API client for the given base URL (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(api_host: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let catalog = Cache::builder()
            .max_capacity(1)
            .time_to_live(CATALOG_TTL)
            .build();
        let sessions = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(SESSION_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: api_host.to_string(),
                catalog,
                sessions,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Fetch the full product catalog (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not parse.
    #[instrument(skip(self))]
    pub async fn catalog(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        self.inner
            .catalog
            .try_get_with((), async {
                debug!("fetching product catalog");
                let products: Vec<Product> = self
                    .inner
                    .client
                    .get(self.url("/api/products/all"))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(Arc::new(products))
            })
            .await
            .map_err(flatten_cache_error)
    }

    /// Fetch a single product. `Ok(None)` means the catalog has no such
    /// product - a stale link, not a failure.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: ProductId) -> Result<Option<Product>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/api/products/{product_id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let product = response.error_for_status()?.json::<Product>().await?;
        Ok(Some(product))
    }

    // =========================================================================
    // Session & Authentication
    // =========================================================================

    /// Probe the session endpoint for the identity behind the given upstream
    /// session cookie pair.
    ///
    /// An explicit unauthenticated response (401/403) is the expected
    /// logged-out state and yields `Ok(None)`. Results are cached with a
    /// coalescing loader, so repeated probes for one session within the TTL
    /// hit upstream once.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    #[instrument(skip(self, session))]
    pub async fn session(&self, session: &str) -> Result<Option<Identity>, ApiError> {
        let key = session.to_string();
        self.inner
            .sessions
            .try_get_with(key, self.probe_session(session))
            .await
            .map_err(flatten_cache_error)
    }

    async fn probe_session(&self, session: &str) -> Result<Option<Identity>, ApiError> {
        debug!("probing session endpoint");
        let response = self
            .inner
            .client
            .get(self.url("/api/users/getsession"))
            .header(COOKIE, session)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }

        let identity = response.error_for_status()?.json::<Identity>().await?;
        Ok(Some(identity))
    }

    /// Authenticate with the given credentials.
    ///
    /// On success the probe cache is primed for the returned session so the
    /// next page render does not re-probe.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the API's message on a non-2xx
    /// response, or a transport/parse error; the caller's state is left
    /// unchanged either way.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/users/login"))
            .json(credentials)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let session = extract_session_cookie(&response);
        let identity = response.json::<Identity>().await?;

        if let Some(pair) = &session {
            self.inner
                .sessions
                .insert(pair.clone(), Some(identity.clone()))
                .await;
        }

        Ok(LoginOutcome { identity, session })
    }

    /// End the upstream session. On success the probe cache entry is
    /// invalidated; on failure it is left alone, matching the policy that a
    /// failed logout changes no state.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx response.
    #[instrument(skip(self, session))]
    pub async fn logout(&self, session: &str) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/users/logout"))
            .header(COOKIE, session)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        self.inner.sessions.invalidate(session).await;
        Ok(())
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` carrying the API's error text verbatim
    /// on a non-2xx response.
    #[instrument(skip(self, request))]
    pub async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/users/signup"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    // =========================================================================
    // Purchase
    // =========================================================================

    /// Submit a purchase. Requires an authenticated upstream session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the API's message on a non-2xx
    /// response.
    #[instrument(skip(self, request, session), fields(customer_id = %request.customer_id))]
    pub async fn purchase(
        &self,
        request: &PurchaseRequest,
        session: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/products/purchase"))
            .header(COOKIE, session)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

/// Build a `Rejected` error from a failed response, preferring the JSON
/// `message` field, falling back to the raw body, then the status line.
async fn rejection(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("request failed with status {status}"));

    ApiError::Rejected(message)
}

/// Extract the first `Set-Cookie` pair (`name=value`, attributes stripped)
/// from an upstream response.
fn extract_session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .find(|pair| pair.contains('='))
        .map(String::from)
}

/// moka wraps loader errors in an `Arc`; unwrap when we are the only caller,
/// otherwise degrade to a message-preserving variant.
fn flatten_cache_error(err: Arc<ApiError>) -> ApiError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| ApiError::Upstream(shared.to_string()))
}
