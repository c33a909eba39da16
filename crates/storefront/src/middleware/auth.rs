//! Authentication extractors.
//!
//! The current identity is resolved per request by probing the remote
//! session endpoint with the relayed upstream session cookie. Extraction
//! completes before any handler renders, so no page ever shows a definitive
//! logged-in/out state ahead of the probe; the probe itself is cached and
//! coalesced inside [`crate::api::ApiClient`].

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::api::types::Identity;
use crate::cookies;
use crate::state::AppState;

/// Extractor that requires an authenticated customer.
///
/// If nobody is logged in, the request is redirected to the login page with
/// a `return_to` parameter pointing back at the requested path.
///
/// ```rust,ignore
/// async fn checkout_page(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("Shipping to {}", identity.first_name)
/// }
/// ```
pub struct RequireAuth(pub Identity);

/// Rejection for [`RequireAuth`]: redirect to login, returning afterwards.
pub struct RedirectToLogin {
    return_to: String,
}

impl IntoResponse for RedirectToLogin {
    fn into_response(self) -> Response {
        let target = format!("/login?return_to={}", urlencoding::encode(&self.return_to));
        Redirect::to(&target).into_response()
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = RedirectToLogin;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = resolve_identity(parts, state).await;
        identity.map(Self).ok_or_else(|| RedirectToLogin {
            return_to: parts.uri.path().to_string(),
        })
    }
}

/// Extractor that optionally resolves the current customer.
///
/// Unlike [`RequireAuth`], an anonymous request is not rejected; the inner
/// option is simply `None`.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_identity(parts, state).await))
    }
}

/// Probe the session endpoint for the identity behind the relayed cookie.
///
/// No cookie means logged out. An explicit unauthenticated response is the
/// expected logged-out state. Any other failure is logged and treated as
/// logged out rather than failing the page.
async fn resolve_identity(parts: &Parts, state: &AppState) -> Option<Identity> {
    let session = cookies::upstream_session(&parts.headers)?;
    match state.api().session(&session).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "session probe failed");
            None
        }
    }
}
