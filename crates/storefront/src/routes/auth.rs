//! Authentication route handlers.
//!
//! Authentication is delegated to the remote commerce API. A successful
//! login relays the upstream session cookie to the browser via the
//! `api_session` cookie; from then on every request resolves its identity
//! through the [`crate::middleware::auth`] extractors. Rejections from the
//! API are surfaced verbatim on the form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use maple_market_core::Email;

use crate::api::ApiError;
use crate::api::types::{Credentials, Identity, SignupRequest};
use crate::cookies;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

// =============================================================================
// Form & Query Types
// =============================================================================

/// Login form data. `return_to` round-trips the page that demanded login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub return_to: Option<String>,
}

/// Signup form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Query parameters for error/success display on auth pages.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub return_to: Option<String>,
}

/// Clamp a `return_to` value to a local path. Anything else (absolute URLs,
/// protocol-relative `//host`) falls back to the home page.
fn safe_return_to(value: Option<&str>) -> String {
    match value {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub identity: Option<Identity>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub return_to: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub identity: Option<Identity>,
    pub error: Option<String>,
}

/// Logout result page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/logout.html")]
pub struct LogoutTemplate {
    pub identity: Option<Identity>,
    pub success: bool,
}

// =============================================================================
// Login
// =============================================================================

/// Display the login page. An already-authenticated visitor goes home.
#[instrument(skip(identity, query))]
pub async fn login_page(
    OptionalAuth(identity): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if identity.is_some() {
        return Redirect::to("/").into_response();
    }

    LoginTemplate {
        identity: None,
        error: query.error,
        success: query.success,
        return_to: safe_return_to(query.return_to.as_deref()),
    }
    .into_response()
}

/// Handle login form submission.
///
/// On success the upstream session cookie is relayed to the browser and the
/// visitor returns to where they came from. On rejection the API's message
/// is shown verbatim; nothing about the visitor's state changes.
#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response> {
    let return_to = safe_return_to(form.return_to.as_deref());

    let credentials = Credentials {
        email: form.email,
        password: form.password,
    };

    match state.api().login(&credentials).await {
        Ok(outcome) => {
            set_sentry_user(&outcome.identity.customer_id, Some(&outcome.identity.email));

            let mut response = Redirect::to(&return_to).into_response();
            if let Some(pair) = &outcome.session {
                response
                    .headers_mut()
                    .append(SET_COOKIE, cookies::relay_session(pair)?);
            } else {
                tracing::warn!("login succeeded but upstream set no session cookie");
            }
            Ok(response)
        }
        Err(ApiError::Rejected(message)) => {
            Ok(login_retry(&message, &return_to).into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "login request failed");
            Ok(login_retry("Unable to log in right now. Please try again.", &return_to)
                .into_response())
        }
    }
}

fn login_retry(message: &str, return_to: &str) -> Redirect {
    Redirect::to(&format!(
        "/login?error={}&return_to={}",
        urlencoding::encode(message),
        urlencoding::encode(return_to)
    ))
}

// =============================================================================
// Signup
// =============================================================================

/// Display the signup page.
#[instrument(skip(identity, query))]
pub async fn signup_page(
    OptionalAuth(identity): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if identity.is_some() {
        return Redirect::to("/").into_response();
    }

    SignupTemplate {
        identity: None,
        error: query.error,
    }
    .into_response()
}

/// Handle signup form submission.
///
/// Field presence and email shape are checked here; everything else
/// (duplicate accounts, password policy) is the API's call and its message
/// is relayed verbatim. A created account is not logged in; the visitor is
/// sent to the login page.
#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    if let Some(message) = validate_signup(&form) {
        return Ok(signup_retry(message).into_response());
    }

    let request = SignupRequest {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password,
    };

    match state.api().signup(&request).await {
        Ok(()) => Ok(Redirect::to("/login?success=Account+created.+Please+log+in.")
            .into_response()),
        Err(ApiError::Rejected(message)) => Ok(signup_retry(&message).into_response()),
        Err(e) => {
            tracing::error!(error = %e, "signup request failed");
            Ok(signup_retry("Unable to sign up right now. Please try again.").into_response())
        }
    }
}

fn validate_signup(form: &SignupForm) -> Option<&'static str> {
    if form.first_name.trim().is_empty() {
        return Some("First name is required.");
    }
    if form.last_name.trim().is_empty() {
        return Some("Last name is required.");
    }
    if Email::parse(form.email.trim()).is_err() {
        return Some("A valid email address is required.");
    }
    if form.password.is_empty() {
        return Some("Password is required.");
    }
    None
}

fn signup_retry(message: &str) -> Redirect {
    Redirect::to(&format!("/signup?error={}", urlencoding::encode(message)))
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// The upstream session is ended first; only on success is the relayed
/// cookie deleted. A failed logout leaves the visitor exactly as they were,
/// with a retry prompt - including the still-logged-in navigation.
#[instrument(skip(state, identity, headers))]
pub async fn logout(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(session) = cookies::upstream_session(&headers) else {
        // Nothing to end; treat as already logged out.
        return Ok(LogoutTemplate {
            identity: None,
            success: true,
        }
        .into_response());
    };

    match state.api().logout(&session).await {
        Ok(()) => {
            clear_sentry_user();
            let mut response = LogoutTemplate {
                identity: None,
                success: true,
            }
            .into_response();
            response
                .headers_mut()
                .append(SET_COOKIE, cookies::delete(cookies::API_SESSION)?);
            Ok(response)
        }
        Err(e) => {
            tracing::warn!(error = %e, "logout request failed");
            Ok(LogoutTemplate {
                identity,
                success: false,
            }
            .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_to_allows_local_paths_only() {
        assert_eq!(safe_return_to(Some("/checkout")), "/checkout");
        assert_eq!(safe_return_to(Some("https://evil.example/")), "/");
        assert_eq!(safe_return_to(Some("//evil.example/")), "/");
        assert_eq!(safe_return_to(None), "/");
    }

    #[test]
    fn signup_validation_reports_first_failure() {
        let form = SignupForm {
            first_name: " ".to_string(),
            last_name: "Park".to_string(),
            email: "jo@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(validate_signup(&form), Some("First name is required."));

        let form = SignupForm {
            first_name: "Jo".to_string(),
            last_name: "Park".to_string(),
            email: "not-an-email".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(
            validate_signup(&form),
            Some("A valid email address is required.")
        );
    }
}
