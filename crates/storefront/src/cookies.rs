//! Cookie helpers for the storefront's client-persisted state.
//!
//! Three families of cookies are written:
//! - `cart` - the comma-separated product id list (the cart itself)
//! - `api_session` - the relayed upstream session pair, percent-encoded
//! - `subtotal` / `estimatedTax` / `total` - short-lived hand-off values
//!   passed from the cart view into checkout
//!
//! Values are built by hand into `Set-Cookie` headers; everything written
//! here is numeric or percent-encoded, so header construction cannot fail on
//! well-formed input.

use std::borrow::Cow;
use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use axum::http::{HeaderMap, HeaderValue};

/// The cart cookie: flat comma-separated product ids.
pub const CART: &str = "cart";

/// Relayed upstream session cookie pair (percent-encoded `name=value`).
pub const API_SESSION: &str = "api_session";

/// Hand-off cookies carrying totals from the cart view into checkout.
pub const SUBTOTAL: &str = "subtotal";
pub const ESTIMATED_TAX: &str = "estimatedTax";
pub const TOTAL: &str = "total";

/// Expiry horizon for cart cookies written from the product detail view.
pub const CART_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Lifetime of the totals hand-off cookies.
pub const HANDOFF_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Extract a cookie value by name from request headers.
#[must_use]
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|cookie| {
            let mut parts = cookie.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            (key == name).then(|| value.to_string())
        })
}

/// Build a `Set-Cookie` value with the given options.
///
/// # Errors
///
/// Returns an error if the assembled header contains invalid characters;
/// callers pass numeric or percent-encoded values, so this is defensive
/// plumbing for `?`, not an expected path.
pub fn set(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    http_only: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; SameSite=Lax");
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    HeaderValue::from_str(&cookie)
}

/// A session-scoped cookie (expires when the browser closes).
///
/// # Errors
///
/// See [`set`].
pub fn session_scoped(name: &str, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    set(name, value, None, false)
}

/// A persistent cookie with an expiry horizon.
///
/// # Errors
///
/// See [`set`].
pub fn persistent(
    name: &str,
    value: &str,
    max_age: Duration,
) -> Result<HeaderValue, InvalidHeaderValue> {
    set(name, value, Some(max_age), false)
}

/// Expire a cookie immediately.
///
/// # Errors
///
/// See [`set`].
pub fn delete(name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    set(name, "", Some(Duration::ZERO), false)
}

// =============================================================================
// Upstream session relay
// =============================================================================

/// Encode an upstream session pair for storage in the `api_session` cookie.
#[must_use]
pub fn encode_session_pair(pair: &str) -> String {
    urlencoding::encode(pair).into_owned()
}

/// Read and decode the relayed upstream session pair, if present.
#[must_use]
pub fn upstream_session(headers: &HeaderMap) -> Option<String> {
    let encoded = get(headers, API_SESSION)?;
    match urlencoding::decode(&encoded) {
        Ok(Cow::Borrowed(s)) => Some(s.to_string()),
        Ok(Cow::Owned(s)) => Some(s),
        // An undecodable value is a cookie we never wrote; treat as absent.
        Err(_) => None,
    }
}

/// Build the `Set-Cookie` header relaying an upstream session pair. HttpOnly:
/// nothing in the browser needs to read it.
///
/// # Errors
///
/// See [`set`].
pub fn relay_session(pair: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    set(API_SESSION, &encode_session_pair(pair), None, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn get_finds_named_cookie_among_many() {
        let headers = headers_with_cookie("theme=dark; cart=1,1,2; other=x");
        assert_eq!(get(&headers, CART).as_deref(), Some("1,1,2"));
        assert_eq!(get(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(get(&headers, "missing"), None);
    }

    #[test]
    fn get_handles_values_containing_equals() {
        let headers = headers_with_cookie("api_session=sid%3Dabc123");
        assert_eq!(get(&headers, API_SESSION).as_deref(), Some("sid%3Dabc123"));
    }

    #[test]
    fn set_builds_expected_attributes() {
        let value = set(CART, "1,2", Some(Duration::from_secs(60)), false).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("cart=1,2"));
        assert!(s.contains("Max-Age=60"));
        assert!(s.contains("Path=/"));
        assert!(!s.contains("HttpOnly"));
    }

    #[test]
    fn delete_expires_immediately() {
        let value = delete(CART).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("cart=;"));
        assert!(s.contains("Max-Age=0"));
    }

    #[test]
    fn session_relay_round_trip() {
        let pair = "connect.sid=s%3Aabc; extra";
        let header = relay_session(pair.split(';').next().unwrap()).unwrap();

        let mut headers = HeaderMap::new();
        let cookie_value = header.to_str().unwrap().split(';').next().unwrap();
        headers.insert(COOKIE, HeaderValue::from_str(cookie_value).unwrap());

        assert_eq!(
            upstream_session(&headers).as_deref(),
            Some("connect.sid=s%3Aabc")
        );
    }
}
