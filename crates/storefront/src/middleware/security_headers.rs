//! Security headers middleware for XSS and clickjacking protection.
//!
//! Adds restrictive security headers to all responses. The CSP is built from
//! configuration because product images are served by the remote API host,
//! not by this server.

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue,
        header::{CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Build the Content-Security-Policy header value.
///
/// Everything is same-origin except images, which load from the commerce
/// API's `/images/` route.
#[must_use]
pub fn build_csp(api_host: &str) -> HeaderValue {
    let policy = format!(
        "default-src 'none'; \
         script-src 'self' https://unpkg.com; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' {api_host}; \
         connect-src 'self'; \
         frame-ancestors 'none'; \
         base-uri 'self'; \
         form-action 'self'"
    );
    // The api_host was validated as a URL at config load; ASCII by then.
    HeaderValue::from_str(&policy)
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"))
}

/// Add security headers to all responses.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let csp = build_csp(state.image_host());

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent clickjacking
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    // Prevent MIME sniffing
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    // Zero referrer leakage
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    headers.insert(CONTENT_SECURITY_POLICY, csp);

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn csp_allows_api_host_images() {
        let csp = build_csp("http://localhost:8080");
        let value = csp.to_str().unwrap();
        assert!(value.contains("img-src 'self' http://localhost:8080"));
        assert!(value.contains("frame-ancestors 'none'"));
    }
}
