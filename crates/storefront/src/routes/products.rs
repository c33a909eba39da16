//! Product detail route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use tracing::instrument;

use maple_market_core::{Product, ProductId, cart};

use crate::api::types::Identity;
use crate::cookies;
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub identity: Option<Identity>,
    pub product: Product,
    pub image_host: String,
}

/// Rendered when the requested product id is not in the catalog.
#[derive(Template, WebTemplate)]
#[template(path = "products/not_found.html")]
pub struct ProductNotFoundTemplate {
    pub identity: Option<Identity>,
}

/// Add-to-cart status fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/add_status.html")]
pub struct AddStatusTemplate {
    pub message: &'static str,
}

/// Display a product detail page.
///
/// An unknown id renders a not-found page rather than an error: stale links
/// to removed products are expected.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    let Some(product) = state.api().product(id).await? else {
        return Ok((StatusCode::NOT_FOUND, ProductNotFoundTemplate { identity }).into_response());
    };

    Ok(ProductShowTemplate {
        identity,
        product,
        image_host: state.image_host().to_string(),
    }
    .into_response())
}

/// Add one unit of a product to the cart (HTMX).
///
/// Appends the id to the cart cookie; repetition encodes quantity. The
/// rewritten cookie gets a 7-day horizon. Returns a status fragment plus an
/// `HX-Trigger` so the cart count badge refreshes.
#[instrument(skip(state, headers))]
pub async fn add(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    headers: HeaderMap,
) -> Result<Response> {
    if state.api().product(id).await?.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            AddStatusTemplate {
                message: "This product is no longer available.",
            },
        )
            .into_response());
    }

    let raw = cookies::get(&headers, cookies::CART);
    let updated = cart::append_id(raw.as_deref(), id);
    let cookie = cookies::persistent(cookies::CART, &updated, cookies::CART_EXPIRY)?;

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        AddStatusTemplate {
            message: "Added to cart.",
        },
    )
        .into_response())
}
