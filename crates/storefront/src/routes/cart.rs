//! Cart route handlers.
//!
//! The cart lives entirely in the `cart` cookie as a flat comma-separated
//! product id list; repetition encodes quantity. Handlers re-read the cookie
//! on every request, join it against the cached catalog, and write the
//! normalized list back. Mutations use HTMX fragments so the page updates
//! without a full reload.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use maple_market_core::{CartEntry, ProductId, Totals, cart};

use crate::api::types::Identity;
use crate::cookies;
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Remove item form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub identity: Option<Identity>,
    pub entries: Vec<CartEntry>,
    pub totals: Totals,
    pub image_host: String,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub entries: Vec<CartEntry>,
    pub totals: Totals,
    pub image_host: String,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: usize,
}

/// Join the cart cookie against the catalog.
///
/// Ids with no catalog match are dropped silently. Returns the surviving
/// entries and, when the normalized serialization differs from what the
/// browser sent, a corrective `Set-Cookie` (session-scoped, or a deletion
/// when nothing survives).
async fn load_entries(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Vec<CartEntry>, Option<HeaderValue>)> {
    let raw = cookies::get(headers, cookies::CART).unwrap_or_default();
    if raw.is_empty() {
        return Ok((Vec::new(), None));
    }

    let ids = cart::parse_ids(&raw);
    let catalog = state.api().catalog().await?;
    let entries = cart::build_entries(&ids, &catalog);

    let rewrite = match cart::serialize_ids(&entries) {
        Some(normalized) if normalized == raw => None,
        Some(normalized) => Some(cookies::session_scoped(cookies::CART, &normalized)?),
        None => Some(cookies::delete(cookies::CART)?),
    };

    Ok((entries, rewrite))
}

/// Serialize entries back into the cookie: a session-scoped write, or a
/// deletion when the cart has emptied.
fn store_entries(entries: &[CartEntry]) -> Result<HeaderValue> {
    let cookie = match cart::serialize_ids(entries) {
        Some(serialized) => cookies::session_scoped(cookies::CART, &serialized)?,
        None => cookies::delete(cookies::CART)?,
    };
    Ok(cookie)
}

fn items_fragment(
    state: &AppState,
    entries: Vec<CartEntry>,
    cookie: HeaderValue,
) -> Response {
    let totals = Totals::compute(&entries);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            entries,
            totals,
            image_host: state.image_host().to_string(),
        },
    )
        .into_response()
}

/// Display the cart page.
#[instrument(skip(state, identity, headers))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    headers: HeaderMap,
) -> Result<Response> {
    let (entries, rewrite) = load_entries(&state, &headers).await?;
    let totals = Totals::compute(&entries);

    let page = CartShowTemplate {
        identity,
        entries,
        totals,
        image_host: state.image_host().to_string(),
    };

    Ok(match rewrite {
        Some(cookie) => (AppendHeaders([(SET_COOKIE, cookie)]), page).into_response(),
        None => page.into_response(),
    })
}

/// Set the quantity of a cart line (HTMX).
///
/// Quantities below 1 are ignored; removal goes through [`remove`].
#[instrument(skip(state, headers))]
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let (mut entries, _) = load_entries(&state, &headers).await?;
    cart::set_quantity(&mut entries, form.product_id, form.quantity);
    let cookie = store_entries(&entries)?;
    Ok(items_fragment(&state, entries, cookie))
}

/// Remove a product from the cart entirely (HTMX).
#[instrument(skip(state, headers))]
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let (mut entries, _) = load_entries(&state, &headers).await?;
    cart::remove(&mut entries, form.product_id);
    let cookie = store_entries(&entries)?;
    Ok(items_fragment(&state, entries, cookie))
}

/// Get the cart count badge (HTMX). Counts units, not lines.
#[instrument(skip(headers))]
pub async fn count(headers: HeaderMap) -> impl IntoResponse {
    let count = cookies::get(&headers, cookies::CART)
        .map(|raw| cart::unit_count(&raw))
        .unwrap_or(0);

    CartCountTemplate { count }
}

/// Record the displayed totals and move on to checkout.
///
/// The subtotal, estimated tax, and total shown on the cart page are handed
/// to the checkout view through short-lived cookies, so both pages present
/// the same numbers. Checkout itself enforces authentication.
#[instrument(skip(state, headers))]
pub async fn begin_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let (entries, _) = load_entries(&state, &headers).await?;
    if entries.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let totals = Totals::compute(&entries);
    let handoff = [
        (cookies::SUBTOTAL, totals.subtotal),
        (cookies::ESTIMATED_TAX, totals.tax),
        (cookies::TOTAL, totals.total),
    ];

    let mut response = Redirect::to("/checkout").into_response();
    for (name, amount) in handoff {
        let cookie =
            cookies::persistent(name, &format!("{amount:.2}"), cookies::HANDOFF_EXPIRY)?;
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}
