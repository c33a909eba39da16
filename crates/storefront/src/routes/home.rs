//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use maple_market_core::Product;

use crate::api::types::Identity;
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Home page template: the full product grid.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub identity: Option<Identity>,
    pub products: Vec<Product>,
    pub image_host: String,
}

/// Display the home page with the product catalog.
#[instrument(skip(state, identity))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
) -> Result<HomeTemplate> {
    let catalog = state.api().catalog().await?;

    Ok(HomeTemplate {
        identity,
        products: catalog.as_ref().clone(),
        image_host: state.image_host().to_string(),
    })
}
