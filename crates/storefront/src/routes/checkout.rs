//! Checkout route handlers.
//!
//! Checkout requires an authenticated customer; anonymous requests are
//! redirected to login and return here afterwards. The form collects a
//! shipping address and payment details, validates them server-side, and
//! submits the purchase together with the raw cart cookie. A successful
//! purchase clears the cart and the totals hand-off cookies.

use std::sync::LazyLock;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::instrument;

use maple_market_core::{Totals, cart};

use crate::api::types::{Identity, PurchaseRequest};
use crate::cookies;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Shipping is domestic only.
const COUNTRY: &str = "Canada";

static POSTAL_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9]+$").unwrap()
});
static CREDIT_CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d{16}$").unwrap()
});
static CREDIT_EXPIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").unwrap()
});
static CREDIT_CVV_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d{3}$").unwrap()
});

/// Checkout form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub credit_card: String,
    #[serde(default)]
    pub credit_expire: String,
    #[serde(default)]
    pub credit_cvv: String,
}

/// Field-level validation messages, `None` meaning the field passed.
#[derive(Debug, Default)]
pub struct CheckoutErrors {
    pub street: Option<&'static str>,
    pub city: Option<&'static str>,
    pub province: Option<&'static str>,
    pub postal_code: Option<&'static str>,
    pub credit_card: Option<&'static str>,
    pub credit_expire: Option<&'static str>,
    pub credit_cvv: Option<&'static str>,
}

impl CheckoutErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.province.is_none()
            && self.postal_code.is_none()
            && self.credit_card.is_none()
            && self.credit_expire.is_none()
            && self.credit_cvv.is_none()
    }
}

/// Validate the checkout form.
///
/// `now_month`/`now_year` are the current month and two-digit year, passed
/// in so the expiry check is testable.
fn validate(form: &CheckoutForm, now_month: u32, now_year: u32) -> CheckoutErrors {
    let mut errors = CheckoutErrors::default();

    if form.street.trim().is_empty() {
        errors.street = Some("Street address is required.");
    }
    if form.city.trim().is_empty() {
        errors.city = Some("City is required.");
    }
    if form.province.trim().is_empty() {
        errors.province = Some("Province is required.");
    }

    if form.postal_code.trim().is_empty() {
        errors.postal_code = Some("Postal code is required.");
    } else if !POSTAL_CODE_RE.is_match(&form.postal_code) {
        errors.postal_code = Some("Postal code can only contain letters and numbers.");
    }

    if form.credit_card.trim().is_empty() {
        errors.credit_card = Some("Credit card number is required.");
    } else if !CREDIT_CARD_RE.is_match(&form.credit_card) {
        errors.credit_card = Some("Credit card number must be 16 digits.");
    }

    if form.credit_expire.trim().is_empty() {
        errors.credit_expire = Some("Expiration date is required.");
    } else if !CREDIT_EXPIRE_RE.is_match(&form.credit_expire) {
        errors.credit_expire = Some("Expiration date must be in MM/YY format.");
    } else if expiry_in_past(&form.credit_expire, now_month, now_year) {
        errors.credit_expire = Some("Expiration date cannot be in the past.");
    }

    if form.credit_cvv.trim().is_empty() {
        errors.credit_cvv = Some("CVV is required.");
    } else if !CREDIT_CVV_RE.is_match(&form.credit_cvv) {
        errors.credit_cvv = Some("CVV must be 3 digits.");
    }

    errors
}

/// An `MM/YY` value already validated against [`CREDIT_EXPIRE_RE`]; a card
/// expiring this month is still valid.
fn expiry_in_past(value: &str, now_month: u32, now_year: u32) -> bool {
    let mut parts = value.split('/');
    let (Some(month), Some(year)) = (parts.next(), parts.next()) else {
        return true;
    };
    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<u32>()) else {
        return true;
    };
    year < now_year || (year == now_year && month < now_month)
}

fn now_month_year() -> (u32, u32) {
    let today = Utc::now();
    let year = u32::try_from(today.year().rem_euclid(100)).unwrap_or(0);
    (today.month(), year)
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/form.html")]
pub struct CheckoutTemplate {
    pub identity: Option<Identity>,
    pub form: CheckoutForm,
    pub errors: CheckoutErrors,
    /// Top-of-form failure message from a rejected purchase.
    pub status: Option<String>,
    pub country: &'static str,
    pub subtotal: String,
    pub estimated_tax: String,
    pub total: String,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub identity: Option<Identity>,
}

/// The totals displayed above the form, as two-decimal strings.
struct DisplayTotals {
    subtotal: String,
    estimated_tax: String,
    total: String,
}

/// Resolve the totals to display: the hand-off cookies written by the cart
/// view when all three are present, otherwise recomputed from the cart
/// cookie (the hand-off is short-lived, and `/checkout` can be reached
/// directly).
async fn display_totals(state: &AppState, headers: &HeaderMap) -> Result<DisplayTotals> {
    let handoff = (
        cookies::get(headers, cookies::SUBTOTAL),
        cookies::get(headers, cookies::ESTIMATED_TAX),
        cookies::get(headers, cookies::TOTAL),
    );
    if let (Some(subtotal), Some(estimated_tax), Some(total)) = handoff {
        return Ok(DisplayTotals {
            subtotal,
            estimated_tax,
            total,
        });
    }

    let raw = cookies::get(headers, cookies::CART).unwrap_or_default();
    let catalog = state.api().catalog().await?;
    let entries = cart::build_entries(&cart::parse_ids(&raw), &catalog);
    let totals = Totals::compute(&entries);
    Ok(DisplayTotals {
        subtotal: format!("{:.2}", totals.subtotal),
        estimated_tax: format!("{:.2}", totals.tax),
        total: format!("{:.2}", totals.total),
    })
}

fn checkout_template(
    totals: DisplayTotals,
    identity: Identity,
    form: CheckoutForm,
    errors: CheckoutErrors,
    status: Option<String>,
) -> CheckoutTemplate {
    CheckoutTemplate {
        identity: Some(identity),
        form,
        errors,
        status,
        country: COUNTRY,
        subtotal: totals.subtotal,
        estimated_tax: totals.estimated_tax,
        total: totals.total,
    }
}

/// Display the checkout form. An empty cart goes back to the cart page.
#[instrument(skip(state, identity, headers))]
pub async fn checkout_page(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
) -> Result<Response> {
    if cookies::get(&headers, cookies::CART).is_none_or(|raw| raw.is_empty()) {
        return Ok(Redirect::to("/cart").into_response());
    }

    let totals = display_totals(&state, &headers).await?;
    Ok(checkout_template(
        totals,
        identity,
        CheckoutForm::default(),
        CheckoutErrors::default(),
        None,
    )
    .into_response())
}

/// Submit the purchase.
///
/// Validation failures re-render the form with field messages and the
/// submitted values intact. A rejection from the commerce API is shown
/// verbatim at the top of the form; the cart is only cleared once the API
/// accepts the order.
#[instrument(skip(state, identity, headers, form))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let Some(raw_cart) = cookies::get(&headers, cookies::CART).filter(|raw| !raw.is_empty())
    else {
        return Ok(Redirect::to("/cart").into_response());
    };

    let (now_month, now_year) = now_month_year();
    let errors = validate(&form, now_month, now_year);
    if !errors.is_empty() {
        let totals = display_totals(&state, &headers).await?;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            checkout_template(totals, identity, form, errors, None),
        )
            .into_response());
    }

    let Some(session) = cookies::upstream_session(&headers) else {
        return Ok(Redirect::to("/login?return_to=%2Fcheckout").into_response());
    };

    let request = PurchaseRequest {
        customer_id: identity.customer_id,
        street: form.street.clone(),
        city: form.city.clone(),
        province: form.province.clone(),
        country: COUNTRY.to_string(),
        postal_code: form.postal_code.clone(),
        credit_card: form.credit_card.clone(),
        credit_expire: form.credit_expire.clone(),
        credit_cvv: form.credit_cvv.clone(),
        cart: raw_cart,
    };

    match state.api().purchase(&request, &session).await {
        Ok(()) => {
            let mut response = Redirect::to("/confirmation").into_response();
            for name in [
                cookies::CART,
                cookies::SUBTOTAL,
                cookies::ESTIMATED_TAX,
                cookies::TOTAL,
            ] {
                response.headers_mut().append(SET_COOKIE, cookies::delete(name)?);
            }
            Ok(response)
        }
        Err(crate::api::ApiError::Rejected(message)) => {
            let totals = display_totals(&state, &headers).await?;
            Ok(checkout_template(
                totals,
                identity,
                form,
                CheckoutErrors::default(),
                Some(message),
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Display the order confirmation page.
#[instrument(skip(identity))]
pub async fn confirmation(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
    ConfirmationTemplate {
        identity: Some(identity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CheckoutForm {
        CheckoutForm {
            street: "123 Maple St".to_string(),
            city: "Toronto".to_string(),
            province: "ON".to_string(),
            postal_code: "M5V2T6".to_string(),
            credit_card: "4111111111111111".to_string(),
            credit_expire: "12/99".to_string(),
            credit_cvv: "123".to_string(),
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(validate(&valid_form(), 6, 26).is_empty());
    }

    #[test]
    fn required_fields_each_report() {
        let errors = validate(&CheckoutForm::default(), 6, 26);
        assert_eq!(errors.street, Some("Street address is required."));
        assert_eq!(errors.city, Some("City is required."));
        assert_eq!(errors.province, Some("Province is required."));
        assert_eq!(errors.postal_code, Some("Postal code is required."));
        assert_eq!(errors.credit_card, Some("Credit card number is required."));
        assert_eq!(errors.credit_expire, Some("Expiration date is required."));
        assert_eq!(errors.credit_cvv, Some("CVV is required."));
    }

    #[test]
    fn postal_code_rejects_punctuation() {
        let mut form = valid_form();
        form.postal_code = "M5V 2T6".to_string();
        let errors = validate(&form, 6, 26);
        assert_eq!(
            errors.postal_code,
            Some("Postal code can only contain letters and numbers.")
        );
    }

    #[test]
    fn credit_card_must_be_sixteen_digits() {
        let mut form = valid_form();
        form.credit_card = "4111-1111-1111-1111".to_string();
        let errors = validate(&form, 6, 26);
        assert_eq!(
            errors.credit_card,
            Some("Credit card number must be 16 digits.")
        );
    }

    #[test]
    fn expiry_format_enforced() {
        let mut form = valid_form();
        form.credit_expire = "13/25".to_string();
        let errors = validate(&form, 6, 26);
        assert_eq!(
            errors.credit_expire,
            Some("Expiration date must be in MM/YY format.")
        );
    }

    #[test]
    fn expiry_in_past_rejected() {
        let mut form = valid_form();
        form.credit_expire = "05/26".to_string();
        let errors = validate(&form, 6, 26);
        assert_eq!(
            errors.credit_expire,
            Some("Expiration date cannot be in the past.")
        );
    }

    #[test]
    fn expiry_current_month_accepted() {
        let mut form = valid_form();
        form.credit_expire = "06/26".to_string();
        assert!(validate(&form, 6, 26).is_empty());
    }

    #[test]
    fn cvv_must_be_three_digits() {
        let mut form = valid_form();
        form.credit_cvv = "12a".to_string();
        let errors = validate(&form, 6, 26);
        assert_eq!(errors.credit_cvv, Some("CVV must be 3 digits."));
    }
}
