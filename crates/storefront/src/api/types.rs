//! Request and response bodies for the remote commerce API.

use serde::{Deserialize, Serialize};

use maple_market_core::CustomerId;

/// The authenticated user's profile as returned by the session and login
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub customer_id: CustomerId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
}

/// Login form credentials, posted as JSON.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration fields. The API expects camelCase keys.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Purchase submission: customer, shipping address, payment fields, and the
/// serialized cart exactly as persisted in the cart cookie.
#[derive(Debug, Serialize)]
pub struct PurchaseRequest {
    pub customer_id: CustomerId,
    pub street: String,
    pub city: String,
    pub province: String,
    pub country: String,
    pub postal_code: String,
    pub credit_card: String,
    pub credit_expire: String,
    pub credit_cvv: String,
    pub cart: String,
}
