//! Catalog product record.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::id::ProductId;

/// A purchasable product as served by the remote catalog.
///
/// `cost` is a full-precision f64; rounding to currency precision happens
/// only at display time. The backend serializes its decimal column as either
/// a JSON number or a string depending on the driver, so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    #[serde(deserialize_with = "cost_from_number_or_string")]
    pub cost: f64,
    pub filename: String,
    #[serde(default)]
    pub description: String,
}

/// Accept a unit cost as a JSON number or a decimal string.
fn cost_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCost {
        Number(f64),
        Text(String),
    }

    match RawCost::deserialize(deserializer)? {
        RawCost::Number(n) => Ok(n),
        RawCost::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Product {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn cost_as_number() {
        let product = parse(
            r#"{"product_id": 3, "name": "Maple Syrup", "cost": 12.5, "filename": "syrup.jpg", "description": "Dark amber"}"#,
        );
        assert_eq!(product.product_id, ProductId::new(3));
        assert!((product.cost - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn cost_as_decimal_string() {
        let product = parse(
            r#"{"product_id": 3, "name": "Maple Syrup", "cost": "12.50", "filename": "syrup.jpg"}"#,
        );
        assert!((product.cost - 12.5).abs() < f64::EPSILON);
        assert_eq!(product.description, "");
    }

    #[test]
    fn cost_as_garbage_string_is_an_error() {
        let result: Result<Product, _> = serde_json::from_str(
            r#"{"product_id": 3, "name": "Maple Syrup", "cost": "free", "filename": "syrup.jpg"}"#,
        );
        assert!(result.is_err());
    }
}
