//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Formats a dollar amount for display, e.g. `12.5` becomes `$12.50`.
///
/// Usage in templates: `{{ product.cost|money }}`
#[askama::filter_fn]
pub fn money(amount: impl std::borrow::Borrow<f64>, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!("${:.2}", amount.borrow()))
}

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

#[cfg(test)]
mod tests {
    #[test]
    fn money_pads_to_two_decimals() {
        assert_eq!(format!("${:.2}", 12.5_f64), "$12.50");
        assert_eq!(format!("${:.2}", 28.749_999_999_f64), "$28.75");
    }
}
