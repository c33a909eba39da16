//! The cart state machine.
//!
//! The persisted form of a cart is a flat comma-separated list of product
//! ids in which repetition encodes quantity: a product appearing three times
//! has quantity 3. The format carries no versioning and no escaping; it
//! assumes ids are small positive integers. Everything here is pure - cookie
//! transport lives in the storefront crate.

use std::collections::HashMap;

use crate::types::{Product, ProductId};

/// Sales tax rate applied to the cart subtotal.
pub const TAX_RATE: f64 = 0.15;

/// A cart line: one catalog record plus how many units of it are in the cart.
///
/// Quantity is always at least 1; dropping to zero removes the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEntry {
    pub product: Product,
    pub quantity: u32,
}

impl CartEntry {
    /// Cost of this line (unit cost times quantity), full precision.
    #[must_use]
    pub fn line_cost(&self) -> f64 {
        self.product.cost * f64::from(self.quantity)
    }
}

/// Derived checkout totals. Pure function of the entry list - no hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Totals {
    /// Compute subtotal, tax, and total over the given entries.
    ///
    /// Values stay full-precision f64; rounding to cents is a display
    /// concern.
    #[must_use]
    pub fn compute(entries: &[CartEntry]) -> Self {
        let subtotal: f64 = entries.iter().map(CartEntry::line_cost).sum();
        let tax = subtotal * TAX_RATE;
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Parse the persisted id list.
///
/// Tokens that do not parse as integers are dropped rather than surfaced;
/// a malformed cookie must never take down the cart view.
#[must_use]
pub fn parse_ids(raw: &str) -> Vec<ProductId> {
    raw.split(',')
        .filter_map(|token| token.trim().parse::<ProductId>().ok())
        .collect()
}

/// Serialize entries back to the persisted id list, repeating each product id
/// `quantity` times. Returns `None` for an empty cart: the caller deletes the
/// cookie instead of persisting an empty string.
#[must_use]
pub fn serialize_ids(entries: &[CartEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let ids: Vec<String> = entries
        .iter()
        .flat_map(|entry| {
            std::iter::repeat_n(entry.product.product_id.to_string(), entry.quantity as usize)
        })
        .collect();
    Some(ids.join(","))
}

/// Join parsed ids against the catalog to build cart entries.
///
/// Occurrence counts become quantities. Ids with no matching catalog record
/// are silently dropped (lenient join): a stale cookie shrinks the cart, it
/// never errors. Entries come out in catalog order.
#[must_use]
pub fn build_entries(ids: &[ProductId], catalog: &[Product]) -> Vec<CartEntry> {
    let mut counts: HashMap<ProductId, u32> = HashMap::new();
    for id in ids {
        *counts.entry(*id).or_insert(0) += 1;
    }

    catalog
        .iter()
        .filter_map(|product| {
            counts.get(&product.product_id).map(|&quantity| CartEntry {
                product: product.clone(),
                quantity,
            })
        })
        .collect()
}

/// Set the quantity of the matching entry.
///
/// A target below 1 is a no-op - the quantity floor is enforced here, and
/// removal is the only way to reach zero. Unknown ids are ignored.
pub fn set_quantity(entries: &mut Vec<CartEntry>, product_id: ProductId, quantity: u32) {
    if quantity < 1 {
        return;
    }
    if let Some(entry) = entries
        .iter_mut()
        .find(|entry| entry.product.product_id == product_id)
    {
        entry.quantity = quantity;
    }
}

/// Remove the matching entry entirely.
pub fn remove(entries: &mut Vec<CartEntry>, product_id: ProductId) {
    entries.retain(|entry| entry.product.product_id != product_id);
}

/// Append one occurrence of `product_id` to a raw id list, preserving the
/// existing order. No dedup: repeated addition raises quantity by one each
/// time.
#[must_use]
pub fn append_id(raw: Option<&str>, product_id: ProductId) -> String {
    let mut ids: Vec<String> = raw
        .map(|existing| parse_ids(existing).iter().map(ToString::to_string).collect())
        .unwrap_or_default();
    ids.push(product_id.to_string());
    ids.join(",")
}

/// Total number of units across an id list (the cart badge count).
#[must_use]
pub fn unit_count(raw: &str) -> usize {
    parse_ids(raw).len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, cost: f64) -> Product {
        Product {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            cost,
            filename: format!("{id}.jpg"),
            description: String::new(),
        }
    }

    fn entries_from(raw: &str, catalog: &[Product]) -> Vec<CartEntry> {
        build_entries(&parse_ids(raw), catalog)
    }

    #[test]
    fn repeated_addition_encodes_quantity() {
        let raw = append_id(None, ProductId::new(1));
        let raw = append_id(Some(&raw), ProductId::new(1));
        let raw = append_id(Some(&raw), ProductId::new(2));
        assert_eq!(raw, "1,1,2");

        let catalog = [product(1, 10.0), product(2, 5.0)];
        let entries = entries_from(&raw, &catalog);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].product.product_id, ProductId::new(1));
        assert_eq!(entries[0].quantity, 2);
        assert_eq!(entries[1].quantity, 1);
    }

    #[test]
    fn set_quantity_zero_is_a_no_op() {
        let catalog = [product(1, 10.0)];
        let mut entries = entries_from("1,1", &catalog);
        set_quantity(&mut entries, ProductId::new(1), 0);
        assert_eq!(entries[0].quantity, 2);

        set_quantity(&mut entries, ProductId::new(1), 5);
        assert_eq!(entries[0].quantity, 5);
    }

    #[test]
    fn set_quantity_ignores_unknown_id() {
        let catalog = [product(1, 10.0)];
        let mut entries = entries_from("1", &catalog);
        set_quantity(&mut entries, ProductId::new(99), 3);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, 1);
    }

    #[test]
    fn remove_then_round_trip_reproduces_remaining_entries() {
        let catalog = [product(1, 10.0), product(2, 5.0), product(3, 2.0)];
        let mut entries = entries_from("1,2,1,3", &catalog);
        remove(&mut entries, ProductId::new(2));

        let raw = serialize_ids(&entries).unwrap();
        let reloaded = entries_from(&raw, &catalog);
        assert_eq!(reloaded, entries);
        assert_eq!(raw, "1,1,3");
    }

    #[test]
    fn serialization_of_empty_cart_signals_cookie_deletion() {
        let catalog = [product(1, 10.0)];
        let mut entries = entries_from("1", &catalog);
        remove(&mut entries, ProductId::new(1));
        assert!(entries.is_empty());
        assert_eq!(serialize_ids(&entries), None);
    }

    #[test]
    fn totals_match_fixed_rate() {
        let entries = vec![
            CartEntry {
                product: product(1, 10.0),
                quantity: 2,
            },
            CartEntry {
                product: product(2, 5.0),
                quantity: 1,
            },
        ];
        let totals = Totals::compute(&entries);
        assert!((totals.subtotal - 25.0).abs() < 1e-9);
        assert!((totals.tax - 3.75).abs() < 1e-9);
        assert!((totals.total - 28.75).abs() < 1e-9);
    }

    #[test]
    fn totals_of_empty_cart_are_zero() {
        let totals = Totals::compute(&[]);
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn stale_ids_are_silently_dropped() {
        let catalog = [product(1, 10.0)];
        let entries = entries_from("1,404,404", &catalog);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product.product_id, ProductId::new(1));

        let totals = Totals::compute(&entries);
        assert!((totals.subtotal - 10.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_tokens_are_dropped() {
        assert_eq!(
            parse_ids("1, 2,junk,,3"),
            vec![ProductId::new(1), ProductId::new(2), ProductId::new(3)]
        );
        assert!(parse_ids("").is_empty());
    }

    #[test]
    fn unit_count_counts_repetitions() {
        assert_eq!(unit_count("1,1,2"), 3);
        assert_eq!(unit_count(""), 0);
    }
}
