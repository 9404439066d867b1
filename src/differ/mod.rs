//! Change detection between two scrape cycles.

use std::collections::{BTreeSet, HashMap};

use crate::models::{ChangeKind, Locale, ProductChange, ProductSnapshot};

/// Compares two product lists and emits the changes between them.
///
/// `diff` is a pure function: output order follows the order of `new`, and a
/// product can emit both a restock and a price drop in the same cycle as two
/// separate records. Products that disappeared from `new` emit nothing.
#[derive(Debug, Default)]
pub struct ProductDiffer;

impl ProductDiffer {
    /// Creates a differ.
    pub fn new() -> Self {
        Self
    }

    /// Detects new products, restocked sizes and price drops in `new`
    /// relative to `old`. Products are identified by their (URL, locale)
    /// pair, never by name.
    pub fn diff(&self, old: &[ProductSnapshot], new: &[ProductSnapshot]) -> Vec<ProductChange> {
        let old_by_identity: HashMap<(&str, Locale), &ProductSnapshot> =
            old.iter().map(|p| ((p.url.as_str(), p.locale), p)).collect();

        let mut changes = Vec::new();

        for new_product in new {
            let Some(old_product) = old_by_identity.get(&(new_product.url.as_str(), new_product.locale))
            else {
                tracing::info!(
                    name = %new_product.name,
                    url = %new_product.url,
                    price = new_product.price,
                    "New product detected."
                );
                changes.push(ProductChange {
                    kind: ChangeKind::New,
                    previous_state: None,
                    new_state: new_product.clone(),
                });
                continue;
            };

            let old_sizes: BTreeSet<&str> =
                old_product.available_sizes.iter().map(String::as_str).collect();
            let restocked: Vec<&str> = new_product
                .available_sizes
                .iter()
                .map(String::as_str)
                .filter(|size| !old_sizes.contains(size))
                .collect();

            if !restocked.is_empty() {
                tracing::info!(
                    name = %new_product.name,
                    url = %new_product.url,
                    restocked_sizes = ?restocked,
                    "Restock detected."
                );
                changes.push(ProductChange {
                    kind: ChangeKind::Restock,
                    previous_state: Some((*old_product).clone()),
                    new_state: new_product.clone(),
                });
            }

            if new_product.price < old_product.price {
                tracing::info!(
                    name = %new_product.name,
                    url = %new_product.url,
                    old_price = old_product.price,
                    new_price = new_product.price,
                    "Price drop detected."
                );
                changes.push(ProductChange {
                    kind: ChangeKind::PriceDrop,
                    previous_state: Some((*old_product).clone()),
                    new_state: new_product.clone(),
                });
            }
        }

        tracing::info!(
            old_count = old.len(),
            new_count = new.len(),
            changes = changes.len(),
            "Diff complete."
        );
        changes
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snapshot(url: &str, price: f64, sizes: &[&str]) -> ProductSnapshot {
        ProductSnapshot {
            name: "Falketind Gore-Tex Jacket".to_string(),
            url: url.to_string(),
            price,
            original_price: 400.0,
            discount_pct: 0.0,
            available_sizes: sizes.iter().map(|s| s.to_string()).collect(),
            category: "Jackets".to_string(),
            image_url: String::new(),
            locale: Locale::EnGb,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn identical_sets_yield_no_changes() {
        let old = [snapshot("https://a/p/1", 280.0, &["S", "M"])];
        let new = [snapshot("https://a/p/1", 280.0, &["S", "M"])];
        assert!(ProductDiffer::new().diff(&old, &new).is_empty());
    }

    #[test]
    fn unknown_url_is_a_new_product() {
        let changes = ProductDiffer::new().diff(&[], &[snapshot("https://a/p/1", 280.0, &["M"])]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::New);
        assert!(changes[0].previous_state.is_none());
    }

    #[test]
    fn added_size_is_a_restock() {
        let old = [snapshot("https://a/p/1", 280.0, &["S"])];
        let new = [snapshot("https://a/p/1", 280.0, &["S", "M"])];

        let changes = ProductDiffer::new().diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Restock);
        assert_eq!(changes[0].previous_state.as_ref().unwrap().available_sizes, vec!["S"]);
    }

    #[test]
    fn removed_size_alone_emits_nothing() {
        let old = [snapshot("https://a/p/1", 280.0, &["S", "M"])];
        let new = [snapshot("https://a/p/1", 280.0, &["S"])];
        assert!(ProductDiffer::new().diff(&old, &new).is_empty());
    }

    #[test]
    fn lower_price_is_a_price_drop() {
        let old = [snapshot("https://a/p/1", 280.0, &["M"])];
        let new = [snapshot("https://a/p/1", 199.0, &["M"])];

        let changes = ProductDiffer::new().diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::PriceDrop);
    }

    #[test]
    fn higher_price_emits_nothing() {
        let old = [snapshot("https://a/p/1", 199.0, &["M"])];
        let new = [snapshot("https://a/p/1", 280.0, &["M"])];
        assert!(ProductDiffer::new().diff(&old, &new).is_empty());
    }

    #[test]
    fn restock_and_price_drop_are_separate_records() {
        let old = [snapshot("https://a/p/1", 280.0, &["S"])];
        let new = [snapshot("https://a/p/1", 199.0, &["S", "M"])];

        let changes = ProductDiffer::new().diff(&old, &new);
        let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Restock, ChangeKind::PriceDrop]);
    }

    #[test]
    fn delisted_product_emits_nothing() {
        let old = [snapshot("https://a/p/1", 280.0, &["M"])];
        assert!(ProductDiffer::new().diff(&old, &[]).is_empty());
    }

    #[test]
    fn same_url_in_another_locale_is_a_different_product() {
        let old = [snapshot("https://a/p/1", 280.0, &["M"])];
        let mut other = snapshot("https://a/p/1", 280.0, &["M"]);
        other.locale = Locale::NbNo;

        let changes = ProductDiffer::new().diff(&old, &[other]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::New);
    }

    #[test]
    fn output_follows_the_order_of_new() {
        let old = [snapshot("https://a/p/1", 280.0, &["M"])];
        let new = [
            snapshot("https://a/p/2", 100.0, &["S"]),
            snapshot("https://a/p/1", 199.0, &["M"]),
        ];

        let changes = ProductDiffer::new().diff(&old, &new);
        assert_eq!(changes[0].new_state.url, "https://a/p/2");
        assert_eq!(changes[1].new_state.url, "https://a/p/1");
    }
}
