//! Matching detected changes against subscriber preferences.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::{Alert, ChangeKind, MatchedRule, ProductChange, UserPreferences};

/// Minimum similarity score for a watchlist term to match a product name.
pub const FUZZY_MATCH_THRESHOLD: f64 = 80.0;

/// Long-form spellings that collapse to a canonical short size code, so that
/// "M" matches "Medium" and "Extra Large" matches "XL".
const SIZE_ALIASES: &[(&str, &[&str])] = &[
    ("xxs", &["xx-small", "extra extra small", "double extra small"]),
    ("xs", &["x-small", "extra small"]),
    ("s", &["small"]),
    ("m", &["medium", "med"]),
    ("l", &["large"]),
    ("xl", &["x-large", "extra large"]),
    ("xxl", &["xx-large", "extra extra large", "double extra large", "2xl"]),
    ("3xl", &["xxx-large", "xxxl", "triple extra large"]),
];

/// Normalizes a size string to its canonical short code. Unrecognized
/// tokens come back trimmed and lower-cased.
pub fn normalize_size(size: &str) -> String {
    let cleaned = size.trim().to_lowercase();
    for (short_code, aliases) in SIZE_ALIASES {
        if cleaned == *short_code || aliases.contains(&cleaned.as_str()) {
            return (*short_code).to_string();
        }
    }
    cleaned
}

fn sizes_match<S: AsRef<str>>(preferred: &str, available: &[S]) -> bool {
    let preferred = normalize_size(preferred);
    available.iter().any(|s| normalize_size(s.as_ref()) == preferred)
}

/// Token-set similarity between two strings, scored 0..=100.
///
/// Both strings are split into whitespace token sets; the score is the best
/// normalized edit-distance ratio among the intersection compared against
/// each side's full sorted token string. Shared tokens dominate, so word
/// order and extra words on one side barely cost anything.
fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let base = intersection.join(" ");
    let combined_a = join_nonempty(&base, &only_a.join(" "));
    let combined_b = join_nonempty(&base, &only_b.join(" "));

    let ratios = [
        strsim::normalized_levenshtein(&base, &combined_a),
        strsim::normalized_levenshtein(&base, &combined_b),
        strsim::normalized_levenshtein(&combined_a, &combined_b),
    ];
    ratios.into_iter().fold(0.0, f64::max) * 100.0
}

fn join_nonempty(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left} {right}"),
    }
}

/// The first watchlist term that matches the product name at or above the
/// similarity threshold.
fn matches_watchlist<'a>(product_name: &str, terms: &'a [String]) -> Option<&'a str> {
    let name = product_name.to_lowercase();
    terms
        .iter()
        .find(|term| token_set_ratio(&name, &term.to_lowercase()) >= FUZZY_MATCH_THRESHOLD)
        .map(String::as_str)
}

/// Matches product changes against one subscriber's preferences.
#[derive(Debug, Default)]
pub struct PreferenceMatcher;

impl PreferenceMatcher {
    /// Creates a matcher.
    pub fn new() -> Self {
        Self
    }

    /// Runs every change through the price gate, the watchlist gate and
    /// rule classification, emitting one alert per surviving change.
    pub fn match_changes(
        &self,
        changes: &[ProductChange],
        preferences: &UserPreferences,
        subscriber_id: Uuid,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for change in changes {
            let product = &change.new_state;

            if let Some(max_price) = preferences.max_price {
                if product.price > max_price {
                    tracing::debug!(
                        name = %product.name,
                        price = product.price,
                        max_price,
                        "Skipped; above price ceiling."
                    );
                    continue;
                }
            }

            let matched_term = matches_watchlist(&product.name, &preferences.watchlist_terms);
            if matched_term.is_none() && !preferences.watchlist_terms.is_empty() {
                tracing::debug!(name = %product.name, "Skipped; no watchlist match.");
                continue;
            }

            let matched_rule = determine_rule(change, preferences);
            tracing::info!(
                name = %product.name,
                kind = change.kind.as_str(),
                rule = matched_rule.as_str(),
                term = matched_term.unwrap_or(""),
                "Alert matched."
            );
            alerts.push(Alert { subscriber_id, change: change.clone(), matched_rule });
        }

        tracing::info!(changes = changes.len(), alerts = alerts.len(), "Matching complete.");
        alerts
    }
}

/// Classifies a surviving change into its alert rule.
///
/// A restock of the subscriber's exact preferred size outranks a general
/// restock; the exact-size check runs against the newly restocked sizes
/// specifically, not everything currently on the shelf.
fn determine_rule(change: &ProductChange, preferences: &UserPreferences) -> MatchedRule {
    let product = &change.new_state;
    let preferred_size = preferences.size_map.get(&product.category);
    let has_preferred_size = preferred_size
        .map(|size| sizes_match(size, &product.available_sizes))
        .unwrap_or(false);

    match change.kind {
        ChangeKind::Restock => {
            if let (true, Some(preferred)) = (has_preferred_size, preferred_size) {
                let old_sizes: BTreeSet<&str> = change
                    .previous_state
                    .as_ref()
                    .map(|p| p.available_sizes.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                let restocked: Vec<&str> = product
                    .available_sizes
                    .iter()
                    .map(String::as_str)
                    .filter(|size| !old_sizes.contains(size))
                    .collect();
                if sizes_match(preferred, &restocked) {
                    return MatchedRule::RestockExactSize;
                }
            }
            MatchedRule::Restock
        }
        ChangeKind::PriceDrop => {
            if has_preferred_size {
                MatchedRule::PriceDropInSize
            } else {
                MatchedRule::PriceDrop
            }
        }
        ChangeKind::New => {
            if has_preferred_size {
                MatchedRule::NewProductInSize
            } else {
                MatchedRule::NewProduct
            }
        }
    }
}
