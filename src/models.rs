//! Core data models shared across the alerting pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A storefront locale the pipeline monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    /// The UK outlet (`en-GB`).
    #[serde(rename = "en-GB")]
    EnGb,
    /// The Norway outlet (`nb-NO`).
    #[serde(rename = "nb-NO")]
    NbNo,
}

impl Locale {
    /// All locales the pipeline supports.
    pub const ALL: [Locale; 2] = [Locale::EnGb, Locale::NbNo];

    /// The BCP 47 language tag, also used as the `Accept-Language` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::EnGb => "en-GB",
            Locale::NbNo => "nb-NO",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of difference detected between two snapshots of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The product was not present in the previous catalog.
    New,
    /// At least one size is available that was not available before.
    Restock,
    /// The current price is lower than the previously observed price.
    PriceDrop,
}

impl ChangeKind {
    /// Stable lower-case label used in logs and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Restock => "restock",
            ChangeKind::PriceDrop => "price_drop",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable observation of one product at fetch time.
///
/// Product identity is the `(url, locale)` pair, never the name: names may be
/// edited upstream without constituting a change. A newer snapshot with the
/// same identity supersedes this one; snapshots are never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Display name of the product.
    pub name: String,
    /// Canonical absolute product URL. Identity key together with `locale`.
    pub url: String,
    /// Current (discounted) price.
    pub price: f64,
    /// Original pre-discount price.
    pub original_price: f64,
    /// Derived discount percentage, clamped to >= 0.
    pub discount_pct: f64,
    /// Raw size labels as the storefront lists them; vocabulary is
    /// locale-specific and only normalized at matching time.
    pub available_sizes: Vec<String>,
    /// Category label, explicit or inferred from the name.
    pub category: String,
    /// Absolute product image URL, empty when the card has no image.
    pub image_url: String,
    /// The locale this product was observed under.
    pub locale: Locale,
    /// Observation timestamp.
    pub scraped_at: DateTime<Utc>,
}

/// One detected difference between two snapshots of the same product.
///
/// A single catalog update can produce more than one change for the same
/// product (e.g. a simultaneous restock and price drop); those are emitted as
/// independent records, never combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductChange {
    /// What changed.
    pub kind: ChangeKind,
    /// The previously observed snapshot; `None` for a brand-new product.
    pub previous_state: Option<ProductSnapshot>,
    /// The snapshot that triggered the change.
    pub new_state: ProductSnapshot,
}

/// Per-subscriber alerting preferences. Owned by the subscriber record and
/// read-only to this pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// The subscriber's home locale; alerts are only produced for changes
    /// observed under it.
    #[serde(default = "default_region")]
    pub region: Locale,
    /// Category label to the single preferred size for that category.
    /// Categories absent from the map carry no size preference.
    #[serde(default)]
    pub size_map: BTreeMap<String, String>,
    /// Free-text terms fuzzy-matched against product names. Empty means
    /// every product matches.
    #[serde(default)]
    pub watchlist_terms: Vec<String>,
    /// Price ceiling; `None` means unbounded.
    #[serde(default)]
    pub max_price: Option<f64>,
}

fn default_region() -> Locale {
    Locale::EnGb
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            region: default_region(),
            size_map: BTreeMap::new(),
            watchlist_terms: Vec::new(),
            max_price: None,
        }
    }
}

/// The delivery platform of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// A browser push subscription.
    Web,
    /// An iOS device token.
    Ios,
}

/// A subscriber's delivery endpoint, owned by the external device
/// registration subsystem; the pipeline only reads it at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Opaque per-channel token. For web devices this is the serialized push
    /// subscription descriptor; for iOS devices the APNs device token.
    pub token: String,
    /// Which channel the token belongs to.
    pub platform: Platform,
}

/// A subscriber together with the point-in-time device list read for one
/// dispatch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Stable subscriber identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Delivery address for the mail channel; every subscriber has one.
    pub email: String,
    /// Alerting preferences.
    #[serde(default)]
    pub preferences: UserPreferences,
    /// Registered delivery devices.
    #[serde(default)]
    pub devices: Vec<DeviceRegistration>,
}

/// The classification label attached to a change that survived preference
/// filtering. Fixed vocabulary, ordered here from highest to lowest priority
/// within each change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedRule {
    /// The subscriber's exact preferred size was among the restocked sizes.
    RestockExactSize,
    /// A restock without the preferred size among the restocked ones.
    Restock,
    /// A price drop while the preferred size is currently available.
    PriceDropInSize,
    /// A price drop without the preferred size available.
    PriceDrop,
    /// A new product listed with the preferred size available.
    NewProductInSize,
    /// A new product without the preferred size available.
    NewProduct,
}

impl MatchedRule {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedRule::RestockExactSize => "restock_exact_size",
            MatchedRule::Restock => "restock",
            MatchedRule::PriceDropInSize => "price_drop_in_size",
            MatchedRule::PriceDrop => "price_drop",
            MatchedRule::NewProductInSize => "new_product_in_size",
            MatchedRule::NewProduct => "new_product",
        }
    }
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The output of a successful match, consumed immediately by dispatch and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// The subscriber the alert is addressed to.
    pub subscriber_id: Uuid,
    /// The change that triggered the alert.
    pub change: ProductChange,
    /// The resolved classification label.
    pub matched_rule: MatchedRule,
}
