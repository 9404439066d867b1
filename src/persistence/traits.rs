//! Seams to the storage subsystems the pipeline consumes.

use super::error::PersistenceError;
use crate::models::{Locale, ProductSnapshot, Subscriber};

/// Read/write access to the previously persisted snapshot sets, the
/// reference state each diff compares against.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The most recently persisted snapshot set for a locale. Empty when
    /// the locale has never been persisted.
    async fn latest(&self, locale: Locale) -> Result<Vec<ProductSnapshot>, PersistenceError>;

    /// Replaces the persisted snapshot set for a locale.
    async fn replace(
        &self,
        locale: Locale,
        products: &[ProductSnapshot],
    ) -> Result<(), PersistenceError>;
}

/// Read access to the subscriber base, owned by the excluded account
/// subsystem. Each cycle reads a point-in-time snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// All subscribers with their preferences and current device lists.
    async fn all_subscribers(&self) -> Result<Vec<Subscriber>, PersistenceError>;
}
