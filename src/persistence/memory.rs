//! In-process implementations of the storage seams.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use config::{Config, File};

use super::{
    error::PersistenceError,
    traits::{SnapshotStore, SubscriberDirectory},
};
use crate::models::{Locale, ProductSnapshot, Subscriber};

/// [`SnapshotStore`] holding each locale's latest snapshot set in memory.
///
/// Reference state survives across cycles within one process lifetime;
/// a restart starts from an empty store and the first cycle reports
/// everything as new.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    by_locale: RwLock<HashMap<Locale, Vec<ProductSnapshot>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn latest(&self, locale: Locale) -> Result<Vec<ProductSnapshot>, PersistenceError> {
        let by_locale = self.by_locale.read().unwrap_or_else(|e| e.into_inner());
        Ok(by_locale.get(&locale).cloned().unwrap_or_default())
    }

    async fn replace(
        &self,
        locale: Locale,
        products: &[ProductSnapshot],
    ) -> Result<(), PersistenceError> {
        let mut by_locale = self.by_locale.write().unwrap_or_else(|e| e.into_inner());
        by_locale.insert(locale, products.to_vec());
        Ok(())
    }
}

/// [`SubscriberDirectory`] reading a fixed subscriber list from a YAML
/// file at startup.
#[derive(Debug)]
pub struct StaticSubscriberDirectory {
    subscribers: Vec<Subscriber>,
}

impl StaticSubscriberDirectory {
    /// Creates a directory over an already loaded subscriber list.
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self { subscribers }
    }

    /// Loads the subscriber list from a YAML file with a top-level
    /// `subscribers` key. A missing file yields an empty directory so a
    /// fresh deployment can start without one.
    pub fn from_file(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Subscriber file not found; starting empty.");
            return Ok(Self::new(Vec::new()));
        }

        let load = |path: &Path| -> Result<Vec<Subscriber>, config::ConfigError> {
            Config::builder()
                .add_source(File::from(path))
                .build()?
                .get::<Vec<Subscriber>>("subscribers")
        };

        let subscribers = load(path).map_err(|source| PersistenceError::SubscriberFile {
            path: PathBuf::from(path),
            source,
        })?;
        tracing::info!(count = subscribers.len(), path = %path.display(), "Subscribers loaded.");
        Ok(Self::new(subscribers))
    }
}

#[async_trait::async_trait]
impl SubscriberDirectory for StaticSubscriberDirectory {
    async fn all_subscribers(&self) -> Result<Vec<Subscriber>, PersistenceError> {
        Ok(self.subscribers.clone())
    }
}
