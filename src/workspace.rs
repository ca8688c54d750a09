//! Loading and saving engine state through a [`Store`]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::collection::{parse_collections, Collection};
use crate::cookies::CookieJar;
use crate::environment::{Environment, EnvironmentStore};
use crate::errors::Result;
use crate::history::{self, HistoryEntry};
use crate::store::{self, Store};

/// Typed view over the persisted keys
#[derive(Clone)]
pub struct Workspace {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").finish_non_exhaustive()
    }
}

impl Workspace {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn load_environments(&self) -> Result<EnvironmentStore> {
        let environments: Vec<Environment> =
            store::load_as(self.store(), store::ENVIRONMENTS)?.unwrap_or_default();
        let active: usize = store::load_as(self.store(), store::ACTIVE_ENVIRONMENT)?.unwrap_or(0);
        Ok(EnvironmentStore::new(environments, active))
    }

    /// Persist environment variables; the active index is saved separately
    pub fn save_environments(&self, env: &EnvironmentStore) -> Result<()> {
        store::save_as(self.store(), store::ENVIRONMENTS, env.environments())
    }

    pub fn save_active_environment(&self, env: &EnvironmentStore) -> Result<()> {
        store::save_as(self.store(), store::ACTIVE_ENVIRONMENT, &env.active_index())
    }

    pub fn load_cookies(&self) -> Result<CookieJar> {
        Ok(store::load_as(self.store(), store::COOKIES)?.unwrap_or_default())
    }

    pub fn save_cookies(&self, jar: &CookieJar) -> Result<()> {
        store::save_as(self.store(), store::COOKIES, jar)
    }

    pub fn load_collections(&self) -> Result<Vec<Collection>> {
        Ok(store::load_as(self.store(), store::COLLECTIONS)?.unwrap_or_default())
    }

    pub fn save_collections(&self, collections: &[Collection]) -> Result<()> {
        store::save_as(self.store(), store::COLLECTIONS, collections)
    }

    /// Entries newest first
    pub fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(store::load_as(self.store(), store::HISTORY)?.unwrap_or_default())
    }

    pub fn record_history(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.load_history()?;
        history::push(&mut entries, entry);
        store::save_as(self.store(), store::HISTORY, &entries)
    }

    pub fn clear_history(&self) -> Result<()> {
        store::save_as(self.store(), store::HISTORY, &Vec::<HistoryEntry>::new())
    }

    /// Append the collections in `path` and return how many were added
    pub fn import(&self, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path)?;
        let imported = parse_collections(&text)?;
        let count = imported.len();

        let mut collections = self.load_collections()?;
        collections.extend(imported);
        self.save_collections(&collections)?;

        info!(path = %path.display(), count, "imported collections");
        Ok(count)
    }
}
