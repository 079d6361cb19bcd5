//! In-memory target client.
//!
//! Implements the same contract as the HTTP client against a local map.
//! Used by the end-to-end tests and as an offline target for rehearsing a
//! plan without any service. Clones share state, so a test can keep a
//! handle while the materializer owns the boxed client.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::target::{CreateOutcome, TargetClient};

#[derive(Debug, Default)]
struct MemoryState {
    databases: Mutex<BTreeMap<String, BTreeSet<String>>>,
    mutations: AtomicU64,
}

/// Shared-state in-memory target.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    state: Arc<MemoryState>,
}

impl MemoryTarget {
    /// Creates an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls made so far (database or collection
    /// creations that actually changed state).
    #[must_use]
    pub fn mutation_count(&self) -> u64 {
        self.state.mutations.load(Ordering::SeqCst)
    }

    /// Snapshot of the current databases and their collections.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.state
            .databases
            .lock()
            .expect("memory target lock poisoned")
            .iter()
            .map(|(db, colls)| (db.clone(), colls.iter().cloned().collect()))
            .collect()
    }

    /// Pre-populate a collection, for tests exercising existing targets.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn seed(&self, database: &str, collection: &str) {
        self.state
            .databases
            .lock()
            .expect("memory target lock poisoned")
            .entry(database.to_string())
            .or_default()
            .insert(collection.to_string());
    }
}

#[async_trait]
impl TargetClient for MemoryTarget {
    fn target_type(&self) -> &'static str {
        "memory"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn create_database(&self, database: &str) -> Result<()> {
        let mut databases = self
            .state
            .databases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !databases.contains_key(database) {
            databases.insert(database.to_string(), BTreeSet::new());
            self.state.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<CreateOutcome> {
        let mut databases = self
            .state
            .databases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let inserted = databases
            .entry(database.to_string())
            .or_default()
            .insert(collection.to_string());
        if inserted {
            self.state.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExisted)
        }
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let databases = self
            .state
            .databases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(databases
            .get(database)
            .map(|colls| colls.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_list() {
        let target = MemoryTarget::new();
        target.create_database("db").await.unwrap();
        let outcome = target.create_collection("db", "coll").await.unwrap();
        assert_eq!(outcome, CreateOutcome::Created);

        let collections = target.list_collections("db").await.unwrap();
        assert_eq!(collections, vec!["coll"]);
    }

    #[tokio::test]
    async fn test_create_existing_collection_is_noop() {
        let target = MemoryTarget::new();
        target.create_collection("db", "coll").await.unwrap();
        let before = target.mutation_count();

        let outcome = target.create_collection("db", "coll").await.unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExisted);
        assert_eq!(target.mutation_count(), before);
    }

    #[tokio::test]
    async fn test_unknown_database_lists_empty() {
        let target = MemoryTarget::new();
        let collections = target.list_collections("missing").await.unwrap();
        assert!(collections.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let target = MemoryTarget::new();
        let handle = target.clone();
        target.create_collection("db", "coll").await.unwrap();
        assert_eq!(handle.snapshot()["db"], vec!["coll"]);
    }
}
