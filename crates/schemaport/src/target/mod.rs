//! Target document-database clients.
//!
//! The materializer talks to the destination through the [`TargetClient`]
//! trait, keeping schema reconciliation independent of the wire protocol.
//! `DataApiClient` is the HTTP implementation; `MemoryTarget` is a local
//! implementation used for offline runs and tests.

pub mod data_api;
pub mod memory;

use async_trait::async_trait;

use crate::config::TargetSettings;
use crate::error::Result;

pub use data_api::DataApiClient;
pub use memory::MemoryTarget;

/// Outcome of a create-collection call.
///
/// Creating a collection that already exists is a no-op success: the
/// client's job is "ensure schema state", not "create exactly once".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The collection did not exist and was created.
    Created,
    /// The collection was already present on the target.
    AlreadyExisted,
}

/// Trait for target database clients.
///
/// All failures map to connection-, permission- or operation-scoped
/// errors so the materializer can translate them into per-collection
/// statuses.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Short name of the client implementation.
    fn target_type(&self) -> &'static str;

    /// Validate reachability and credentials before any materialization.
    async fn connect(&mut self) -> Result<()>;

    /// Ensure a database exists on the target. Idempotent.
    async fn create_database(&self, database: &str) -> Result<()>;

    /// Ensure a collection exists in a database. Idempotent.
    async fn create_collection(&self, database: &str, collection: &str)
        -> Result<CreateOutcome>;

    /// List the collections currently present in a database. An unknown
    /// database yields an empty list.
    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    /// Release the connection. Called on every exit path of a run.
    async fn close(&mut self) -> Result<()>;
}

/// Create the default HTTP client from target settings.
///
/// # Errors
///
/// Returns `Error::Config` when the settings fail validation.
pub fn create_client(settings: TargetSettings) -> Result<Box<dyn TargetClient>> {
    settings.validate()?;
    Ok(Box::new(DataApiClient::new(settings)))
}
