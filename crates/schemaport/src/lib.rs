// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # schemaport
//!
//! `schemaport` is a CLI tool and library for replaying a document-database
//! schema onto a target service, starting from an HTML assessment report.
//!
//! ## Pipeline
//!
//! 1. **Extract** — parse the assessment report into an inventory of
//!    databases and collections (`parse-assessment`), written to a durable
//!    JSON file.
//! 2. **Review** — hand-edit the extracted JSON and the migration config
//!    as needed. This pause is deliberate: the edited files are the record
//!    of intent.
//! 3. **Materialize** — filter the inventory through the config and ensure
//!    each selected database/collection exists on the target
//!    (`generate-schema`), idempotently, with per-collection statuses.
//!
//! ## Quick Start
//!
//! ```bash
//! # Parse the assessment report
//! schemaport parse-assessment --input assessment.html --output schema.json
//!
//! # Review schema.json and migration.json, then rehearse:
//! schemaport generate-schema --schema schema.json --config migration.json --dry-run
//!
//! # Apply for real
//! schemaport generate-schema --schema schema.json --config migration.json
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "databases": {
//!     "sample_mflix": { "migrate": true, "collections": ["movies"] },
//!     "staging_junk": { "migrate": false, "collections": [] }
//!   },
//!   "options": { "create_indexes": false, "shard_collections": false, "dry_run": false },
//!   "target": { "database_prefix": "prod_" }
//! }
//! ```
//!
//! Target connectivity comes from the environment: `DEST_DATA_API_URL`,
//! `DEST_DATA_API_KEY`, and optionally `DEST_DATA_SOURCE` and
//! `TIMEOUT_SECONDS`.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod materialize;
pub mod retry;
pub mod schema;
pub mod target;

pub use config::{DatabaseRule, MigrationConfig, TargetSettings};
pub use error::{Error, Result};
pub use extract::{extract_records, Extraction};
pub use filter::build_plan;
pub use materialize::{CollectionStatus, MaterializationReport, Materializer};
pub use schema::{AssessmentRecord, ExtractedSchema, MigrationSchema};
pub use target::{CreateOutcome, DataApiClient, MemoryTarget, TargetClient};
