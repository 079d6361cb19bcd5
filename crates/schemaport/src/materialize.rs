//! Schema materializer: reconciles a resolved plan against the target.
//!
//! The materializer ensures each selected database and collection exists
//! on the target, accumulating a per-collection status report instead of
//! stopping at the first failure, so a caller sees the full blast radius
//! of a partial outage in one pass.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::schema::MigrationSchema;
use crate::target::{CreateOutcome, TargetClient};

/// Final status of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum CollectionStatus {
    /// The collection did not exist and was created.
    Created,
    /// The collection was already present; nothing changed.
    AlreadyExisted,
    /// Dry-run mode: creation was planned but not performed.
    SkippedDryRun,
    /// Creation failed; the payload is the reason.
    Failed(String),
}

impl CollectionStatus {
    /// Whether this status counts as a failure for the exit code.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExisted => write!(f, "already_existed"),
            Self::SkippedDryRun => write!(f, "skipped_dry_run"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Status of one collection within a database result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionResult {
    /// Collection name.
    pub name: String,
    /// Final status.
    #[serde(flatten)]
    pub status: CollectionStatus,
}

/// Per-database slice of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseResult {
    /// Source database name from the plan.
    pub database: String,
    /// Name used on the target (prefix applied).
    pub target_database: String,
    /// Results for each planned collection, in plan order.
    pub collections: Vec<CollectionResult>,
}

impl DatabaseResult {
    fn fail_remaining(&mut self, plan_names: &[String], reason: &str) {
        for name in &plan_names[self.collections.len()..] {
            self.collections.push(CollectionResult {
                name: name.clone(),
                status: CollectionStatus::Failed(reason.to_string()),
            });
        }
    }
}

/// The full materialization report, identical in shape for dry and real
/// runs so the two can be diffed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializationReport {
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// One entry per attempted database.
    pub databases: Vec<DatabaseResult>,
}

impl MaterializationReport {
    /// Whether any collection ended in `failed`.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.databases
            .iter()
            .flat_map(|db| &db.collections)
            .any(|c| c.status.is_failed())
    }

    /// Count of collections with the given predicate.
    fn count(&self, pred: impl Fn(&CollectionStatus) -> bool) -> usize {
        self.databases
            .iter()
            .flat_map(|db| &db.collections)
            .filter(|c| pred(&c.status))
            .count()
    }

    /// Tabulated summary printed at the end of every run.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        out.push_str(&format!("Materialization summary{mode}:\n"));

        for db in &self.databases {
            out.push_str(&format!(
                "  {} -> {}\n",
                db.database, db.target_database
            ));
            for coll in &db.collections {
                out.push_str(&format!("    {:<30} {}\n", coll.name, coll.status));
            }
        }

        let created = self.count(|s| matches!(s, CollectionStatus::Created));
        let existed = self.count(|s| matches!(s, CollectionStatus::AlreadyExisted));
        let skipped = self.count(|s| matches!(s, CollectionStatus::SkippedDryRun));
        let failed = self.count(CollectionStatus::is_failed);
        out.push_str(&format!(
            "  totals: {created} created, {existed} already existed, {skipped} skipped (dry run), {failed} failed\n"
        ));
        out
    }
}

/// Drives a resolved plan against a target client.
pub struct Materializer {
    client: Box<dyn TargetClient>,
}

impl Materializer {
    /// Creates a materializer around a target client.
    #[must_use]
    pub fn new(client: Box<dyn TargetClient>) -> Self {
        Self { client }
    }

    /// Run the plan. The connection is held for the duration of the run
    /// and released on every exit path, including errors.
    ///
    /// # Errors
    ///
    /// Returns an error only for startup-time failures (unreachable
    /// target). Per-collection failures are reported in the result, not
    /// as errors.
    pub async fn run(&mut self, plan: &MigrationSchema) -> Result<MaterializationReport> {
        self.client.connect().await?;
        let result = self.run_connected(plan).await;
        if let Err(e) = self.client.close().await {
            warn!("error closing target connection: {e}");
        }
        result
    }

    async fn run_connected(&mut self, plan: &MigrationSchema) -> Result<MaterializationReport> {
        let dry_run = plan.options.dry_run;
        let mut report = MaterializationReport {
            dry_run,
            databases: Vec::new(),
        };

        let progress = create_progress_bar(plan.planned_collections() as u64);
        if dry_run {
            info!("dry run: no mutating calls will be made");
        }

        for entry in plan.databases.iter().filter(|db| db.migrate) {
            let target_database = plan.target.target_name(&entry.name);
            let plan_names: Vec<String> =
                entry.collections.iter().map(|c| c.name.clone()).collect();
            let mut db_result = DatabaseResult {
                database: entry.name.clone(),
                target_database: target_database.clone(),
                collections: Vec::new(),
            };

            info!(
                database = %entry.name,
                target = %target_database,
                collections = plan_names.len(),
                "materializing database"
            );

            match self
                .materialize_database(&target_database, &plan_names, dry_run, &mut db_result)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    // A database-level failure takes out its remaining
                    // collections but never its siblings.
                    warn!(database = %entry.name, "aborting database: {e}");
                    db_result.fail_remaining(&plan_names, &e.to_string());
                }
            }

            progress.inc(db_result.collections.len() as u64);
            report.databases.push(db_result);
        }

        progress.finish_and_clear();

        info!(
            databases = report.databases.len(),
            failed = report.count(CollectionStatus::is_failed),
            "materialization complete"
        );

        Ok(report)
    }

    /// Materialize one database. Collection-scoped failures are recorded
    /// and iteration continues; connection loss is returned so the caller
    /// fails the remainder of this database.
    async fn materialize_database(
        &mut self,
        target_database: &str,
        plan_names: &[String],
        dry_run: bool,
        db_result: &mut DatabaseResult,
    ) -> Result<()> {
        if !dry_run {
            self.client.create_database(target_database).await?;
        }

        let existing = self.client.list_collections(target_database).await?;

        for name in plan_names {
            if existing.iter().any(|c| c == name) {
                db_result.collections.push(CollectionResult {
                    name: name.clone(),
                    status: CollectionStatus::AlreadyExisted,
                });
                continue;
            }

            if dry_run {
                db_result.collections.push(CollectionResult {
                    name: name.clone(),
                    status: CollectionStatus::SkippedDryRun,
                });
                continue;
            }

            let status = match self.client.create_collection(target_database, name).await {
                Ok(CreateOutcome::Created) => CollectionStatus::Created,
                Ok(CreateOutcome::AlreadyExisted) => CollectionStatus::AlreadyExisted,
                Err(Error::Timeout(secs)) => {
                    // A slow operation fails this collection only.
                    warn!(collection = %name, "operation timed out after {secs}s");
                    CollectionStatus::Failed(format!("timeout after {secs}s"))
                }
                Err(e @ Error::Connection(_)) => {
                    db_result.collections.push(CollectionResult {
                        name: name.clone(),
                        status: CollectionStatus::Failed(e.to_string()),
                    });
                    return Err(e);
                }
                Err(e) => {
                    warn!(collection = %name, "create failed: {e}");
                    CollectionStatus::Failed(e.to_string())
                }
            };

            db_result.collections.push(CollectionResult {
                name: name.clone(),
                status,
            });
        }

        Ok(())
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod tests;
