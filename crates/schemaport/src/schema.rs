//! Schema model: assessment records, the durable extracted-schema JSON and
//! the resolved materialization plan.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// One row extracted from the assessment report.
///
/// Immutable once extracted; produced only by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// Source database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Document count reported by the assessment.
    pub doc_count: u64,
    /// Data size in gigabytes (MB values are normalized at extraction).
    pub data_size_gb: f64,
}

/// A collection inside a database entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// Collection name.
    pub name: String,
    /// Document count carried over from the assessment.
    pub doc_count: u64,
    /// Data size in gigabytes carried over from the assessment.
    pub data_gb: f64,
}

/// One database in the extracted schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDatabase {
    /// Database name.
    pub database: String,
    /// Collections found for this database.
    pub collections: Vec<CollectionEntry>,
}

/// The durable intermediate schema written by `parse-assessment` and
/// reviewed (optionally hand-edited) before materialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSchema {
    /// Databases in first-seen order.
    pub databases: Vec<ExtractedDatabase>,
}

impl ExtractedSchema {
    /// Group flat assessment records into the durable schema shape,
    /// preserving first-seen order of databases and collections.
    ///
    /// Records are expected to be deduplicated already (the extractor
    /// drops repeated database/collection pairs).
    #[must_use]
    pub fn from_records(records: &[AssessmentRecord]) -> Self {
        let mut databases: Vec<ExtractedDatabase> = Vec::new();

        for record in records {
            let entry = CollectionEntry {
                name: record.collection.clone(),
                doc_count: record.doc_count,
                data_gb: record.data_size_gb,
            };

            match databases.iter_mut().find(|db| db.database == record.database) {
                Some(db) => db.collections.push(entry),
                None => databases.push(ExtractedDatabase {
                    database: record.database.clone(),
                    collections: vec![entry],
                }),
            }
        }

        Self { databases }
    }

    /// Flatten back into assessment records for filtering.
    #[must_use]
    pub fn to_records(&self) -> Vec<AssessmentRecord> {
        self.databases
            .iter()
            .flat_map(|db| {
                db.collections.iter().map(|coll| AssessmentRecord {
                    database: db.database.clone(),
                    collection: coll.name.clone(),
                    doc_count: coll.doc_count,
                    data_size_gb: coll.data_gb,
                })
            })
            .collect()
    }

    /// Total number of collections across all databases.
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.databases.iter().map(|db| db.collections.len()).sum()
    }

    /// Load an extracted schema from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it
    /// violates the uniqueness invariants (duplicate database names, or
    /// duplicate collection names within a database).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let schema: Self = serde_json::from_str(&content)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Write the schema to a JSON file (pretty-printed so the file stays
    /// hand-editable between extraction and materialization).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the uniqueness invariants: database names unique within the
    /// schema, collection names unique within each database.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first duplicate found.
    pub fn validate(&self) -> Result<()> {
        for (i, db) in self.databases.iter().enumerate() {
            if self.databases[..i].iter().any(|d| d.database == db.database) {
                return Err(Error::Config(format!(
                    "duplicate database '{}' in extracted schema",
                    db.database
                )));
            }
            for (j, coll) in db.collections.iter().enumerate() {
                if db.collections[..j].iter().any(|c| c.name == coll.name) {
                    return Err(Error::Config(format!(
                        "duplicate collection '{}' in database '{}'",
                        coll.name, db.database
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One database in the resolved materialization plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    /// Source database name (prefix is applied at materialization time).
    pub name: String,
    /// Whether this database is selected for migration.
    pub migrate: bool,
    /// Collections to materialize. Wildcards are resolved by the filter;
    /// a literal `"*"` never appears here.
    pub collections: Vec<CollectionEntry>,
}

/// Global plan options. `create_indexes` and `shard_collections` are
/// reserved flags carried through from the configuration with no current
/// effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Reserved: create indexes after collection creation.
    #[serde(default)]
    pub create_indexes: bool,
    /// Reserved: shard collections on the target.
    #[serde(default)]
    pub shard_collections: bool,
    /// Plan-only mode: report what would happen, mutate nothing.
    #[serde(default)]
    pub dry_run: bool,
}

/// Target naming options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOptions {
    /// Optional prefix applied to every target database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_prefix: Option<String>,
}

impl TargetOptions {
    /// Apply the configured prefix to a source database name.
    #[must_use]
    pub fn target_name(&self, database: &str) -> String {
        match &self.database_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}{database}"),
            _ => database.to_string(),
        }
    }
}

/// The fully resolved materialization plan consumed by the materializer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationSchema {
    /// Selected databases, unique by name.
    pub databases: Vec<DatabaseEntry>,
    /// Global options.
    #[serde(default)]
    pub options: SchemaOptions,
    /// Target naming options.
    #[serde(default)]
    pub target: TargetOptions,
}

impl MigrationSchema {
    /// Number of collections across databases selected for migration.
    #[must_use]
    pub fn planned_collections(&self) -> usize {
        self.databases
            .iter()
            .filter(|db| db.migrate)
            .map(|db| db.collections.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<AssessmentRecord> {
        vec![
            AssessmentRecord {
                database: "sample_mflix".to_string(),
                collection: "movies".to_string(),
                doc_count: 21349,
                data_size_gb: 0.032,
            },
            AssessmentRecord {
                database: "sample_mflix".to_string(),
                collection: "comments".to_string(),
                doc_count: 41079,
                data_size_gb: 0.011,
            },
            AssessmentRecord {
                database: "analytics".to_string(),
                collection: "events".to_string(),
                doc_count: 1_000_000,
                data_size_gb: 4.2,
            },
        ]
    }

    #[test]
    fn test_from_records_groups_by_database() {
        let schema = ExtractedSchema::from_records(&sample_records());
        assert_eq!(schema.databases.len(), 2);
        assert_eq!(schema.databases[0].database, "sample_mflix");
        assert_eq!(schema.databases[0].collections.len(), 2);
        assert_eq!(schema.databases[1].database, "analytics");
        assert_eq!(schema.collection_count(), 3);
    }

    #[test]
    fn test_records_round_trip() {
        let records = sample_records();
        let schema = ExtractedSchema::from_records(&records);
        assert_eq!(schema.to_records(), records);
    }

    #[test]
    fn test_validate_rejects_duplicate_database() {
        let schema = ExtractedSchema {
            databases: vec![
                ExtractedDatabase {
                    database: "a".to_string(),
                    collections: vec![],
                },
                ExtractedDatabase {
                    database: "a".to_string(),
                    collections: vec![],
                },
            ],
        };
        assert!(matches!(schema.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_collection() {
        let coll = CollectionEntry {
            name: "movies".to_string(),
            doc_count: 1,
            data_gb: 0.0,
        };
        let schema = ExtractedSchema {
            databases: vec![ExtractedDatabase {
                database: "a".to_string(),
                collections: vec![coll.clone(), coll],
            }],
        };
        assert!(matches!(schema.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_extracted_schema_json_shape() {
        let schema = ExtractedSchema::from_records(&sample_records());
        let json = serde_json::to_value(&schema).unwrap();
        let first = &json["databases"][0];
        assert_eq!(first["database"], "sample_mflix");
        assert_eq!(first["collections"][0]["name"], "movies");
        assert_eq!(first["collections"][0]["doc_count"], 21349);
    }

    #[test]
    fn test_target_name_prefix() {
        let target = TargetOptions {
            database_prefix: Some("prod_".to_string()),
        };
        assert_eq!(target.target_name("sample_mflix"), "prod_sample_mflix");

        let no_prefix = TargetOptions::default();
        assert_eq!(no_prefix.target_name("sample_mflix"), "sample_mflix");
    }

    #[test]
    fn test_planned_collections_skips_unmigrated() {
        let schema = MigrationSchema {
            databases: vec![
                DatabaseEntry {
                    name: "a".to_string(),
                    migrate: true,
                    collections: vec![CollectionEntry {
                        name: "x".to_string(),
                        doc_count: 0,
                        data_gb: 0.0,
                    }],
                },
                DatabaseEntry {
                    name: "b".to_string(),
                    migrate: false,
                    collections: vec![CollectionEntry {
                        name: "y".to_string(),
                        doc_count: 0,
                        data_gb: 0.0,
                    }],
                },
            ],
            ..Default::default()
        };
        assert_eq!(schema.planned_collections(), 1);
    }
}
