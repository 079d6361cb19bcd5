//! Schema filter: applies the migration configuration to extracted
//! assessment records, producing the resolved materialization plan.
//!
//! The selection policy is conservative: databases absent from the
//! configuration are excluded. Opting in is always explicit.

use std::collections::HashSet;

use tracing::debug;

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::schema::{AssessmentRecord, CollectionEntry, DatabaseEntry, MigrationSchema};

/// Build the resolved materialization plan from extracted records and a
/// migration configuration.
///
/// Databases keep the first-seen order of the extraction; collections
/// keep extraction order under the wildcard and config-list order under
/// an explicit list. Wildcards are resolved here: the returned plan never
/// contains a literal `"*"`. Counts and sizes pass through unmodified.
///
/// # Errors
///
/// Returns `Error::Config` before any materialization can happen when the
/// configuration contradicts the extracted schema:
/// - a `migrate: true` database that does not exist in the records;
/// - an explicitly listed collection that does not exist for its database.
///
/// A `migrate: false` rule may reference a database absent from the
/// records: an exclusion is allowed to outlive the thing it excludes.
pub fn build_plan(
    records: &[AssessmentRecord],
    config: &MigrationConfig,
) -> Result<MigrationSchema> {
    config.validate()?;

    let extracted_dbs: Vec<&str> = {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| seen.insert(r.database.as_str()))
            .map(|r| r.database.as_str())
            .collect()
    };

    // Fail fast on rules that reference nothing in the extraction.
    for (name, rule) in &config.databases {
        if rule.migrate && !extracted_dbs.contains(&name.as_str()) {
            return Err(Error::Config(format!(
                "database '{name}' has migrate: true but is not present in the extracted schema"
            )));
        }
    }

    let mut databases = Vec::new();

    for db_name in extracted_dbs {
        let Some(rule) = config.databases.get(db_name) else {
            debug!(database = db_name, "not in config, excluded by default");
            continue;
        };
        if !rule.migrate {
            debug!(database = db_name, "migrate is false, excluded");
            continue;
        }

        let found: Vec<CollectionEntry> = records
            .iter()
            .filter(|r| r.database == db_name)
            .map(|r| CollectionEntry {
                name: r.collection.clone(),
                doc_count: r.doc_count,
                data_gb: r.data_size_gb,
            })
            .collect();

        let collections = if rule.is_wildcard() {
            found
        } else {
            let mut selected = Vec::with_capacity(rule.collections.len());
            for wanted in &rule.collections {
                let entry = found.iter().find(|c| &c.name == wanted).ok_or_else(|| {
                    Error::Config(format!(
                        "collection '{wanted}' listed for database '{db_name}' is not present in the extracted schema"
                    ))
                })?;
                selected.push(entry.clone());
            }
            selected
        };

        databases.push(DatabaseEntry {
            name: db_name.to_string(),
            migrate: true,
            collections,
        });
    }

    Ok(MigrationSchema {
        databases,
        options: config.options,
        target: config.target.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseRule;
    use std::collections::HashMap;

    fn record(db: &str, coll: &str, count: u64, gb: f64) -> AssessmentRecord {
        AssessmentRecord {
            database: db.to_string(),
            collection: coll.to_string(),
            doc_count: count,
            data_size_gb: gb,
        }
    }

    fn records() -> Vec<AssessmentRecord> {
        vec![
            record("sample_mflix", "movies", 21349, 0.032),
            record("sample_mflix", "comments", 41079, 0.011),
            record("analytics", "events", 1_000_000, 4.2),
        ]
    }

    fn rule(migrate: bool, collections: &[&str]) -> DatabaseRule {
        DatabaseRule {
            migrate,
            collections: collections.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn config_with(entries: Vec<(&str, DatabaseRule)>) -> MigrationConfig {
        MigrationConfig {
            databases: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn test_wildcard_round_trip_reproduces_all_records() {
        let config = config_with(vec![
            ("sample_mflix", rule(true, &["*"])),
            ("analytics", rule(true, &["*"])),
        ]);
        let plan = build_plan(&records(), &config).unwrap();

        let flattened: Vec<AssessmentRecord> = plan
            .databases
            .iter()
            .flat_map(|db| {
                db.collections.iter().map(|c| AssessmentRecord {
                    database: db.name.clone(),
                    collection: c.name.clone(),
                    doc_count: c.doc_count,
                    data_size_gb: c.data_gb,
                })
            })
            .collect();

        assert_eq!(flattened, records());
    }

    #[test]
    fn test_absent_databases_excluded_by_default() {
        let config = config_with(vec![("sample_mflix", rule(true, &["*"]))]);
        let plan = build_plan(&records(), &config).unwrap();
        assert_eq!(plan.databases.len(), 1);
        assert_eq!(plan.databases[0].name, "sample_mflix");
    }

    #[test]
    fn test_migrate_false_excludes_even_with_collections() {
        let config = config_with(vec![
            ("sample_mflix", rule(false, &["movies", "comments"])),
            ("analytics", rule(true, &["*"])),
        ]);
        let plan = build_plan(&records(), &config).unwrap();
        assert_eq!(plan.databases.len(), 1);
        assert_eq!(plan.databases[0].name, "analytics");
    }

    #[test]
    fn test_explicit_collection_selection() {
        let config = config_with(vec![("sample_mflix", rule(true, &["movies"]))]);
        let plan = build_plan(&records(), &config).unwrap();
        assert_eq!(plan.databases.len(), 1);
        assert_eq!(plan.databases[0].collections.len(), 1);
        let movies = &plan.databases[0].collections[0];
        assert_eq!(movies.name, "movies");
        assert_eq!(movies.doc_count, 21349);
        assert!((movies.data_gb - 0.032).abs() < 1e-9);
    }

    #[test]
    fn test_no_literal_wildcard_in_plan() {
        let config = config_with(vec![("sample_mflix", rule(true, &["*"]))]);
        let plan = build_plan(&records(), &config).unwrap();
        for db in &plan.databases {
            assert!(db.collections.iter().all(|c| c.name != "*"));
        }
    }

    #[test]
    fn test_wildcard_picks_up_new_collections_on_refilter() {
        let config = config_with(vec![("sample_mflix", rule(true, &["*"]))]);

        let plan = build_plan(&records(), &config).unwrap();
        assert_eq!(plan.databases[0].collections.len(), 2);

        // A later extraction run found a new collection.
        let mut later = records();
        later.push(record("sample_mflix", "theaters", 1564, 0.001));
        let plan = build_plan(&later, &config).unwrap();
        assert_eq!(plan.databases[0].collections.len(), 3);
    }

    #[test]
    fn test_unknown_migrated_database_is_config_error() {
        let config = config_with(vec![("ghost_db", rule(true, &["*"]))]);
        let err = build_plan(&records(), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_excluded_database_is_allowed() {
        let config = config_with(vec![
            ("ghost_db", rule(false, &[])),
            ("analytics", rule(true, &["*"])),
        ]);
        let plan = build_plan(&records(), &config).unwrap();
        assert_eq!(plan.databases.len(), 1);
    }

    #[test]
    fn test_unknown_collection_is_config_error() {
        let config = config_with(vec![("sample_mflix", rule(true, &["ghost_coll"]))]);
        let err = build_plan(&records(), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_options_and_target_copied_into_plan() {
        let mut config = config_with(vec![("analytics", rule(true, &["*"]))]);
        config.options.dry_run = true;
        config.target.database_prefix = Some("prod_".to_string());

        let plan = build_plan(&records(), &config).unwrap();
        assert!(plan.options.dry_run);
        assert_eq!(plan.target.database_prefix.as_deref(), Some("prod_"));
    }

    #[test]
    fn test_empty_config_selects_nothing() {
        let plan = build_plan(&records(), &MigrationConfig::default()).unwrap();
        assert!(plan.databases.is_empty());
        assert_eq!(plan.planned_collections(), 0);
    }
}
