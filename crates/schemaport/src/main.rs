//! schemaport CLI
//!
//! Two-command pipeline: parse an HTML assessment report into a durable
//! schema file, then (after review) materialize the selected schema on
//! the target service.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use schemaport::config::{MigrationConfig, TargetSettings};
use schemaport::extract::extract_records;
use schemaport::filter::build_plan;
use schemaport::materialize::Materializer;
use schemaport::schema::ExtractedSchema;
use schemaport::target::create_client;

#[derive(Parser)]
#[command(name = "schemaport")]
#[command(version)]
#[command(about = "Replay a document-database schema onto a target service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an HTML assessment report into a schema JSON file
    ParseAssessment {
        /// Assessment report (HTML)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output schema JSON file
        #[arg(short, long, value_name = "FILE", default_value = "schema.json")]
        output: PathBuf,
    },

    /// Filter the extracted schema and materialize it on the target
    GenerateSchema {
        /// Extracted schema JSON file (possibly hand-edited)
        #[arg(short, long, value_name = "FILE", default_value = "schema.json")]
        schema: PathBuf,

        /// Migration configuration JSON file
        #[arg(short, long, value_name = "FILE", default_value = "migration.json")]
        config: PathBuf,

        /// Prefix for target database names (overrides the config file)
        #[arg(long, value_name = "PREFIX")]
        db_prefix: Option<String>,

        /// Plan only: report what would happen, mutate nothing
        #[arg(long)]
        dry_run: bool,

        /// Write the full status report as JSON to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Validate the migration config against the extracted schema
    Validate {
        /// Extracted schema JSON file
        #[arg(short, long, value_name = "FILE", default_value = "schema.json")]
        schema: PathBuf,

        /// Migration configuration JSON file
        #[arg(short, long, value_name = "FILE", default_value = "migration.json")]
        config: PathBuf,
    },

    /// Generate an example migration configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "migration.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::ParseAssessment { input, output } => {
            parse_assessment(&input, &output)?;
        }
        Commands::GenerateSchema {
            schema,
            config,
            db_prefix,
            dry_run,
            report,
        } => {
            generate_schema(&schema, &config, db_prefix, dry_run, report.as_deref()).await?;
        }
        Commands::Validate { schema, config } => {
            validate(&schema, &config)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

fn parse_assessment(input: &Path, output: &Path) -> anyhow::Result<()> {
    info!("Parsing assessment report {:?}", input);

    let html = std::fs::read_to_string(input)?;
    let extraction = match extract_records(&html) {
        Ok(extraction) => extraction,
        Err(e) => {
            eprintln!("Failed to parse assessment report: {e}");
            std::process::exit(1);
        }
    };

    let schema = ExtractedSchema::from_records(&extraction.records);
    schema.to_file(output)?;

    println!("Extracted schema saved to {}", output.display());
    println!("\nSummary:");
    println!("   Databases:   {}", schema.databases.len());
    println!("   Collections: {}", schema.collection_count());
    if !extraction.skipped.is_empty() {
        println!("   Skipped rows: {}", extraction.skipped.len());
    }

    for db in &schema.databases {
        let total_gb: f64 = db.collections.iter().map(|c| c.data_gb).sum();
        println!("\n   {} ({total_gb:.3} GB)", db.database);
        for coll in &db.collections {
            println!("      - {} ({} docs, {:.3} GB)", coll.name, coll.doc_count, coll.data_gb);
        }
    }

    println!("\nNext steps:");
    println!("   1. Review/edit {} to drop unwanted entries", output.display());
    println!("   2. Write a migration config (schemaport init) selecting what to migrate");
    println!(
        "   3. Run: schemaport generate-schema --schema {} --config migration.json --dry-run",
        output.display()
    );

    Ok(())
}

async fn generate_schema(
    schema_path: &Path,
    config_path: &Path,
    db_prefix: Option<String>,
    dry_run: bool,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    info!("Loading extracted schema from {:?}", schema_path);
    let schema = ExtractedSchema::from_file(schema_path)?;

    info!("Loading migration config from {:?}", config_path);
    let mut config = MigrationConfig::from_file(config_path)?;

    // CLI flags override the config file.
    if let Some(prefix) = db_prefix {
        config.target.database_prefix = Some(prefix);
    }
    if dry_run {
        config.options.dry_run = true;
    }

    let records = schema.to_records();
    let plan = build_plan(&records, &config)?;

    if plan.databases.is_empty() {
        println!("Nothing selected for migration; check the config's databases section.");
        return Ok(());
    }

    info!(
        databases = plan.databases.len(),
        collections = plan.planned_collections(),
        dry_run = plan.options.dry_run,
        "materializing plan"
    );

    // Connection settings come from the environment; a missing endpoint
    // fails here, before anything is attempted.
    let settings = TargetSettings::from_env()?;
    let client = create_client(settings)?;

    let mut materializer = Materializer::new(client);
    let report = materializer.run(&plan).await?;

    print!("{}", report.render_summary());

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("Report written to {}", path.display());
    }

    if report.has_failures() {
        std::process::exit(2);
    }

    Ok(())
}

fn validate(schema_path: &Path, config_path: &Path) -> anyhow::Result<()> {
    let schema = ExtractedSchema::from_file(schema_path)?;
    let config = MigrationConfig::from_file(config_path)?;

    let plan = build_plan(&schema.to_records(), &config)?;

    println!("Configuration is valid.");
    println!("   Databases selected:   {}", plan.databases.len());
    println!("   Collections selected: {}", plan.planned_collections());
    println!(
        "   Dry run: {}   Prefix: {}",
        plan.options.dry_run,
        plan.target.database_prefix.as_deref().unwrap_or("(none)")
    );

    Ok(())
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, CONFIG_TEMPLATE)?;
    println!("Generated configuration: {}", output.display());
    println!("   Edit the databases section, then run:");
    println!(
        "   schemaport generate-schema --schema schema.json --config {} --dry-run",
        output.display()
    );
    Ok(())
}

const CONFIG_TEMPLATE: &str = r#"{
  "databases": {
    "sample_mflix": { "migrate": true, "collections": ["*"] },
    "internal_staging": { "migrate": false, "collections": [] }
  },
  "options": {
    "create_indexes": false,
    "shard_collections": false,
    "dry_run": false
  },
  "target": {
    "database_prefix": ""
  }
}
"#;
