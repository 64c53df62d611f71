//! Zentinel API migrations CLI entry point.
//!
//! Loads declarative migration files, validates them, and shows which
//! migrations a given request would run through.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_api_migrations::{MigrationConfig, MigrationPipeline};

#[derive(Parser, Debug)]
#[command(name = "zentinel-api-migrations")]
#[command(
    author,
    version,
    about = "Inspect and validate versioned API migrations"
)]
struct Args {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, env = "API_MIGRATIONS_CONFIG")]
    config: Option<PathBuf>,

    /// Migration directory or file (overrides migrations_dir from config)
    #[arg(short, long, env = "API_MIGRATIONS_DIR")]
    migrations: Option<PathBuf>,

    /// Show the migrations a request would run through: METHOD PATH
    #[arg(long, num_args = 2, value_names = ["METHOD", "PATH"])]
    plan: Option<Vec<String>>,

    /// Client version used with --plan (omit to test the missing-version policy)
    #[arg(long, requires = "plan")]
    client_version: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and migrations and exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# API Migrations Configuration Example
version: "1"

# Directory (or single file) with *.migration.yaml|yml|json files
migrations_dir: "./migrations"

settings:
  # Header carrying the client's API version
  version_header: "x-api-version"
  # Requests without a version: latest (no migrations) or oldest (all)
  missing_version: latest
  # Version ordering: lexicographic (YYYY-MM-DD tokens) or dotted_numeric
  comparator: lexicographic
  # Maximum body size to buffer for migration (bytes)
  max_body_size: 10485760  # 10MB
  # Add X-Api-Migrations header listing applied versions
  debug_headers: false

# Example migration file: migrations/2023-06-15-split-name.migration.yaml
#
# route: /api/users/:id
# verbs: POST|PUT
# version: "2023-06-15"
# description: Split user name into first and last name
# request:
#   body:
#     - op: split
#       from: $.user.name
#       into: [$.user.firstName, $.user.lastName]
# response:
#   body:
#     - op: join
#       from: [$.user.firstName, $.user.lastName]
#       into: $.user.name
"#;
    println!("{}", example);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    // Print example config if requested
    if args.example_config {
        print_example_config();
        return Ok(());
    }

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        let content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        if config_path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        }
    } else {
        MigrationConfig::default()
    };

    // Override migration directory from CLI
    if let Some(migrations) = &args.migrations {
        config.migrations_dir = Some(migrations.to_string_lossy().to_string());
    }

    let pipeline = MigrationPipeline::from_config(&config)
        .await
        .context("Failed to load migrations")?;

    if args.validate {
        info!(
            migrations = pipeline.registry().len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    if let Some(plan) = &args.plan {
        let [method, path] = plan.as_slice() else {
            anyhow::bail!("--plan expects METHOD PATH");
        };
        let plan = pipeline.plan(method, path, args.client_version.as_deref());

        println!(
            "{} {} (client version: {})",
            method.to_uppercase(),
            path,
            args.client_version.as_deref().unwrap_or("none")
        );
        if plan.is_empty() {
            println!("  no migrations apply");
            return Ok(());
        }
        println!("  request phase:");
        for step in plan.request_order() {
            println!(
                "    {} {}",
                step.version(),
                step.migration.descriptor.description
            );
        }
        println!("  response phase:");
        for step in plan.response_order() {
            println!(
                "    {} {}",
                step.version(),
                step.migration.descriptor.description
            );
        }
        return Ok(());
    }

    for migration in pipeline.registry().migrations() {
        let descriptor = &migration.descriptor;
        println!(
            "{}  {} {}  {}",
            descriptor.version, descriptor.verbs, descriptor.route, descriptor.description
        );
    }

    Ok(())
}
