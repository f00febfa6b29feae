use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod categorize;
mod reconcile;
mod verify_images;

#[derive(Debug, Parser)]
#[command(name = "catsync")]
#[command(about = "Reconcile the product catalog with journey documents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Merge duplicate products and repair journey product entries
    Reconcile {
        /// Plan and report without writing to the database
        #[arg(long)]
        dry_run: bool,

        /// Move dependent rows to the surviving product before deleting a duplicate
        #[arg(long)]
        reassign_relations: bool,

        /// Directory for the run's log and JSON-lines report (overrides config)
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Infer a category for each product from its name
    Categorize {
        /// Only list products that match no rule
        #[arg(long)]
        uncategorized_only: bool,

        /// Store the inferred category on each product
        #[arg(long)]
        apply: bool,
    },
    /// HEAD-check every remote image URI in the catalog and journeys
    VerifyImages {
        /// Maximum number of concurrent requests (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List recent reconciliation runs
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("catsync: no command given; run `catsync --help`");
        return Ok(());
    };

    let config = catsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "loaded configuration");

    let pool = catsync_db::connect_pool_from_config(&config).await?;

    match command {
        Commands::Reconcile {
            dry_run,
            reassign_relations,
            report_dir,
        } => {
            let rules = catsync_core::load_category_rules(config.category_rules_path.as_deref())?;
            let options = reconcile::ReconcileArgs {
                dry_run,
                reassign_relations: reassign_relations || config.reassign_relations,
                report_dir: report_dir.unwrap_or_else(|| config.report_dir.clone()),
            };
            reconcile::run_reconcile(&pool, &rules, &options).await?;
        }
        Commands::Categorize {
            uncategorized_only,
            apply,
        } => {
            let rules = catsync_core::load_category_rules(config.category_rules_path.as_deref())?;
            categorize::run_categorize(&pool, &rules, uncategorized_only, apply).await?;
        }
        Commands::VerifyImages { concurrency } => {
            let concurrency = concurrency.unwrap_or(config.image_check_concurrency);
            verify_images::run_verify_images(&pool, &config, concurrency).await?;
        }
        Commands::Runs { limit } => reconcile::run_list_runs(&pool, limit).await?,
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                catsync_db::health_check(&pool).await?;
                println!("database reachable");
            }
            DbCommands::Migrate => {
                let applied = catsync_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
        },
    }

    Ok(())
}
