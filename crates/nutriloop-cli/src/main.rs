mod config;
mod log_cmd;
mod report_cmd;
mod run_cmd;
mod status_cmd;
mod tools_cmd;
mod validate_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use nutriloop_core::llm;
use nutriloop_db::pool;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "nutriloop", about = "LLM-assisted personalized nutrition consultations")]
struct Cli {
    /// Database file (overrides NUTRILOOP_DATABASE env var)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config file (no database required)
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run a consultation from an intake file
    Run {
        /// Path to the intake TOML file
        intake: PathBuf,
        /// Plan generation attempts before escalating
        #[arg(long)]
        retry_max: Option<i32>,
        /// LLM provider: scripted or openai
        #[arg(long)]
        provider: Option<String>,
        /// Model to request from the provider
        #[arg(long)]
        model: Option<String>,
    },
    /// Show one consultation, or list recent ones (omit the id)
    Status {
        /// Consultation ID to show (omit to list recent consultations)
        consultation_id: Option<String>,
    },
    /// Show the workflow event log for a consultation
    Log {
        /// Consultation ID to show events for
        consultation_id: String,
        /// Filter to a single event type
        #[arg(long)]
        event_type: Option<String>,
    },
    /// Show token usage per agent for a consultation
    Report {
        /// Consultation ID to report on
        consultation_id: String,
    },
    /// Validate a meal plan file without running a consultation
    Validate {
        /// Path to the plan text file
        plan: PathBuf,
        /// Allergen to check the plan against (repeatable)
        #[arg(long = "allergy")]
        allergies: Vec<String>,
        /// Weekly budget to check the estimated cost against
        #[arg(long)]
        budget: Option<f64>,
    },
    /// List the registered tools
    Tools,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the database file and run migrations
    Init,
}

/// Execute the `nutriloop init` command: write the default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default_file();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(ref db_path) = cfg.database.path {
        println!("  database.path = {}", db_path.display());
    }
    if let Some(ref provider) = cfg.llm.provider {
        println!("  llm.provider = {provider}");
    }
    if let Some(ref outbox) = cfg.mail.outbox_dir {
        println!("  mail.outbox_dir = {}", outbox.display());
    }
    println!();
    println!("Next: run `nutriloop db init` to create and migrate the database.");

    Ok(())
}

/// Execute the `nutriloop db init` command: create the database file and
/// run migrations.
async fn cmd_db_init(cli_database: Option<&std::path::Path>) -> anyhow::Result<()> {
    let resolved = CliConfig::resolve(cli_database)?;

    println!(
        "Initializing nutriloop database at {}...",
        resolved.db_config.database_path.display()
    );

    let db_pool = pool::create_pool(&resolved.db_config.database_path).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("nutriloop db init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init => {
                cmd_db_init(cli.database.as_deref()).await?;
            }
        },
        Commands::Run {
            intake,
            retry_max,
            provider,
            model,
        } => {
            let mut resolved = CliConfig::resolve(cli.database.as_deref())?;
            if let Some(name) = provider {
                resolved.provider_config.provider = name;
            }
            if let Some(name) = model {
                resolved.provider_config.model = name;
            }
            if let Some(attempts) = retry_max {
                resolved.orchestrator_config.retry_max = attempts;
            }
            let llm_provider = llm::build_provider(&resolved.provider_config)?;
            let db_pool = pool::create_pool(&resolved.db_config.database_path).await?;
            let result = run_cmd::run_run(
                &db_pool,
                llm_provider,
                resolved.mail_config,
                resolved.orchestrator_config,
                &intake,
            )
            .await;
            db_pool.close().await;
            result?;
        }
        Commands::Status { consultation_id } => {
            let resolved = CliConfig::resolve(cli.database.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config.database_path).await?;
            let result = status_cmd::run_status(&db_pool, consultation_id.as_deref()).await;
            db_pool.close().await;
            result?;
        }
        Commands::Log {
            consultation_id,
            event_type,
        } => {
            let resolved = CliConfig::resolve(cli.database.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config.database_path).await?;
            let result = log_cmd::run_log(&db_pool, &consultation_id, event_type.as_deref()).await;
            db_pool.close().await;
            result?;
        }
        Commands::Report { consultation_id } => {
            let resolved = CliConfig::resolve(cli.database.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config.database_path).await?;
            let result = report_cmd::run_report(&db_pool, &consultation_id).await;
            db_pool.close().await;
            result?;
        }
        Commands::Validate {
            plan,
            allergies,
            budget,
        } => {
            validate_cmd::run_validate(&plan, &allergies, budget)?;
        }
        Commands::Tools => {
            let resolved = CliConfig::resolve(cli.database.as_deref())?;
            tools_cmd::run_tools(resolved.mail_config)?;
        }
    }

    Ok(())
}
