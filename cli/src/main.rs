use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courier::config::{EnvConfig, JobsConfig, MailerConfig};
use courier::models::{Plan, User};
use courier::App;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

#[derive(Parser)]
#[command(name = "courier", about = "Background jobs and mail delivery for the membership site")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mailer until SIGINT/SIGTERM, then drain and exit.
    Run,
    /// Spawn subscription jobs for generated users, then shut down gracefully.
    #[command(alias = "sim")]
    Simulate {
        #[arg(short = 'n', long, default_value_t = 1)]
        users: i64,

        #[arg(long, default_value = "Bronze")]
        plan_name: String,

        #[arg(long, default_value = "$10.00")]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("initializing logger")?;

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("loading {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mailer_config = MailerConfig::from_env().context("loading mailer config")?;
    let jobs_config = JobsConfig::from_env().context("loading jobs config")?;
    let app = App::from_config(&mailer_config, &jobs_config)
        .await
        .context("starting job and mail system")?;

    match cli.command {
        Commands::Run => {
            log::info!("Ready. Press Ctrl+C to stop.");
            courier::shutdown_signal().await;
        }
        Commands::Simulate {
            users,
            plan_name,
            amount,
        } => {
            let plan = Plan {
                id: 1,
                name: plan_name,
                amount_formatted: amount,
            };
            for id in 1..=users {
                let user = User {
                    id,
                    email: format!("member{id}@example.com"),
                    first_name: "Member".to_string(),
                    last_name: format!("No. {id}"),
                };
                // Handles are dropped; shutdown drains the jobs.
                app.spawner()
                    .spawn_subscription_jobs(&user, &plan)
                    .context("spawning subscription jobs")?;
            }
            log::info!("Spawned jobs for {} subscription(s)", users);
        }
    }

    app.shutdown().await.context("shutting down")?;
    log::info!("Shutdown complete");
    Ok(())
}
