use clap::{Parser, Subcommand};
use aria_core::{AriaConfig, HabitEngine};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "aria-ingest", author, version, about = "Seed or replay the ARIA intent ledger")]
struct Args {
    #[arg(short, long, default_value = "aria.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load demo users, memories and intent counts, then run a promotion sweep
    Seed,
    /// Feed a JSON-lines file of observations through the ledger
    Replay {
        /// Path to the observations file
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match AriaConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let (store, pool) = aria_core::create_store(&config).await?;
    let engine = HabitEngine::new(store, &config.habits);

    match args.command {
        Command::Seed => {
            let report = aria_ingest::seed(&engine, pool.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Replay { file } => {
            let report = aria_ingest::replay_file(&engine, &file).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
