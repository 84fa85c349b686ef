//! huginn: command-line front end for the request executor.
//!
//! Runs assistant queries and reads the metrics ledger using the same
//! config files as an embedding service.

use std::io::{self, IsTerminal, Read};

use clap::{Parser, Subcommand};
use tracing::info;

use huginn::{
    Config, Huginn, HuginnError, LedgerConfig, MetricsLedger, RequestExecutor, Secrets,
};

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Resilient assistant queries against an upstream LLM")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the assistant a question
    Ask {
        /// Question (or omit to read from stdin)
        question: Option<String>,
        /// Model to use (default: from config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the metrics summary
    Metrics,

    /// Build the executor from config and print a liveness report
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    info!(version = huginn::version_string(), "huginn starting");

    match args.command {
        Command::Ask { question, model } => {
            let executor = build_executor(&config, &secrets).await?;
            let question = resolve_text(question)?;
            let model = model.unwrap_or_else(|| config.upstream.model.clone());
            match executor.run(&question, &model).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(e) => {
                    let class = e.class();
                    eprintln!("error ({}): {}", class.http_status(), class.public_message());
                    eprintln!("cause: {e}");
                    std::process::exit(1);
                }
            }
        }

        Command::Metrics => {
            // Reads the ledger only; needs no API key and leaves the cache alone.
            let ledger = MetricsLedger::open(&LedgerConfig::from(&config.ledger)).await;
            println!("{}", serde_json::to_string_pretty(&ledger.summarize())?);
        }

        Command::Health => {
            let executor = build_executor(&config, &secrets).await?;
            println!("{}", serde_json::to_string_pretty(&executor.health())?);
        }
    }

    Ok(())
}

/// Build a [`RequestExecutor`] from configuration.
async fn build_executor(
    config: &Config,
    secrets: &Secrets,
) -> Result<RequestExecutor, HuginnError> {
    let key = secrets.openrouter_key().ok_or_else(|| {
        HuginnError::Configuration(
            "no OpenRouter API key: set OPENROUTER_API_KEY or add ~/.huginn/secrets.toml".into(),
        )
    })?;
    config
        .configure(Huginn::builder().openrouter(key))
        .build()
        .await
}

/// Use the argument if given, otherwise read stdin when it is piped.
fn resolve_text(arg: Option<String>) -> io::Result<String> {
    if let Some(text) = arg {
        return Ok(text);
    }
    if io::stdin().is_terminal() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no question given: pass it as an argument or pipe it on stdin",
        ));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim().to_string())
}
