use anyhow::Result;
use annotator_core::config;
use annotator_core::service::AnnotatorService;
use clap::Parser;
use cli::commands::{self, Command};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "annotator")]
#[command(about = "Template recommendation and AI comments for homework images", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let service = AnnotatorService::from_config(cfg)?;

    // Ctrl-C stops a running batch before the next AI call.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling remaining work");
            on_interrupt.cancel();
        }
    });

    match commands::execute(&service, cli.command, &cancel).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, status = e.status_code(), "command failed");
            println!("{}", serde_json::to_string_pretty(&commands::error_body(&e))?);
            std::process::exit(1);
        }
    }
}
