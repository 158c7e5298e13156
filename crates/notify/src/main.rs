//! notify-digest CLI - polls for unread notifications and emails a digest.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notify_digest::config::{LogFormat, DEFAULT_POLL_INTERVAL_SECS};
use notify_digest::{
    AlertStateStore, DigestComposer, EmailTransport, NotificationSource, Pipeline, Scheduler,
    Settings, SmtpMailer,
};

/// Poll myoshi.co for unread notifications and email a deduplicated digest.
#[derive(Parser)]
#[command(name = "notify-digest")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, env = "NOTIFY_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single cycle (for cron use)
    Poll,

    /// Run cycles on a fixed interval until interrupted
    Watch {
        /// Seconds between cycles
        #[arg(long, env = "NOTIFY_POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        interval_secs: u64,
    },

    /// Fetch and print the digest that would be sent, without sending
    Preview,

    /// Show the stored fingerprint
    State,

    /// Forget the stored fingerprint so the next cycle alerts again
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Poll => {
            let pipeline = build_pipeline(&cli.settings)?;
            tracing::info!(state = %cli.settings.state_path.display(), "Starting poll cycle");
            notify_digest::scheduler::trigger(&pipeline)
                .await
                .context("Poll cycle failed")?;
            Ok(())
        }
        Commands::Watch { interval_secs } => {
            let pipeline = Arc::new(build_pipeline(&cli.settings)?);
            let scheduler = Scheduler::new(pipeline, Duration::from_secs(interval_secs));
            scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                    tracing::info!("Received SIGINT, shutting down");
                })
                .await;
            Ok(())
        }
        Commands::Preview => run_preview(&cli.settings).await,
        Commands::State => {
            let store = AlertStateStore::new(Arc::new(cli.settings.store()));
            match store.get().await? {
                Some(fingerprint) => println!("last notified: {fingerprint}"),
                None => println!("last notified: (none)"),
            }
            Ok(())
        }
        Commands::Reset => {
            let store = AlertStateStore::new(Arc::new(cli.settings.store()));
            store.clear().await?;
            tracing::info!(state = %cli.settings.state_path.display(), "Cleared alert state");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("notify_digest=debug,info")
        } else {
            EnvFilter::new("notify_digest=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let source = settings.source()?;
    let mailer = SmtpMailer::new(&settings.smtp()?).context("Failed to set up SMTP mailer")?;

    Ok(Pipeline::new(
        settings.pipeline(),
        Arc::new(source),
        AlertStateStore::new(Arc::new(settings.store())),
        EmailTransport::new(Arc::new(mailer)),
    ))
}

async fn run_preview(settings: &Settings) -> Result<()> {
    let source = settings.source()?;
    let set = source
        .fetch_unread()
        .await
        .context("Failed to fetch notifications")?;
    let digest = DigestComposer::compose(&set);

    println!("Unread: {}", set.unread_count);
    println!("Fingerprint: {}", set.fingerprint());
    println!("Subject: {}\n", digest.subject);
    println!("{}", digest.body_html);
    Ok(())
}
