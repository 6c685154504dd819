//! CLI host for transfer runs
//!
//! # Usage
//!
//! ```bash
//! # Run the whole pipeline on an MBOX file against the in-memory service
//! transfer-rs dry-run inbox.mbox
//!
//! # Same, with a configuration file and a JSON report
//! transfer-rs --config transfer.toml dry-run inbox.mbox --json
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transfer_rs::config::{LoggingConfig, TransferConfig};
use transfer_rs::crash::LogCrashReporter;
use transfer_rs::crypto::LocalKeyRing;
use transfer_rs::mime::MailParser;
use transfer_rs::remote::InMemoryRemote;
use transfer_rs::transfer::{
    Mailbox, MboxSource, MessageBuilder, RemoteTarget, Transfer, TransferRules,
};

#[derive(Parser)]
#[command(name = "transfer-rs")]
#[command(about = "Migrate mailboxes into an encrypted mail service", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an MBOX file into the in-memory service
    DryRun {
        /// MBOX file to import
        mbox: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("transfer_rs={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TransferConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TransferConfig::default(),
    };
    init_logging(&config.logging);

    info!("Starting transfer-rs v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::DryRun { mbox, json } => {
            let remote = Arc::new(InMemoryRemote::new());
            let builder = MessageBuilder::new(
                Arc::new(LocalKeyRing::generate()?),
                Arc::new(MailParser::new()),
                Arc::new(LogCrashReporter),
            );
            let target = RemoteTarget::new(
                remote.clone(),
                builder,
                &config.transfer.address_id,
                config.batch.clone(),
            );

            let mut rules = TransferRules::new();
            if let Some(global) = &config.transfer.global_mailbox {
                let mut mailbox = Mailbox::new(&global.name, false);
                mailbox.color = global.color.clone();
                rules.set_global_mailbox(Some(mailbox));
            }

            let mut transfer = Transfer::new(
                Arc::new(MboxSource::new(&mbox)),
                Arc::new(target),
                rules,
            )
            .with_channel_capacity(config.transfer.channel_capacity);
            transfer
                .prepare_rules(&RemoteTarget::system_mailboxes())
                .await
                .context("preparing transfer rules")?;

            let handle = transfer.start();
            let progress = handle.progress();

            let stopper = progress.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping transfer");
                    stopper.stop();
                }
            });

            let counts = handle.wait().await?;

            if json {
                let report = serde_json::json!({
                    "counts": counts,
                    "started_at": progress.started_at(),
                    "finished_at": progress.finished_at(),
                    "failed": progress.failed_messages(),
                    "labels": remote.message_counts(None),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Imported: {}", counts.imported);
                println!("Failed:   {}", counts.failed);
                if let Some(finished_at) = progress.finished_at() {
                    let elapsed = finished_at - progress.started_at();
                    println!("Elapsed:  {}s", elapsed.num_seconds());
                }
                for (id, error) in progress.failed_messages() {
                    println!("  {}: {}", id, error);
                }
                for count in remote.message_counts(None) {
                    println!(
                        "Label {}: {} messages ({} unread)",
                        count.label_id, count.total, count.unread
                    );
                }
            }
        }
    }

    Ok(())
}
