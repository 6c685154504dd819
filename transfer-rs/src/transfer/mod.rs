//! Transfer of messages from a source provider into the remote service
//!
//! # Architecture
//! ```text
//! ┌────────┐  Message  ┌────────────────┐ drafts ┌──────────────┐
//! │ Source │ ────────→ │ Target (1 task)│ ─────→ │ create draft │
//! └────────┘  channel  └────────────────┘        └──────────────┘
//!                             │ normal
//!                             ↓
//!                      [Pending batch] → bulk import → per-message retry
//!                             │
//!                             └──────→ Progress (outcomes, stop flag)
//! ```

pub mod batch;
pub mod builder;
pub mod draft;
pub mod mbox;
pub mod progress;
pub mod provider;
pub mod recovery;
pub mod rules;
pub mod target;
pub mod types;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{Result, TransferError};

pub use batch::PendingBatch;
pub use builder::MessageBuilder;
pub use mbox::MboxSource;
pub use progress::{MessageOutcome, Progress, ProgressCounts};
pub use provider::{SourceProvider, TargetProvider};
pub use rules::{TransferRule, TransferRules};
pub use target::RemoteTarget;
pub use types::*;

/// Default capacity of the channel between source and target
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// One transfer run between a source and a target
pub struct Transfer {
    source: Arc<dyn SourceProvider>,
    target: Arc<dyn TargetProvider>,
    rules: TransferRules,
    channel_capacity: usize,
}

impl Transfer {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        target: Arc<dyn TargetProvider>,
        rules: TransferRules,
    ) -> Self {
        Self {
            source,
            target,
            rules,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn rules(&self) -> &TransferRules {
        &self.rules
    }

    /// Fill in default rules and create missing target mailboxes.
    ///
    /// `existing` lists the mailboxes already present on the target side.
    pub async fn prepare_rules(&mut self, existing: &[Mailbox]) -> Result<()> {
        let sources = self.source.mailboxes().await?;
        self.rules
            .set_default_rules(&sources, existing, self.target.as_ref());
        self.rules.create_missing_mailboxes(self.target.as_ref()).await?;
        Ok(())
    }

    /// Spawn the source and target tasks
    pub fn start(self) -> TransferHandle {
        let progress = Arc::new(Progress::new());
        let rules = Arc::new(self.rules);
        let (sender, receiver) = mpsc::channel(self.channel_capacity);

        info!(
            source = %self.source.id(),
            target = %self.target.id(),
            "Starting transfer"
        );

        let source_task = {
            let source = self.source.clone();
            let rules = rules.clone();
            let progress = progress.clone();
            tokio::spawn(async move { source.transfer_to(&rules, &progress, sender).await })
        };

        let target_task = {
            let target = self.target.clone();
            let progress = progress.clone();
            tokio::spawn(async move { target.transfer_from(&rules, &progress, receiver).await })
        };

        TransferHandle {
            progress,
            source_task,
            target_task,
        }
    }
}

/// Handle on a running transfer
pub struct TransferHandle {
    progress: Arc<Progress>,
    source_task: JoinHandle<Result<()>>,
    target_task: JoinHandle<()>,
}

impl TransferHandle {
    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        self.progress.stop();
    }

    /// Wait for both tasks, returning the final counters.
    ///
    /// A source failure is returned after the target has drained what it
    /// already received.
    pub async fn wait(self) -> Result<ProgressCounts> {
        let source_result = self.source_task.await;
        let target_result = self.target_task.await;
        self.progress.finish();

        if let Err(e) = target_result {
            error!("Target task failed: {}", e);
            return Err(TransferError::Panic {
                context: "running target".to_string(),
                message: e.to_string(),
            });
        }

        match source_result {
            Ok(Ok(())) => Ok(self.progress.counts()),
            Ok(Err(e)) => {
                error!("Source failed: {}", e);
                Err(e)
            }
            Err(e) => Err(TransferError::Panic {
                context: "running source".to_string(),
                message: e.to_string(),
            }),
        }
    }
}
