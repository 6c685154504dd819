//! Source and target provider abstractions

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::progress::Progress;
use super::rules::TransferRules;
use super::types::{Mailbox, Message};
use crate::error::Result;

/// Where messages come from
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> String;

    /// Mailboxes offered by the source
    async fn mailboxes(&self) -> Result<Vec<Mailbox>>;

    /// Send every message of the active rules into `sender`.
    ///
    /// Must stop producing once `progress.should_stop()` is set or the
    /// receiving side is gone.
    async fn transfer_to(
        &self,
        rules: &TransferRules,
        progress: &Progress,
        sender: mpsc::Sender<Message>,
    ) -> Result<()>;
}

/// Where messages go
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> String;

    /// Destinations used when no rule matches a source mailbox
    fn default_mailboxes(&self, source: &Mailbox) -> Vec<Mailbox>;

    /// Create a mailbox that does not exist yet
    async fn create_mailbox(&self, mailbox: Mailbox) -> Result<Mailbox>;

    /// Consume the message stream until it ends or the run is stopped
    async fn transfer_from(
        &self,
        rules: &TransferRules,
        progress: &Progress,
        messages: mpsc::Receiver<Message>,
    );
}
