//! Remote service as transfer target
//!
//! Consumes the message stream in a single task. Drafts are created one by
//! one; every other message is encrypted into an import request and
//! accumulated into a pending batch that is flushed when the next request
//! would break the item or size limit, and once more at the end of the
//! stream.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::batch::PendingBatch;
use super::builder::MessageBuilder;
use super::draft::import_draft;
use super::progress::Progress;
use super::provider::TargetProvider;
use super::recovery::flush_batch;
use super::rules::TransferRules;
use super::types::{Mailbox, Message, MessageFlags};
use crate::config::BatchConfig;
use crate::error::{Result, TransferError};
use crate::remote::{labels, ImportRequest, LabelRequest, RemoteClient};

/// Transfer target backed by a [`RemoteClient`]
pub struct RemoteTarget {
    client: Arc<dyn RemoteClient>,
    builder: MessageBuilder,
    address_id: String,
    batch: BatchConfig,
}

impl RemoteTarget {
    pub fn new(
        client: Arc<dyn RemoteClient>,
        builder: MessageBuilder,
        address_id: &str,
        batch: BatchConfig,
    ) -> Self {
        Self {
            client,
            builder,
            address_id: address_id.to_string(),
            batch,
        }
    }

    /// System mailboxes every account has
    pub fn system_mailboxes() -> Vec<Mailbox> {
        vec![
            Mailbox::with_id(labels::INBOX, "Inbox", true),
            Mailbox::with_id(labels::SENT, "Sent", true),
            Mailbox::drafts(),
            Mailbox::archive(),
            Mailbox::with_id(labels::SPAM, "Spam", true),
            Mailbox::with_id(labels::TRASH, "Trash", true),
            Mailbox::with_id(labels::STARRED, "Starred", false),
        ]
    }

    /// Build the import request of a normal message
    pub fn build_import_request(
        &self,
        message: &Message,
        rules: &TransferRules,
    ) -> Result<ImportRequest> {
        let (parsed, body) = self.builder.build(&message.body)?;
        let label_ids = rules.resolve_targets(message);

        Ok(ImportRequest {
            address_id: self.address_id.clone(),
            body,
            unread: message.unread,
            time: parsed.time,
            flags: MessageFlags::from_label_ids(&label_ids),
            label_ids,
        })
    }

    async fn transfer_draft(&self, rules: &TransferRules, progress: &Progress, message: &Message) {
        let outcome = import_draft(
            self.client.as_ref(),
            &self.builder,
            &self.address_id,
            message,
            rules.global_mailbox(),
        )
        .await;
        progress.message_imported(&message.id, outcome);
    }

    async fn transfer_message(
        &self,
        rules: &TransferRules,
        progress: &Progress,
        pending: &mut PendingBatch,
        message: Message,
    ) {
        let request = match self.build_import_request(&message, rules) {
            Ok(request) => request,
            Err(e) => {
                progress.message_imported(&message.id, Err(e));
                return;
            }
        };

        if pending.needs_flush_before(&request) {
            self.flush(progress, pending).await;
        }
        pending.push(message.id, request);
    }

    async fn flush(&self, progress: &Progress, pending: &mut PendingBatch) {
        debug!(count = pending.len(), size = pending.size(), "Flushing batch");
        let items = pending.take();
        flush_batch(self.client.as_ref(), progress, items).await;
    }
}

#[async_trait]
impl TargetProvider for RemoteTarget {
    fn id(&self) -> String {
        format!("remote:{}", self.address_id)
    }

    fn default_mailboxes(&self, _source: &Mailbox) -> Vec<Mailbox> {
        vec![Mailbox::archive()]
    }

    async fn create_mailbox(&self, mut mailbox: Mailbox) -> Result<Mailbox> {
        if mailbox.is_created() {
            return Err(TransferError::MailboxExists(mailbox.name));
        }

        let label = self
            .client
            .create_label(&LabelRequest {
                name: mailbox.name.clone(),
                color: mailbox.color.clone(),
                exclusive: mailbox.is_exclusive,
            })
            .await
            .map_err(|e| TransferError::MailboxCreation {
                name: mailbox.name.clone(),
                reason: e.to_string(),
            })?;

        mailbox.id = label.id;
        Ok(mailbox)
    }

    async fn transfer_from(
        &self,
        rules: &TransferRules,
        progress: &Progress,
        mut messages: mpsc::Receiver<Message>,
    ) {
        info!("Started transfer to {}", self.id());

        let mut pending = PendingBatch::new(self.batch.max_items, self.batch.max_size);

        while let Some(message) = messages.recv().await {
            if progress.should_stop() {
                break;
            }

            if message.is_draft() {
                self.transfer_draft(rules, progress, &message).await;
            } else {
                self.transfer_message(rules, progress, &mut pending, message).await;
            }
        }

        if !pending.is_empty() {
            self.flush(progress, &mut pending).await;
        }

        info!("Finished transfer to {}", self.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::LogCrashReporter;
    use crate::crypto::LocalKeyRing;
    use crate::mime::MailParser;
    use crate::remote::InMemoryRemote;

    fn target(remote: Arc<InMemoryRemote>) -> RemoteTarget {
        let builder = MessageBuilder::new(
            Arc::new(LocalKeyRing::generate().unwrap()),
            Arc::new(MailParser::new()),
            Arc::new(LogCrashReporter),
        );
        RemoteTarget::new(remote, builder, "addr", BatchConfig::default())
    }

    fn message(id: &str, targets: Vec<Mailbox>) -> Message {
        Message {
            id: id.to_string(),
            body: b"From: a@example.com\r\nSubject: Hi\r\nDate: Thu, 01 Jan 2015 00:00:00 +0000\r\n\r\nHello".to_vec(),
            unread: true,
            source: Mailbox::new("INBOX", true),
            targets,
        }
    }

    #[tokio::test]
    async fn test_create_mailbox() {
        let remote = Arc::new(InMemoryRemote::new());
        let target = target(remote.clone());

        let created = target
            .create_mailbox(Mailbox::new("Work", false))
            .await
            .unwrap();
        assert!(created.is_created());
        assert_eq!(remote.labels()[0].name, "Work");
        assert!(!remote.labels()[0].exclusive);
    }

    #[tokio::test]
    async fn test_create_mailbox_rejects_existing_id() {
        let remote = Arc::new(InMemoryRemote::new());
        let target = target(remote.clone());

        let result = target.create_mailbox(Mailbox::archive()).await;
        assert!(matches!(result, Err(TransferError::MailboxExists(_))));
        assert!(remote.labels().is_empty());
    }

    #[tokio::test]
    async fn test_create_mailbox_duplicate_name() {
        let remote = Arc::new(InMemoryRemote::new());
        let target = target(remote);

        target.create_mailbox(Mailbox::new("Work", false)).await.unwrap();
        let result = target.create_mailbox(Mailbox::new("Work", false)).await;
        assert!(matches!(result, Err(TransferError::MailboxCreation { .. })));
    }

    #[test]
    fn test_default_mailboxes() {
        let target = target(Arc::new(InMemoryRemote::new()));
        let defaults = target.default_mailboxes(&Mailbox::new("Anything", false));
        assert_eq!(defaults, vec![Mailbox::archive()]);
    }

    #[test]
    fn test_build_import_request() {
        let target = target(Arc::new(InMemoryRemote::new()));
        let mut rules = TransferRules::new();
        rules.set_global_mailbox(Some(Mailbox::with_id("global", "Imported", false)));

        let msg = message(
            "m1",
            vec![
                Mailbox::with_id(labels::SENT, "Sent", true),
                Mailbox::with_id(labels::ALL_MAIL, "All Mail", true),
            ],
        );
        let request = target.build_import_request(&msg, &rules).unwrap();

        assert_eq!(request.address_id, "addr");
        assert!(request.unread);
        assert_eq!(request.time, 1_420_070_400);
        assert_eq!(request.label_ids, vec![labels::SENT, "global"]);
        assert_eq!(request.flags, MessageFlags::SENT);
    }

    #[tokio::test]
    async fn test_transfer_from_mixed_stream() {
        let remote = Arc::new(InMemoryRemote::new());
        let target = target(remote.clone());
        let rules = TransferRules::new();
        let progress = Progress::new();

        let (tx, rx) = mpsc::channel(16);
        tx.send(message("m1", vec![Mailbox::with_id(labels::INBOX, "Inbox", true)]))
            .await
            .unwrap();
        tx.send(message("d1", vec![Mailbox::drafts()])).await.unwrap();
        tx.send(message("m2", vec![Mailbox::archive()])).await.unwrap();
        drop(tx);

        target.transfer_from(&rules, &progress, rx).await;

        assert_eq!(progress.counts().imported, 3);
        assert_eq!(remote.import_calls(), vec![2]);
        assert_eq!(remote.drafts().len(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_message_recorded() {
        let remote = Arc::new(InMemoryRemote::new());
        let target = target(remote.clone());
        let progress = Progress::new();

        let (tx, rx) = mpsc::channel(4);
        let mut bad = message("bad", vec![Mailbox::archive()]);
        bad.body = Vec::new();
        tx.send(bad).await.unwrap();
        tx.send(message("good", vec![Mailbox::archive()])).await.unwrap();
        drop(tx);

        target.transfer_from(&TransferRules::new(), &progress, rx).await;

        assert!(matches!(
            progress.outcome("bad"),
            Some(crate::transfer::MessageOutcome::Failed { .. })
        ));
        assert!(progress.outcome("good").unwrap().is_imported());
        assert_eq!(remote.import_calls(), vec![1]);
    }
}
