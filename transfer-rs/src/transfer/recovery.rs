//! Batch flush with partial-failure recovery
//!
//! 1. The whole batch is submitted in one bulk call.
//! 2. If the call fails or returns no results, every message is imported alone.
//! 3. Otherwise successful items are recorded as they are, and every errored
//!    item is retried alone exactly once; the retry decides its outcome.

use tracing::{debug, warn};

use super::progress::Progress;
use crate::error::{Result, TransferError};
use crate::remote::{ImportRequest, RemoteClient};

/// Submit a batch and record one outcome per message.
///
/// Skipped entirely when the run is stopping: the messages stay unattempted.
pub async fn flush_batch(
    client: &dyn RemoteClient,
    progress: &Progress,
    items: Vec<(String, ImportRequest)>,
) {
    if progress.should_stop() {
        debug!(count = items.len(), "Transfer stopping, batch not flushed");
        return;
    }
    if items.is_empty() {
        return;
    }

    let (msg_ids, requests): (Vec<String>, Vec<ImportRequest>) = items.into_iter().unzip();
    let size: usize = requests.iter().map(|r| r.size()).sum();
    debug!(msg_ids = ?msg_ids, size, "Importing messages");

    let results = match client.import_messages(&requests).await {
        Ok(results) if !results.is_empty() => results,
        Ok(_) => {
            warn!("Importing messages returned no result, trying one by one");
            import_one_by_one(client, progress, &msg_ids, &requests).await;
            return;
        }
        Err(e) => {
            warn!("Importing messages failed, trying one by one: {}", e);
            import_one_by_one(client, progress, &msg_ids, &requests).await;
            return;
        }
    };

    if results.len() != requests.len() {
        warn!(
            expected = requests.len(),
            got = results.len(),
            "Import returned a different number of results"
        );
    }

    for (index, (msg_id, request)) in msg_ids.iter().zip(requests.iter()).enumerate() {
        match results.get(index) {
            Some(result) if result.error.is_none() => {
                progress.message_imported(msg_id, Ok(result.message_id.clone()));
            }
            Some(result) => {
                warn!(
                    msg = %msg_id,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Importing message failed, trying alone"
                );
                let outcome = import_message(client, progress, request).await;
                progress.message_imported(msg_id, outcome);
            }
            None => {
                warn!(msg = %msg_id, "Import result missing, trying alone");
                let outcome = import_message(client, progress, request).await;
                progress.message_imported(msg_id, outcome);
            }
        }
    }
}

async fn import_one_by_one(
    client: &dyn RemoteClient,
    progress: &Progress,
    msg_ids: &[String],
    requests: &[ImportRequest],
) {
    for (msg_id, request) in msg_ids.iter().zip(requests) {
        let outcome = import_message(client, progress, request).await;
        progress.message_imported(msg_id, outcome);
    }
}

/// Import a single message, returning its remote ID
pub async fn import_message(
    client: &dyn RemoteClient,
    progress: &Progress,
    request: &ImportRequest,
) -> Result<String> {
    let mut remote_id = String::new();

    progress
        .call_wrap(async {
            let results = client
                .import_messages(std::slice::from_ref(request))
                .await
                .map_err(|e| TransferError::Remote(format!("failed to import message: {}", e)))?;

            let result = results
                .into_iter()
                .next()
                .ok_or_else(|| TransferError::Remote("import ended with no result".to_string()))?;

            if let Some(error) = result.error {
                return Err(TransferError::Remote(format!(
                    "failed to import message: {}",
                    error
                )));
            }

            remote_id = result.message_id;
            Ok(())
        })
        .await?;

    Ok(remote_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::FailurePlan;
    use crate::remote::{labels, InMemoryRemote};
    use crate::transfer::progress::MessageOutcome;
    use crate::transfer::MessageFlags;

    fn items(count: usize) -> Vec<(String, ImportRequest)> {
        (0..count)
            .map(|i| {
                (
                    format!("msg-{}", i),
                    ImportRequest {
                        address_id: "addr".to_string(),
                        body: vec![b'x'; 100],
                        unread: false,
                        time: 0,
                        flags: MessageFlags::RECEIVED,
                        label_ids: vec![labels::INBOX.to_string()],
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_flush_success() {
        let remote = InMemoryRemote::new();
        let progress = Progress::new();

        flush_batch(&remote, &progress, items(3)).await;

        assert_eq!(remote.import_calls(), vec![3]);
        assert_eq!(progress.counts().imported, 3);
    }

    #[tokio::test]
    async fn test_flush_bulk_failure_falls_back() {
        let remote = InMemoryRemote::new();
        remote.set_failures(FailurePlan {
            fail_bulk_calls: true,
            ..Default::default()
        });
        let progress = Progress::new();

        flush_batch(&remote, &progress, items(4)).await;

        assert_eq!(remote.import_calls(), vec![4, 1, 1, 1, 1]);
        assert_eq!(progress.counts().imported, 4);
    }

    #[tokio::test]
    async fn test_flush_empty_results_falls_back() {
        let remote = InMemoryRemote::new();
        remote.set_failures(FailurePlan {
            empty_bulk_results: true,
            ..Default::default()
        });
        let progress = Progress::new();

        flush_batch(&remote, &progress, items(3)).await;

        assert_eq!(remote.import_calls(), vec![3, 1, 1, 1]);
        assert_eq!(progress.counts().total(), 3);
        assert_eq!(progress.counts().imported, 3);
    }

    #[tokio::test]
    async fn test_flush_partial_failure_retries_errored_only() {
        let remote = InMemoryRemote::new();
        remote.set_failures(FailurePlan {
            bulk_item_errors: vec![1, 2],
            ..Default::default()
        });
        let progress = Progress::new();

        flush_batch(&remote, &progress, items(3)).await;

        assert_eq!(remote.import_calls(), vec![3, 1, 1]);
        assert_eq!(progress.counts().imported, 3);

        // The successful item keeps the ID from the bulk call
        let stored = remote.messages();
        assert_eq!(
            progress.outcome("msg-0"),
            Some(MessageOutcome::Imported {
                remote_id: stored[0].id.clone()
            })
        );
    }

    #[tokio::test]
    async fn test_flush_retry_failure_recorded() {
        let remote = InMemoryRemote::new();
        remote.set_failures(FailurePlan {
            rejected_labels: vec![labels::INBOX.to_string()],
            ..Default::default()
        });
        let progress = Progress::new();

        flush_batch(&remote, &progress, items(2)).await;

        assert_eq!(remote.import_calls(), vec![2, 1, 1]);
        assert_eq!(progress.counts().failed, 2);
        let failed = progress.failed_messages();
        assert!(failed[0].1.contains("message rejected"));
    }

    #[tokio::test]
    async fn test_flush_skipped_when_stopping() {
        let remote = InMemoryRemote::new();
        let progress = Progress::new();
        progress.stop();

        flush_batch(&remote, &progress, items(5)).await;

        assert!(remote.import_calls().is_empty());
        assert_eq!(progress.counts().total(), 0);
    }
}
