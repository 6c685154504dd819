//! In-memory remote service
//!
//! Stores everything it receives and can be told to fail in the ways a real
//! service does: whole bulk calls failing, bulk calls returning no results,
//! single items rejected inside a bulk call, or items always rejected.
//! Used by the test-suite and by dry runs of the CLI.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::types::*;
use super::RemoteClient;
use crate::error::{Result, TransferError};

/// Failures the in-memory service injects
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    /// Import calls with more than one item fail as a whole
    pub fail_bulk_calls: bool,
    /// Import calls with more than one item return no results
    pub empty_bulk_results: bool,
    /// Item positions rejected inside calls with more than one item
    pub bulk_item_errors: Vec<usize>,
    /// Items carrying one of these labels are always rejected
    pub rejected_labels: Vec<String>,
    /// Draft creation fails
    pub fail_drafts: bool,
    /// Attachment upload number N (0-based, counted over the run) fails
    pub fail_attachment_upload: Option<usize>,
}

/// Message stored by the in-memory service
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub request: ImportRequest,
}

#[derive(Default)]
struct State {
    messages: Vec<StoredMessage>,
    labels: Vec<Label>,
    drafts: Vec<(Draft, DraftRequest, DraftAction)>,
    attachments: Vec<(Attachment, AttachmentUpload)>,
    import_calls: Vec<usize>,
    attachment_uploads: usize,
    failures: FailurePlan,
}

/// Remote service kept in memory
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the failure plan
    pub fn set_failures(&self, failures: FailurePlan) {
        self.lock().failures = failures;
    }

    /// Size of every import call, in call order
    pub fn import_calls(&self) -> Vec<usize> {
        self.lock().import_calls.clone()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.lock().messages.clone()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.lock().labels.clone()
    }

    pub fn drafts(&self) -> Vec<Draft> {
        self.lock().drafts.iter().map(|(d, _, _)| d.clone()).collect()
    }

    /// Request and action a draft was created with
    pub fn draft_request(&self, draft_id: &str) -> Option<(DraftRequest, DraftAction)> {
        self.lock()
            .drafts
            .iter()
            .find(|(d, _, _)| d.id == draft_id)
            .map(|(_, req, action)| (req.clone(), *action))
    }

    /// Attachment uploads bound to a draft
    pub fn attachments_for(&self, draft_id: &str) -> Vec<AttachmentUpload> {
        self.lock()
            .attachments
            .iter()
            .filter(|(a, _)| a.message_id == draft_id)
            .map(|(_, upload)| upload.clone())
            .collect()
    }

    /// Per-label message counts, optionally restricted to one address
    pub fn message_counts(&self, address_id: Option<&str>) -> Vec<MessagesCount> {
        let state = self.lock();
        let mut counts: HashMap<String, MessagesCount> = HashMap::new();

        for message in &state.messages {
            if let Some(address_id) = address_id {
                if message.request.address_id != address_id {
                    continue;
                }
            }
            for label_id in &message.request.label_ids {
                let entry = counts.entry(label_id.clone()).or_insert_with(|| MessagesCount {
                    label_id: label_id.clone(),
                    total: 0,
                    unread: 0,
                });
                entry.total += 1;
                if message.request.unread {
                    entry.unread += 1;
                }
            }
        }

        let mut counts: Vec<MessagesCount> = counts.into_values().collect();
        counts.sort_by(|a, b| a.label_id.cmp(&b.label_id));
        counts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoning is ignored, state stays consistent between calls
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    async fn import_messages(&self, requests: &[ImportRequest]) -> Result<Vec<ImportResult>> {
        let mut state = self.lock();
        state.import_calls.push(requests.len());
        debug!("In-memory import of {} messages", requests.len());

        let bulk = requests.len() > 1;
        if bulk && state.failures.fail_bulk_calls {
            return Err(TransferError::Remote("bulk import rejected".to_string()));
        }
        if bulk && state.failures.empty_bulk_results {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if bulk && state.failures.bulk_item_errors.contains(&index) {
                results.push(ImportResult::failed("temporary failure"));
                continue;
            }
            if request
                .label_ids
                .iter()
                .any(|l| state.failures.rejected_labels.contains(l))
            {
                results.push(ImportResult::failed("message rejected"));
                continue;
            }

            let id = Uuid::new_v4().to_string();
            state.messages.push(StoredMessage {
                id: id.clone(),
                request: request.clone(),
            });
            results.push(ImportResult::ok(&id));
        }

        Ok(results)
    }

    async fn create_label(&self, label: &LabelRequest) -> Result<Label> {
        let mut state = self.lock();

        if state.labels.iter().any(|l| l.name == label.name) {
            return Err(TransferError::Remote(format!(
                "label {} already exists",
                label.name
            )));
        }

        let created = Label {
            id: Uuid::new_v4().to_string(),
            name: label.name.clone(),
            color: label.color.clone(),
            exclusive: label.exclusive,
        };
        state.labels.push(created.clone());
        Ok(created)
    }

    async fn create_draft(&self, draft: &DraftRequest, action: DraftAction) -> Result<Draft> {
        let mut state = self.lock();

        if state.failures.fail_drafts {
            return Err(TransferError::Remote("draft creation rejected".to_string()));
        }

        let created = Draft {
            id: Uuid::new_v4().to_string(),
            subject: draft.subject.clone(),
            label_ids: draft.label_ids.clone(),
        };
        state.drafts.push((created.clone(), draft.clone(), action));
        Ok(created)
    }

    async fn create_attachment(&self, upload: AttachmentUpload) -> Result<Attachment> {
        let mut state = self.lock();

        let number = state.attachment_uploads;
        state.attachment_uploads += 1;
        if state.failures.fail_attachment_upload == Some(number) {
            return Err(TransferError::Remote("attachment upload rejected".to_string()));
        }

        if !state.drafts.iter().any(|(d, _, _)| d.id == upload.message_id) {
            return Err(TransferError::Remote(format!(
                "draft {} not found",
                upload.message_id
            )));
        }

        let created = Attachment {
            id: Uuid::new_v4().to_string(),
            message_id: upload.message_id.clone(),
            name: upload.name.clone(),
            size: upload.data.len(),
        };
        state.attachments.push((created.clone(), upload));
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::MessageFlags;

    fn request(labels: &[&str]) -> ImportRequest {
        ImportRequest {
            address_id: "addr".to_string(),
            body: b"body".to_vec(),
            unread: true,
            time: 0,
            flags: MessageFlags::RECEIVED,
            label_ids: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_import_and_counts() {
        let remote = InMemoryRemote::new();
        let results = remote
            .import_messages(&[request(&[labels::INBOX]), request(&[labels::INBOX, "custom"])])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error.is_none()));
        assert_eq!(remote.import_calls(), vec![2]);

        let counts = remote.message_counts(Some("addr"));
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].label_id, labels::INBOX);
        assert_eq!(counts[0].total, 2);
        assert_eq!(counts[0].unread, 2);
        assert!(remote.message_counts(Some("other")).is_empty());
    }

    #[tokio::test]
    async fn test_bulk_failures_spare_single_calls() {
        let remote = InMemoryRemote::new();
        remote.set_failures(FailurePlan {
            fail_bulk_calls: true,
            ..Default::default()
        });

        assert!(remote
            .import_messages(&[request(&[]), request(&[])])
            .await
            .is_err());
        let results = remote.import_messages(&[request(&[])]).await.unwrap();
        assert!(results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_label_rejected() {
        let remote = InMemoryRemote::new();
        let req = LabelRequest {
            name: "Work".to_string(),
            color: "#fff".to_string(),
            exclusive: true,
        };

        let label = remote.create_label(&req).await.unwrap();
        assert!(!label.id.is_empty());
        assert!(remote.create_label(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_attachment_requires_draft() {
        let remote = InMemoryRemote::new();
        let upload = AttachmentUpload {
            message_id: "missing".to_string(),
            name: "a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: vec![1, 2, 3],
            signature: vec![4],
        };

        assert!(remote.create_attachment(upload).await.is_err());
    }
}
