//! Remote mail service abstraction
//!
//! The transfer pipeline only talks to the service through [`RemoteClient`].
//! Retries and backoff for transport errors belong to the client
//! implementation, not to the pipeline.

use async_trait::async_trait;

use crate::error::Result;

pub mod memory;
pub mod types;

pub use memory::InMemoryRemote;
pub use types::*;

/// Capabilities of the remote service used by the transfer pipeline
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Import a batch of messages, returning one result per request in order
    async fn import_messages(&self, requests: &[ImportRequest]) -> Result<Vec<ImportResult>>;

    /// Create a label or folder
    async fn create_label(&self, label: &LabelRequest) -> Result<Label>;

    /// Create a draft
    async fn create_draft(&self, draft: &DraftRequest, action: DraftAction) -> Result<Draft>;

    /// Upload an attachment bound to an existing draft
    async fn create_attachment(&self, upload: AttachmentUpload) -> Result<Attachment>;
}
