//! Remote service request and response types

use serde::{Deserialize, Serialize};

use crate::transfer::MessageFlags;

/// Well-known label IDs of the remote service
pub mod labels {
    pub const INBOX: &str = "0";
    pub const TRASH: &str = "3";
    pub const SPAM: &str = "4";
    pub const ALL_MAIL: &str = "5";
    pub const ARCHIVE: &str = "6";
    pub const SENT: &str = "7";
    pub const DRAFTS: &str = "8";
    pub const STARRED: &str = "10";
}

/// One message of a bulk import call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Address the message belongs to
    pub address_id: String,
    /// Encrypted message body
    pub body: Vec<u8>,
    pub unread: bool,
    /// Unix timestamp
    pub time: i64,
    pub flags: MessageFlags,
    pub label_ids: Vec<String>,
}

impl ImportRequest {
    /// Payload size counted against the batch limit
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Per-item result of a bulk import call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    /// Remote message ID, empty on error
    pub message_id: String,
    /// Error reported for this item
    pub error: Option<String>,
}

impl ImportResult {
    pub fn ok(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            message_id: String::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Label (folder or label) creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
    pub name: String,
    pub color: String,
    pub exclusive: bool,
}

/// Label as stored by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
    pub exclusive: bool,
}

/// Action a draft is created for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftAction {
    #[default]
    Reply,
    ReplyAll,
    Forward,
}

/// Draft creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    pub address_id: String,
    pub subject: String,
    pub sender: String,
    pub to: Vec<String>,
    /// Encrypted body
    pub body: Vec<u8>,
    pub mime_type: String,
    pub time: i64,
    pub label_ids: Vec<String>,
}

/// Draft as stored by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub subject: String,
    pub label_ids: Vec<String>,
}

/// Attachment bound to an existing draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub message_id: String,
    pub name: String,
    pub mime_type: String,
    /// Encrypted attachment bytes
    pub data: Vec<u8>,
    /// Detached signature over the plaintext bytes
    pub signature: Vec<u8>,
}

/// Attachment as stored by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub message_id: String,
    pub name: String,
    pub size: usize,
}

/// Message count for one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesCount {
    pub label_id: String,
    pub total: u64,
    pub unread: u64,
}
