//! Transfer types and data structures

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};
use tracing::warn;

use crate::remote::labels;

/// Mailbox on either side of a transfer
///
/// On the target side an exclusive mailbox behaves like a folder (a message
/// has at most one), a non-exclusive one like a label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Remote ID, empty until the mailbox is created
    pub id: String,
    /// Display name
    pub name: String,
    /// Color (hex)
    pub color: String,
    /// Folder-like when true, label-like otherwise
    pub is_exclusive: bool,
}

impl Mailbox {
    pub fn new(name: &str, is_exclusive: bool) -> Self {
        Self {
            name: name.to_string(),
            is_exclusive,
            ..Default::default()
        }
    }

    /// Mailbox with a known remote ID
    pub fn with_id(id: &str, name: &str, is_exclusive: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: String::new(),
            is_exclusive,
        }
    }

    /// Whether the mailbox exists on the remote side
    pub fn is_created(&self) -> bool {
        !self.id.is_empty()
    }

    /// Well-known archive folder
    pub fn archive() -> Self {
        Self::with_id(labels::ARCHIVE, "Archive", true)
    }

    /// Well-known drafts folder
    pub fn drafts() -> Self {
        Self::with_id(labels::DRAFTS, "Drafts", true)
    }
}

/// A message produced by a source provider
#[derive(Debug, Clone)]
pub struct Message {
    /// Stable source identifier
    pub id: String,
    /// Raw RFC 5322 message
    pub body: Vec<u8>,
    /// Unread flag
    pub unread: bool,
    /// Source mailbox the message comes from
    pub source: Mailbox,
    /// Destination mailboxes resolved by the rules
    pub targets: Vec<Mailbox>,
}

impl Message {
    /// Whether the message must go through the draft path
    pub fn is_draft(&self) -> bool {
        self.targets.iter().any(|t| t.id == labels::DRAFTS)
    }
}

/// Import flags understood by the remote service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFlags(u64);

impl MessageFlags {
    pub const RECEIVED: MessageFlags = MessageFlags(1);
    pub const SENT: MessageFlags = MessageFlags(2);

    pub const fn empty() -> Self {
        MessageFlags(0)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Compute import flags from the destination label IDs.
    ///
    /// Sent membership sets `SENT`, inbox or archive membership sets
    /// `RECEIVED`. Custom-only destinations default to `RECEIVED`. A drafts
    /// label does not belong to a normal import and is only logged.
    pub fn from_label_ids<S: AsRef<str>>(label_ids: &[S]) -> Self {
        let mut flags = MessageFlags::empty();

        for label_id in label_ids {
            match label_id.as_ref() {
                labels::SENT => flags |= MessageFlags::SENT,
                labels::ARCHIVE | labels::INBOX => flags |= MessageFlags::RECEIVED,
                labels::DRAFTS => warn!("Found draft target in non-draft import"),
                _ => {}
            }
        }

        if flags.is_empty() {
            flags = MessageFlags::RECEIVED;
        }

        flags
    }
}

impl BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        MessageFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
