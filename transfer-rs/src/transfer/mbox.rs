//! MBOX file as transfer source
//!
//! The whole file is one source mailbox named after the file stem.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::progress::Progress;
use super::provider::SourceProvider;
use super::rules::TransferRules;
use super::types::{Mailbox, Message};
use crate::error::Result;

/// MBOX reader yielding raw messages
pub struct MboxReader<R> {
    reader: R,
    line: Vec<u8>,
    /// A From_ line was read ahead and starts the next message
    has_pending_from: bool,
    eof: bool,
    message_count: u64,
}

impl<R: AsyncBufRead + Unpin> MboxReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            has_pending_from: false,
            eof: false,
            message_count: 0,
        }
    }

    /// Read the next raw message, without its From_ line
    pub async fn read_message(&mut self) -> Result<Option<Vec<u8>>> {
        if self.eof {
            return Ok(None);
        }

        if !self.has_pending_from {
            loop {
                self.line.clear();
                if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                    self.eof = true;
                    return Ok(None);
                }
                if self.line.starts_with(b"From ") {
                    break;
                }
            }
        }
        self.has_pending_from = false;

        let mut content = Vec::new();
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                self.eof = true;
                break;
            }

            if self.line.starts_with(b"From ") {
                self.has_pending_from = true;
                break;
            }

            // Unescape >From lines
            if self.line.starts_with(b">From ") {
                content.extend_from_slice(&self.line[1..]);
            } else {
                content.extend_from_slice(&self.line);
            }
        }

        // Drop the blank separator line before the next From_
        while content.ends_with(b"\n\n") {
            content.pop();
        }
        if content.ends_with(b"\r\n\r\n") {
            content.truncate(content.len() - 2);
        }

        self.message_count += 1;
        Ok(Some(content))
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }
}

/// Whether the message was marked as read by the mail client.
///
/// `Status` wins when present (`R` means read), then the read bit of
/// `X-Mozilla-Status`. A message with neither has not been seen by a client
/// and counts as unread.
pub fn is_read(raw: &[u8]) -> bool {
    let mut mozilla_read = None;

    for line in raw.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if let Some(value) = header_value(line, b"status:") {
            return value.contains(&b'R');
        }
        if let Some(value) = header_value(line, b"x-mozilla-status:") {
            mozilla_read = std::str::from_utf8(value)
                .ok()
                .and_then(|v| u16::from_str_radix(v.trim(), 16).ok())
                .map(|flags| flags & MOZILLA_READ != 0);
        }
    }

    mozilla_read.unwrap_or(false)
}

/// Read flag of `X-Mozilla-Status`
const MOZILLA_READ: u16 = 0x0001;

fn header_value<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if line.len() >= name.len() && line[..name.len()].eq_ignore_ascii_case(name) {
        Some(&line[name.len()..])
    } else {
        None
    }
}

/// Transfer source reading one MBOX file
pub struct MboxSource {
    path: PathBuf,
    mailbox: Mailbox,
}

impl MboxSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "mbox".to_string());

        Self {
            path,
            mailbox: Mailbox::new(&name, true),
        }
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

#[async_trait]
impl SourceProvider for MboxSource {
    fn id(&self) -> String {
        format!("mbox:{}", self.path.display())
    }

    async fn mailboxes(&self) -> Result<Vec<Mailbox>> {
        Ok(vec![self.mailbox.clone()])
    }

    async fn transfer_to(
        &self,
        rules: &TransferRules,
        progress: &Progress,
        sender: mpsc::Sender<Message>,
    ) -> Result<()> {
        let Some(rule) = rules.rule_for(&self.mailbox.name) else {
            info!(mailbox = %self.mailbox.name, "No active rule, nothing to transfer");
            return Ok(());
        };

        info!("Started transfer from {}", self.id());
        let file = File::open(&self.path).await?;
        let mut reader = MboxReader::new(BufReader::new(file));

        while let Some(body) = reader.read_message().await? {
            if progress.should_stop() {
                debug!("Transfer stopping, source closed");
                break;
            }

            let message = Message {
                id: format!("{}/{}", self.mailbox.name, reader.message_count()),
                unread: !is_read(&body),
                body,
                source: self.mailbox.clone(),
                targets: rule.targets.clone(),
            };

            if sender.send(message).await.is_err() {
                warn!("Target closed the stream, stopping source");
                break;
            }
        }

        info!(
            count = reader.message_count(),
            "Finished transfer from {}",
            self.id()
        );
        Ok(())
    }
}
