//! transfer-rs: bulk mailbox migration into an encrypted mail service
//!
//! Moves a stream of messages from a source (e.g. an MBOX file) into a
//! remote end-to-end encrypted mail service.
//!
//! # Features
//!
//! - **Batching**: imports grouped under an item count and payload size limit
//! - **Recovery**: failed batches degrade to per-message imports, so one bad
//!   message never aborts a migration
//! - **Drafts**: created one by one with signed and encrypted attachments
//! - **Cancellation**: cooperative stop checked between messages and batches
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use transfer_rs::config::TransferConfig;
//! use transfer_rs::crash::LogCrashReporter;
//! use transfer_rs::crypto::LocalKeyRing;
//! use transfer_rs::mime::MailParser;
//! use transfer_rs::remote::InMemoryRemote;
//! use transfer_rs::transfer::{MboxSource, MessageBuilder, RemoteTarget, Transfer, TransferRules};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TransferConfig::default();
//!     let builder = MessageBuilder::new(
//!         Arc::new(LocalKeyRing::generate()?),
//!         Arc::new(MailParser::new()),
//!         Arc::new(LogCrashReporter),
//!     );
//!     let target = RemoteTarget::new(
//!         Arc::new(InMemoryRemote::new()),
//!         builder,
//!         "address-id",
//!         config.batch.clone(),
//!     );
//!
//!     let mut transfer = Transfer::new(
//!         Arc::new(MboxSource::new("inbox.mbox")),
//!         Arc::new(target),
//!         TransferRules::new(),
//!     );
//!     transfer.prepare_rules(&RemoteTarget::system_mailboxes()).await?;
//!
//!     let counts = transfer.start().wait().await?;
//!     println!("{} imported, {} failed", counts.imported, counts.failed);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`transfer`]: Transfer pipeline (rules, batching, recovery, drafts)
//! - [`remote`]: Remote service abstraction
//! - [`crypto`]: Key ring
//! - [`mime`]: Message parsing

pub mod config;
pub mod crash;
pub mod crypto;
pub mod error;
pub mod mime;
pub mod remote;
pub mod transfer;

// Re-export commonly used types
pub use config::TransferConfig;
pub use error::{Result, TransferError};
