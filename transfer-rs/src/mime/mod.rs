/// MIME message parsing
///
/// This module turns raw source messages into bodies and attachments
/// ready to be encrypted.

pub mod parser;
pub mod types;

pub use parser::{MailParser, MessageParser};
pub use types::{MimePart, ParsedMessage, MULTIPART_ENCRYPTED};
