use mail_parser::{MessageParser as RawParser, MimeHeaders, PartType};

use super::types::{MimePart, ParsedMessage};
use crate::error::{Result, TransferError};

/// Turns a raw message into a [`ParsedMessage`].
///
/// Implementations are not assumed to be panic-free; callers go through
/// [`crate::transfer::builder::MessageBuilder::parse`] which catches faults.
pub trait MessageParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage>;
}

/// Parser backed by the `mail-parser` crate
#[derive(Debug, Default, Clone)]
pub struct MailParser;

impl MailParser {
    pub fn new() -> Self {
        MailParser
    }

    /// Content type of a part without parameters
    fn content_type_of<'x>(part: &impl MimeHeaders<'x>) -> Option<String> {
        part.content_type().map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype).to_lowercase(),
            None => ct.ctype().to_lowercase(),
        })
    }
}

impl MessageParser for MailParser {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage> {
        let message = RawParser::default()
            .parse(raw)
            .ok_or_else(|| TransferError::Parse("not an RFC 5322 message".to_string()))?;

        let mime_type = message
            .parts
            .first()
            .and_then(Self::content_type_of)
            .unwrap_or_else(|| "text/plain".to_string());

        let headers = message
            .headers()
            .iter()
            .filter_map(|header| {
                let raw = message.raw_message.get(header.offset_start..header.offset_end)?;
                let value = String::from_utf8_lossy(raw).replace("\r\n", "").replace('\n', "");
                Some((header.name.as_str().to_string(), value.trim().to_string()))
            })
            .collect();

        let from = message
            .from()
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .unwrap_or_default()
            .to_string();

        let to = message
            .to()
            .map(|addrs| {
                addrs
                    .iter()
                    .filter_map(|a| a.address())
                    .map(|a| a.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let text_body = message.text_part(0).and_then(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        });

        let html_body = message.html_part(0).and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        });

        let attachments = message
            .attachments()
            .map(|part| MimePart {
                content_type: Self::content_type_of(part)
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                filename: part.attachment_name().map(|n| n.to_string()),
                body: part.contents().to_vec(),
            })
            .collect();

        Ok(ParsedMessage {
            mime_type,
            headers,
            subject: message.subject().unwrap_or_default().to_string(),
            from,
            to,
            time: message.date().map(|d| d.to_timestamp()).unwrap_or(0),
            text_body,
            html_body,
            attachments,
        })
    }
}
