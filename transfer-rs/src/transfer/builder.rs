//! Encrypted message builder
//!
//! Turns a source message into the encrypted body stored by the remote
//! service. Parsing goes through a recoverable boundary: any parser fault,
//! including a panic, becomes a per-message `Parse` error.

use mail_builder::headers::raw::Raw;
use mail_builder::MessageBuilder as MimeBuilder;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

use crate::crash::CrashReporter;
use crate::crypto::{armor, KeyRing};
use crate::error::{Result, TransferError};
use crate::mime::{MessageParser, MimePart, ParsedMessage};

/// Builds encrypted bodies and attachment payloads with the account key ring
pub struct MessageBuilder {
    key_ring: Arc<dyn KeyRing>,
    parser: Arc<dyn MessageParser>,
    crash_reporter: Arc<dyn CrashReporter>,
}

/// Signature and ciphertext of one draft attachment
#[derive(Debug, Clone)]
pub struct EncryptedAttachment {
    pub signature: Vec<u8>,
    pub data: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(
        key_ring: Arc<dyn KeyRing>,
        parser: Arc<dyn MessageParser>,
        crash_reporter: Arc<dyn CrashReporter>,
    ) -> Self {
        Self {
            key_ring,
            parser,
            crash_reporter,
        }
    }

    /// Parse a raw message, turning parser panics into errors
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedMessage> {
        match catch_unwind(AssertUnwindSafe(|| self.parser.parse(raw))) {
            Ok(result) => result,
            Err(payload) => {
                let err = TransferError::from_panic("parsing message", payload);
                if let Err(report_err) = self.crash_reporter.report(&err.to_string()) {
                    error!("Crash report failed: {}", report_err);
                }
                Err(TransferError::Parse(err.to_string()))
            }
        }
    }

    /// Parse and encrypt a complete message with its attachments.
    ///
    /// A message already wrapped in a `multipart/encrypted` envelope is
    /// passed through unchanged.
    pub fn build(&self, raw: &[u8]) -> Result<(ParsedMessage, Vec<u8>)> {
        let parsed = self.parse(raw)?;

        if parsed.is_encrypted() {
            debug!("Message is already encrypted, passing through");
            return Ok((parsed, raw.to_vec()));
        }

        let plaintext = Self::assemble(&parsed, &parsed.attachments)?;
        let body = armor(&self.key_ring.encrypt(&plaintext)?);
        Ok((parsed, body))
    }

    /// Encrypt the body of a draft, leaving attachments out
    pub fn encrypt_draft_body(&self, parsed: &ParsedMessage) -> Result<Vec<u8>> {
        let (_, body) = parsed.preferred_body();
        Ok(armor(&self.key_ring.encrypt(body.as_bytes())?))
    }

    /// Sign and encrypt one attachment, both over the plaintext bytes
    pub fn sign_and_encrypt_attachment(&self, attachment: &MimePart) -> Result<EncryptedAttachment> {
        let signature = self.key_ring.sign_detached(&attachment.body)?;
        let data = self.key_ring.encrypt(&attachment.body)?;
        Ok(EncryptedAttachment { signature, data })
    }

    /// Re-assemble the plaintext MIME message that gets encrypted.
    ///
    /// Every source header is written back as is, except the MIME structure
    /// headers the builder generates for the new body.
    fn assemble(parsed: &ParsedMessage, attachments: &[MimePart]) -> Result<Vec<u8>> {
        let mut builder = MimeBuilder::new();

        for (name, value) in &parsed.headers {
            if is_structure_header(name) {
                continue;
            }
            builder = builder.header(name.as_str(), Raw::new(value.as_str()));
        }

        match (&parsed.text_body, &parsed.html_body) {
            (None, None) => builder = builder.text_body(""),
            (text, html) => {
                if let Some(text) = text {
                    builder = builder.text_body(text.as_str());
                }
                if let Some(html) = html {
                    builder = builder.html_body(html.as_str());
                }
            }
        }

        for attachment in attachments {
            builder = builder.attachment(
                attachment.content_type.as_str(),
                attachment.name_or_default(),
                attachment.body.as_slice(),
            );
        }

        builder
            .write_to_vec()
            .map_err(|e| TransferError::Crypto(format!("failed to assemble message: {}", e)))
    }
}

fn is_structure_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "mime-version" || name.starts_with("content-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::LogCrashReporter;
    use crate::crypto::{dearmor, LocalKeyRing};
    use crate::mime::MailParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingParser;

    impl MessageParser for PanickingParser {
        fn parse(&self, _raw: &[u8]) -> Result<ParsedMessage> {
            panic!("parser exploded")
        }
    }

    #[derive(Default)]
    struct CountingReporter(AtomicUsize);

    impl CrashReporter for CountingReporter {
        fn report(&self, _diagnostic: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransferError::Remote("reporter offline".to_string()))
        }
    }

    fn builder(key_ring: Arc<LocalKeyRing>) -> MessageBuilder {
        MessageBuilder::new(key_ring, Arc::new(MailParser::new()), Arc::new(LogCrashReporter))
    }

    #[test]
    fn test_build_encrypts_with_attachments() {
        let key_ring = Arc::new(LocalKeyRing::generate().unwrap());
        let raw = b"From: a@example.com\r\nSubject: Report\r\nContent-Type: multipart/mixed; boundary=\"x\"\r\n\r\n--x\r\nContent-Type: text/plain\r\n\r\nSee attached\r\n--x\r\nContent-Type: text/csv\r\nContent-Disposition: attachment; filename=\"data.csv\"\r\n\r\na,b,c\r\n--x--\r\n";

        let (parsed, body) = builder(key_ring.clone()).build(raw).unwrap();
        assert_eq!(parsed.subject, "Report");

        let plaintext = key_ring.decrypt(&dearmor(&body).unwrap()).unwrap();
        let plaintext = String::from_utf8_lossy(&plaintext);
        assert!(plaintext.contains("Subject: Report"));
        assert!(plaintext.contains("See attached"));
        assert!(plaintext.contains("data.csv"));
    }

    #[test]
    fn test_build_keeps_source_headers() {
        let key_ring = Arc::new(LocalKeyRing::generate().unwrap());
        let raw = b"From: a@example.com\r\nTo: b@example.com\r\nCc: c@example.com\r\nReply-To: r@example.com\r\nMessage-ID: <orig-123@example.com>\r\nIn-Reply-To: <parent@example.com>\r\nDate: Thu, 01 Jan 2015 00:00:00 +0000\r\nSubject: Thread\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nReply body\r\n";

        let (_, body) = builder(key_ring.clone()).build(raw).unwrap();
        let plaintext = key_ring.decrypt(&dearmor(&body).unwrap()).unwrap();

        let reparsed = MailParser::new().parse(&plaintext).unwrap();
        let header = |name: &str| {
            reparsed
                .headers
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .collect::<Vec<String>>()
        };

        assert_eq!(header("Cc"), vec!["c@example.com"]);
        assert_eq!(header("Reply-To"), vec!["r@example.com"]);
        assert_eq!(header("Message-ID"), vec!["<orig-123@example.com>"]);
        assert_eq!(header("In-Reply-To"), vec!["<parent@example.com>"]);
        assert_eq!(header("Date").len(), 1);
        assert_eq!(header("Content-Type").len(), 1);
        assert_eq!(reparsed.time, 1_420_070_400);
        assert_eq!(reparsed.subject, "Thread");
        assert!(reparsed.text_body.unwrap().contains("Reply body"));
    }

    #[test]
    fn test_build_passes_encrypted_through() {
        let key_ring = Arc::new(LocalKeyRing::generate().unwrap());
        let raw = b"From: a@example.com\r\nContent-Type: multipart/encrypted; boundary=\"e\"\r\n\r\n--e\r\nContent-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n--e--\r\n";

        let (_, body) = builder(key_ring).build(raw).unwrap();
        assert_eq!(body, raw.to_vec());
    }

    #[test]
    fn test_parser_panic_becomes_error() {
        let reporter = Arc::new(CountingReporter::default());
        let builder = MessageBuilder::new(
            Arc::new(LocalKeyRing::generate().unwrap()),
            Arc::new(PanickingParser),
            reporter.clone(),
        );

        let result = builder.build(b"Subject: x\r\n\r\nbody");
        match result {
            Err(TransferError::Parse(msg)) => assert!(msg.contains("parser exploded")),
            other => panic!("unexpected result: {:?}", other.map(|(p, _)| p.subject)),
        }
        assert_eq!(reporter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sign_and_encrypt_attachment() {
        let key_ring = Arc::new(LocalKeyRing::generate().unwrap());
        let attachment = MimePart {
            body: b"attachment bytes".to_vec(),
            ..Default::default()
        };

        let encrypted = builder(key_ring.clone())
            .sign_and_encrypt_attachment(&attachment)
            .unwrap();

        assert!(key_ring.verify(b"attachment bytes", &encrypted.signature).is_ok());
        assert_eq!(key_ring.decrypt(&encrypted.data).unwrap(), b"attachment bytes");
    }

    #[test]
    fn test_encrypt_draft_body() {
        let key_ring = Arc::new(LocalKeyRing::generate().unwrap());
        let parsed = ParsedMessage {
            text_body: Some("draft text".to_string()),
            ..Default::default()
        };

        let body = builder(key_ring.clone()).encrypt_draft_body(&parsed).unwrap();
        assert_eq!(key_ring.decrypt(&dearmor(&body).unwrap()).unwrap(), b"draft text");
    }
}
