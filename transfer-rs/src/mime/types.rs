/// Content type of a pre-encrypted PGP/MIME envelope
pub const MULTIPART_ENCRYPTED: &str = "multipart/encrypted";

/// An attachment of a parsed message
#[derive(Debug, Clone)]
pub struct MimePart {
    /// Content-Type without parameters (e.g. "application/pdf")
    pub content_type: String,
    /// Filename from Content-Disposition or Content-Type
    pub filename: Option<String>,
    /// Decoded body
    pub body: Vec<u8>,
}

impl Default for MimePart {
    fn default() -> Self {
        MimePart {
            content_type: "application/octet-stream".to_string(),
            filename: None,
            body: Vec::new(),
        }
    }
}

impl MimePart {
    /// Name used when the part carries no filename
    pub fn name_or_default(&self) -> &str {
        self.filename.as_deref().unwrap_or("attachment")
    }
}

/// Parsed message with separated parts
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Content-Type of the root part without parameters
    pub mime_type: String,
    /// Top-level headers in source order, values unfolded
    pub headers: Vec<(String, String)>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    /// Date header as unix timestamp, 0 when missing
    pub time: i64,
    /// Plain text body (if present)
    pub text_body: Option<String>,
    /// HTML body (if present)
    pub html_body: Option<String>,
    /// List of attachments
    pub attachments: Vec<MimePart>,
}

impl Default for ParsedMessage {
    fn default() -> Self {
        ParsedMessage {
            mime_type: "text/plain".to_string(),
            headers: Vec::new(),
            subject: String::new(),
            from: String::new(),
            to: Vec::new(),
            time: 0,
            text_body: None,
            html_body: None,
            attachments: Vec::new(),
        }
    }
}

impl ParsedMessage {
    /// Whether the source already encrypted the message
    pub fn is_encrypted(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(MULTIPART_ENCRYPTED)
    }

    /// Body used for drafts: HTML when present, plain text otherwise.
    ///
    /// A draft carries a single body, so the text alternative of a
    /// `multipart/alternative` draft is not kept.
    pub fn preferred_body(&self) -> (&str, &str) {
        match (&self.html_body, &self.text_body) {
            (Some(html), _) => ("text/html", html.as_str()),
            (None, Some(text)) => ("text/plain", text.as_str()),
            (None, None) => ("text/plain", ""),
        }
    }

    /// Get number of attachments
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}
