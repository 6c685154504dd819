use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse message: {0}")]
    Parse(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Mailbox {0} is already created")]
    MailboxExists(String),

    #[error("Failed to create mailbox {name}: {reason}")]
    MailboxCreation { name: String, reason: String },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Panic while {context}: {message}")]
    Panic { context: String, message: String },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TransferError {
    /// Build a `Panic` error from a payload caught by `catch_unwind`
    pub fn from_panic(context: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        TransferError::Panic {
            context: context.to_string(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
