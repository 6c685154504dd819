//! Draft import
//!
//! Drafts cannot be bulk-imported: the draft is created first, then every
//! attachment is signed, encrypted and uploaded against the new draft.
//! A failure stops the remaining steps of that draft; attachments uploaded
//! before the failure are kept.

use tracing::{debug, info};

use super::builder::MessageBuilder;
use super::types::{Mailbox, Message};
use crate::error::{Result, TransferError};
use crate::remote::{AttachmentUpload, DraftAction, DraftRequest, RemoteClient};

/// Import one draft, returning its remote ID
pub async fn import_draft(
    client: &dyn RemoteClient,
    builder: &MessageBuilder,
    address_id: &str,
    message: &Message,
    global_mailbox: Option<&Mailbox>,
) -> Result<String> {
    let parsed = builder.parse(&message.body)?;
    let body = builder.encrypt_draft_body(&parsed)?;

    let mut label_ids = Vec::new();
    if let Some(global) = global_mailbox {
        label_ids.push(global.id.clone());
    }

    let (mime_type, _) = parsed.preferred_body();
    let request = DraftRequest {
        address_id: address_id.to_string(),
        subject: parsed.subject.clone(),
        sender: parsed.from.clone(),
        to: parsed.to.clone(),
        body,
        mime_type: mime_type.to_string(),
        time: parsed.time,
        label_ids,
    };

    let draft = client
        .create_draft(&request, DraftAction::Reply)
        .await
        .map_err(|e| TransferError::Remote(format!("failed to create draft: {}", e)))?;
    debug!(msg = %message.id, draft = %draft.id, "Draft created");

    for attachment in &parsed.attachments {
        let encrypted = builder.sign_and_encrypt_attachment(attachment)?;

        client
            .create_attachment(AttachmentUpload {
                message_id: draft.id.clone(),
                name: attachment.name_or_default().to_string(),
                mime_type: attachment.content_type.clone(),
                data: encrypted.data,
                signature: encrypted.signature,
            })
            .await
            .map_err(|e| TransferError::Remote(format!("failed to create attachment: {}", e)))?;
    }

    info!(
        msg = %message.id,
        draft = %draft.id,
        attachments = parsed.attachment_count(),
        "Draft imported"
    );
    Ok(draft.id)
}
