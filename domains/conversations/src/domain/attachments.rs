//! Attachment codec and staging
//!
//! Images travel as `data:{mime};base64,{payload}` URLs: the same string is
//! stored with the message, used for previews, and decoded back to raw bytes
//! when a gateway request is built.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use thiserror::Error;

use super::entities::Attachment;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttachmentError {
    #[error("Not a base64 data URL")]
    InvalidDataUrl,

    #[error("Unsupported attachment type: {0}")]
    UnsupportedMime(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.to_ascii_lowercase().starts_with("image/")
}

pub fn encode_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(data))
}

pub fn decode_data_url(url: &str) -> Result<DecodedPayload, AttachmentError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or(AttachmentError::InvalidDataUrl)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(AttachmentError::InvalidDataUrl)?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or(AttachmentError::InvalidDataUrl)?;

    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| AttachmentError::InvalidBase64(e.to_string()))?;

    Ok(DecodedPayload {
        mime_type: mime_type.to_string(),
        data,
    })
}

/// Insert ` (n)` before the extension until the name is free
fn unique_name(name: &str, taken: &[Attachment]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|a| a.name == candidate);
    if !is_taken(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    (1..)
        .map(|n| format!("{} ({}){}", stem, n, ext))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Attachments pending for the next send
#[derive(Debug, Clone, Default)]
pub struct AttachmentStaging {
    staged: Vec<Attachment>,
}

impl AttachmentStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an image. Returns `Ok(false)` when the exact payload is already staged.
    pub fn stage(
        &mut self,
        name: Option<&str>,
        mime_type: &str,
        data: &[u8],
    ) -> Result<bool, AttachmentError> {
        if !is_image_mime(mime_type) {
            return Err(AttachmentError::UnsupportedMime(mime_type.to_string()));
        }

        let encoded = encode_data_url(mime_type, data);
        if self.staged.iter().any(|a| a.data == encoded) {
            tracing::debug!(mime_type, "Duplicate attachment payload ignored");
            return Ok(false);
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => format!("pasted-image-{}.png", Utc::now().timestamp_millis()),
        };

        self.staged.push(Attachment {
            name: unique_name(&name, &self.staged),
            mime_type: mime_type.to_string(),
            data: encoded,
        });
        Ok(true)
    }

    /// Admit an already-encoded attachment under the same rules as `stage`.
    /// The declared type and the payload's own type must both be images.
    pub fn admit(&mut self, attachment: Attachment) -> Result<bool, AttachmentError> {
        if !is_image_mime(&attachment.mime_type) {
            return Err(AttachmentError::UnsupportedMime(attachment.mime_type));
        }
        let payload = decode_data_url(&attachment.data)?;
        if !is_image_mime(&payload.mime_type) {
            return Err(AttachmentError::UnsupportedMime(payload.mime_type));
        }

        if self.staged.iter().any(|a| a.data == attachment.data) {
            tracing::debug!(name = %attachment.name, "Duplicate attachment payload ignored");
            return Ok(false);
        }

        let name = match attachment.name.trim() {
            "" => format!("pasted-image-{}.png", Utc::now().timestamp_millis()),
            n => n.to_string(),
        };
        self.staged.push(Attachment {
            name: unique_name(&name, &self.staged),
            ..attachment
        });
        Ok(true)
    }

    /// Filter caller-supplied attachments, dropping anything `admit` refuses
    pub fn from_attachments(attachments: impl IntoIterator<Item = Attachment>) -> Self {
        let mut staging = Self::new();
        for attachment in attachments {
            let name = attachment.name.clone();
            if let Err(e) = staging.admit(attachment) {
                tracing::warn!(name = %name, error = %e, "Attachment dropped");
            }
        }
        staging
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.staged.len();
        self.staged.retain(|a| a.name != name);
        self.staged.len() != before
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.staged
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Drain everything staged for a send
    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.staged)
    }
}
