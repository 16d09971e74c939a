//! Local-disk storage for proof-of-attendance attachments.
//!
//! Files are written under `<root>/<user_id>/<millis>.<ext>` and served
//! read-only at `/uploads/...`. The owner id plus a submission-time token
//! keeps paths collision-free across users and across repeated submissions
//! by the same user.

use std::path::PathBuf;
use thiserror::Error;

/// Public path prefix the stored files are served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to store attachment: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ProofStorage {
    root: PathBuf,
}

impl ProofStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory served at [`PUBLIC_PREFIX`].
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Store an attachment for a user and return its public URL path.
    pub async fn save(
        &self,
        user_id: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let dir = self.root.join(user_id);
        tokio::fs::create_dir_all(&dir).await?;

        let ext = sanitize_extension(original_filename);
        let name = format!("{}.{}", chrono::Utc::now().timestamp_millis(), ext);
        tokio::fs::write(dir.join(&name), bytes).await?;

        tracing::debug!(user_id = %user_id, file = %name, "Proof attachment stored");
        Ok(format!("{}/{}/{}", PUBLIC_PREFIX, user_id, name))
    }
}

/// Carry over the original extension when it is a short alphanumeric token,
/// otherwise fall back to a neutral one. The client-supplied filename is
/// never used as a path.
fn sanitize_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && !filename.starts_with('.')
                && filename.contains('.')
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}
