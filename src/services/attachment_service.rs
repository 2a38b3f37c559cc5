use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::Attachment;
use crate::database::Store;
use crate::storage::{checksum, BlobError, BlobStore};
use crate::visibility::NoteAccess;

use super::{validate_name, CoreError, NoteService};

/// Raw file body with the metadata the client sent alongside it
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A stored attachment with its body
#[derive(Debug, Clone)]
pub struct Download {
    pub attachment: Attachment,
    pub bytes: Vec<u8>,
}

/// Attachments are listed and downloaded by readers and added by editors
#[derive(Clone)]
pub struct AttachmentService {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    notes: NoteService,
    clock: Arc<dyn Clock>,
    max_bytes: usize,
}

fn download_url(note_id: Uuid, attachment_id: Uuid) -> String {
    format!("/api/notes/{}/attachments/{}", note_id, attachment_id)
}

fn attachment_not_found() -> CoreError {
    CoreError::NotFound("Attachment not found".to_string())
}

impl AttachmentService {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        notes: NoteService,
        clock: Arc<dyn Clock>,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            blobs,
            notes,
            clock,
            max_bytes,
        }
    }

    pub async fn list(&self, actor: Uuid, note_id: Uuid) -> Result<Vec<Attachment>, CoreError> {
        let (note, _) = self.notes.access(actor, note_id).await?;
        Ok(self.store.attachments_of(note.id).await?)
    }

    pub async fn upload(&self, actor: Uuid, note_id: Uuid, upload: Upload) -> Result<Attachment, CoreError> {
        let (note, access) = self.notes.access(actor, note_id).await?;
        if access < NoteAccess::Edit {
            return Err(CoreError::Forbidden("Read-only access to this note".to_string()));
        }

        if upload.bytes.is_empty() {
            return Err(CoreError::ValidationFailed("Upload is empty".to_string()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(CoreError::PayloadTooLarge(format!(
                "Upload exceeds {} bytes",
                self.max_bytes
            )));
        }
        let name = validate_name("File name", &upload.name, 255)?;

        let storage_key = self.blobs.put(&name, &upload.bytes).await?;
        let id = Uuid::new_v4();
        let attachment = Attachment {
            id,
            note_id: note.id,
            name,
            content_type: upload.content_type,
            size: upload.bytes.len() as i64,
            checksum: checksum(&upload.bytes),
            storage_key,
            url: download_url(note.id, id),
            created_at: self.clock.now(),
        };

        // The key came from this put alone, so removing it cannot touch
        // another attachment
        if let Err(err) = self.store.insert_attachment(&attachment).await {
            if let Err(cleanup) = self.blobs.delete(&attachment.storage_key).await {
                warn!("Failed to remove orphaned blob {}: {}", attachment.storage_key, cleanup);
            }
            return Err(err.into());
        }

        info!("User {} attached {} to note {}", actor, attachment.name, note.id);
        Ok(attachment)
    }

    /// Anyone who can read the note can download its attachments.
    pub async fn download(&self, actor: Uuid, note_id: Uuid, attachment_id: Uuid) -> Result<Download, CoreError> {
        let (note, _) = self.notes.access(actor, note_id).await?;
        let attachment = self
            .store
            .find_attachment(attachment_id)
            .await?
            .filter(|a| a.note_id == note.id)
            .ok_or_else(attachment_not_found)?;

        match self.blobs.get(&attachment.storage_key).await {
            Ok(bytes) => Ok(Download { attachment, bytes }),
            Err(BlobError::Missing(key)) => {
                warn!("Attachment {} has no stored body ({})", attachment.id, key);
                Err(attachment_not_found())
            }
            Err(e) => Err(e.into()),
        }
    }
}
