use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::Comment;
use crate::database::Store;

use super::{CoreError, NoteService};

const MAX_COMMENT: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
    #[serde(default)]
    pub quoted_text: String,
}

/// Anyone who can read a note can comment on it
#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn Store>,
    notes: NoteService,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(store: Arc<dyn Store>, notes: NoteService, clock: Arc<dyn Clock>) -> Self {
        Self { store, notes, clock }
    }

    pub async fn list(&self, actor: Uuid, note_id: Uuid) -> Result<Vec<Comment>, CoreError> {
        let (note, _) = self.notes.access(actor, note_id).await?;
        Ok(self.store.comments_of(note.id).await?)
    }

    pub async fn create(&self, actor: Uuid, note_id: Uuid, new: NewComment) -> Result<Comment, CoreError> {
        let (note, _) = self.notes.access(actor, note_id).await?;

        let content = new.content.trim();
        if content.is_empty() {
            return Err(CoreError::ValidationFailed("Comment must not be empty".to_string()));
        }
        if content.chars().count() > MAX_COMMENT {
            return Err(CoreError::ValidationFailed(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT
            )));
        }

        let author = self
            .store
            .find_user(actor)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("Unknown user".to_string()))?;

        let comment = Comment {
            id: Uuid::new_v4(),
            note_id: note.id,
            user_id: actor,
            username: author.username,
            content: content.to_string(),
            quoted_text: new.quoted_text,
            created_at: self.clock.now(),
        };
        self.store.insert_comment(&comment).await?;
        Ok(comment)
    }
}
