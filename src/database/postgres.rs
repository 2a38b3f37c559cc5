use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::database::models::{
    Attachment, Collaborator, Comment, Event, Family, FamilyMember, FamilyMembership, FamilyRole, Folder,
    MemberEntry, Note, User, UserSummary,
};
use crate::database::store::{EventQuery, FamilySeed, NoteQuery, Removal, Store, StoreError};
use crate::visibility::sql;

const NOTE_COLUMNS: &str = "n.id, n.user_id, n.family_id, n.folder_id, n.title, n.content, n.is_public, \
     n.public_permission, n.created_at, n.updated_at, n.deleted_at";

const FOLDER_COLUMNS: &str = "id, user_id, family_id, name, icon, created_at";

const ATTACHMENT_COLUMNS: &str = "id, note_id, name, content_type, size, checksum, storage_key, url, created_at";

const EVENT_COLUMNS: &str = "e.id, e.user_id, e.family_id, e.title, e.description, e.date, e.event_type, \
     e.recurrence, e.notify_users, e.show_countdown, e.is_system, e.created_at, e.updated_at, e.deleted_at";

/// Postgres-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn role_from_row(row: &PgRow) -> Result<FamilyRole, StoreError> {
    let role: String = row.try_get("role")?;
    FamilyRole::try_from(role).map_err(|e| StoreError::QueryError(e.to_string()))
}

/// Escapes LIKE wildcards and wraps the term for substring matching.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message()),
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, avatar_color, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.avatar_color)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("username '{}' is taken", user.username)))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, avatar_color, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, avatar_color, created_at, updated_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, avatar_color, created_at, updated_at
             FROM users WHERE username ILIKE $1 ORDER BY username LIMIT $2",
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_family(&self, id: Uuid) -> Result<Option<Family>, StoreError> {
        let family = sqlx::query_as::<_, Family>("SELECT id, name, creator_id, created_at FROM families WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(family)
    }

    async fn create_family(&self, seed: &FamilySeed) -> Result<(), StoreError> {
        let family = &seed.family;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO families (id, name, creator_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(family.id)
            .bind(&family.name)
            .bind(family.creator_id)
            .bind(family.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, || format!("family {} already exists", family.id)))?;

        // Any failure below drops `tx`, rolling back the family row too
        for member in &seed.members {
            sqlx::query("INSERT INTO family_members (family_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)")
                .bind(family.id)
                .bind(member.user_id)
                .bind(member.role.as_str())
                .bind(member.joined_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| match unique_violation(e, String::new) {
                    StoreError::Conflict(_) => StoreError::AlreadyMember,
                    other => other,
                })?;
        }

        let folder = &seed.shared_folder;
        sqlx::query(&format!(
            "INSERT INTO folders ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            FOLDER_COLUMNS
        ))
        .bind(folder.id)
        .bind(folder.user_id)
        .bind(folder.family_id)
        .bind(&folder.name)
        .bind(&folder.icon)
        .bind(folder.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_member(&self, member: &FamilyMember) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes against a concurrent last-member leave
        let family = sqlx::query("SELECT id FROM families WHERE id = $1 FOR UPDATE")
            .bind(member.family_id)
            .fetch_optional(&mut *tx)
            .await?;
        if family.is_none() {
            return Err(StoreError::FamilyNotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO family_members (family_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT (family_id, user_id) DO NOTHING",
        )
        .bind(member.family_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyMember);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_member(&self, family_id: Uuid, user_id: Uuid) -> Result<Removal, StoreError> {
        let mut tx = self.pool.begin().await?;

        let family = sqlx::query("SELECT id FROM families WHERE id = $1 FOR UPDATE")
            .bind(family_id)
            .fetch_optional(&mut *tx)
            .await?;
        if family.is_none() {
            return Err(StoreError::NotAMember);
        }

        let removed = sqlx::query("DELETE FROM family_members WHERE family_id = $1 AND user_id = $2 RETURNING role")
            .bind(family_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotAMember)?;
        let role = role_from_row(&removed)?;

        // Counted under the family row lock, so no concurrent leave can interleave
        let remaining_members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM family_members WHERE family_id = $1")
            .bind(family_id)
            .fetch_one(&mut *tx)
            .await?;

        let family_deleted = remaining_members == 0;
        if family_deleted {
            sqlx::query("DELETE FROM families WHERE id = $1")
                .bind(family_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Removal {
            role,
            remaining_members,
            family_deleted,
        })
    }

    async fn is_member(&self, family_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM family_members WHERE family_id = $1 AND user_id = $2)",
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn families_of(&self, user_id: Uuid) -> Result<Vec<FamilyMembership>, StoreError> {
        let rows = sqlx::query(
            "SELECT f.id, f.name, f.creator_id, f.created_at, m.role, m.joined_at
             FROM family_members m
             JOIN families f ON f.id = m.family_id
             WHERE m.user_id = $1
             ORDER BY m.joined_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<FamilyMembership, StoreError> {
                Ok(FamilyMembership {
                    family: Family {
                        id: row.try_get("id")?,
                        name: row.try_get("name")?,
                        creator_id: row.try_get("creator_id")?,
                        created_at: row.try_get("created_at")?,
                    },
                    role: role_from_row(row)?,
                    joined_at: row.try_get("joined_at")?,
                })
            })
            .collect()
    }

    async fn members_of(&self, family_id: Uuid) -> Result<Vec<MemberEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.avatar_color, m.role, m.joined_at
             FROM family_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.family_id = $1
             ORDER BY m.joined_at ASC",
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<MemberEntry, StoreError> {
                Ok(MemberEntry {
                    user: UserSummary {
                        id: row.try_get("id")?,
                        username: row.try_get("username")?,
                        avatar_color: row.try_get("avatar_color")?,
                    },
                    role: role_from_row(row)?,
                    joined_at: row.try_get("joined_at")?,
                })
            })
            .collect()
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO folders ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            FOLDER_COLUMNS
        ))
        .bind(folder.id)
        .bind(folder.user_id)
        .bind(folder.family_id)
        .bind(&folder.name)
        .bind(&folder.icon)
        .bind(folder.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_folder(&self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        let folder = sqlx::query_as::<_, Folder>(&format!("SELECT {} FROM folders WHERE id = $1", FOLDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(folder)
    }

    async fn folders_of(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {} FROM folders
             WHERE (family_id IS NULL AND user_id = $1)
                OR family_id IN (SELECT family_id FROM family_members WHERE user_id = $1)
             ORDER BY created_at",
            FOLDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn delete_folder(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_note(&self, note: &Note) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notes (id, user_id, family_id, folder_id, title, content, is_public, public_permission,
                                created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(note.family_id)
        .bind(note.folder_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_public)
        .bind(note.public_permission.as_str())
        .bind(note.created_at)
        .bind(note.updated_at)
        .bind(note.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_note(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.id = $1");
        let note = sqlx::query_as::<_, Note>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    async fn select_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, StoreError> {
        let predicate = sql::predicate(&query.visibility, "n");
        let mut sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n WHERE n.deleted_at IS NULL AND {}",
            predicate.clause
        );
        let mut index = predicate.params.len();

        if query.folder_id.is_some() {
            index += 1;
            sql.push_str(&format!(" AND n.folder_id = ${index}"));
        }
        if query.search.is_some() {
            index += 1;
            sql.push_str(&format!(" AND (n.title ILIKE ${index} OR n.content ILIKE ${index})"));
        }
        sql.push_str(" ORDER BY n.updated_at DESC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        let mut q = sqlx::query_as::<_, Note>(&sql);
        for param in &predicate.params {
            q = q.bind(*param);
        }
        if let Some(folder_id) = query.folder_id {
            q = q.bind(folder_id);
        }
        if let Some(search) = &query.search {
            q = q.bind(like_pattern(search));
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn update_note(&self, note: &Note) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE notes SET family_id = $2, folder_id = $3, title = $4, content = $5, is_public = $6,
                              public_permission = $7, updated_at = $8
             WHERE id = $1",
        )
        .bind(note.id)
        .bind(note.family_id)
        .bind(note.folder_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_public)
        .bind(note.public_permission.as_str())
        .bind(note.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_note_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE notes SET deleted_at = $2 WHERE id = $1")
            .bind(id)
            .bind(deleted_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO collaborators (note_id, user_id, permission) VALUES ($1, $2, $3)
             ON CONFLICT (note_id, user_id) DO UPDATE SET permission = EXCLUDED.permission",
        )
        .bind(collaborator.note_id)
        .bind(collaborator.user_id)
        .bind(collaborator.permission.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM collaborators WHERE note_id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_collaborator(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Collaborator>, StoreError> {
        let collaborator = sqlx::query_as::<_, Collaborator>(
            "SELECT note_id, user_id, permission FROM collaborators WHERE note_id = $1 AND user_id = $2",
        )
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collaborator)
    }

    async fn collaborators_of(&self, note_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        let collaborators = sqlx::query_as::<_, Collaborator>(
            "SELECT note_id, user_id, permission FROM collaborators WHERE note_id = $1 ORDER BY user_id",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(collaborators)
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO events (id, user_id, family_id, title, description, date, event_type, recurrence,
                                 notify_users, show_countdown, is_system, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.family_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.event_type.as_str())
        .bind(event.recurrence.as_str())
        .bind(&event.notify_users)
        .bind(event.show_countdown)
        .bind(event.is_system)
        .bind(event.created_at)
        .bind(event.updated_at)
        .bind(event.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn select_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let predicate = sql::predicate(&query.visibility, "e");
        let mut sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.deleted_at IS NULL AND {}",
            predicate.clause
        );
        if query.range.is_some() {
            let start = predicate.params.len() + 1;
            sql.push_str(&format!(" AND e.date BETWEEN ${} AND ${}", start, start + 1));
        }
        sql.push_str(" ORDER BY e.date ASC");

        let mut q = sqlx::query_as::<_, Event>(&sql);
        for param in &predicate.params {
            q = q.bind(*param);
        }
        if let Some((start, end)) = query.range {
            q = q.bind(start).bind(end);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE events SET family_id = $2, title = $3, description = $4, date = $5, event_type = $6,
                               recurrence = $7, notify_users = $8, show_countdown = $9, updated_at = $10
             WHERE id = $1",
        )
        .bind(event.id)
        .bind(event.family_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.event_type.as_str())
        .bind(event.recurrence.as_str())
        .bind(&event.notify_users)
        .bind(event.show_countdown)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_event_deleted(&self, id: Uuid, deleted_at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE events SET deleted_at = $2 WHERE id = $1")
            .bind(id)
            .bind(deleted_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO comments (id, note_id, user_id, username, content, quoted_text, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(comment.id)
        .bind(comment.note_id)
        .bind(comment.user_id)
        .bind(&comment.username)
        .bind(&comment.content)
        .bind(&comment.quoted_text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn comments_of(&self, note_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, note_id, user_id, username, content, quoted_text, created_at
             FROM comments WHERE note_id = $1 ORDER BY created_at ASC",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn insert_attachment(&self, attachment: &Attachment) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO attachments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ATTACHMENT_COLUMNS
        ))
        .bind(attachment.id)
        .bind(attachment.note_id)
        .bind(&attachment.name)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(&attachment.checksum)
        .bind(&attachment.storage_key)
        .bind(&attachment.url)
        .bind(attachment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_attachment(&self, id: Uuid) -> Result<Option<Attachment>, StoreError> {
        let attachment =
            sqlx::query_as::<_, Attachment>(&format!("SELECT {} FROM attachments WHERE id = $1", ATTACHMENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attachment)
    }

    async fn attachments_of(&self, note_id: Uuid) -> Result<Vec<Attachment>, StoreError> {
        let attachments = sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {} FROM attachments WHERE note_id = $1 ORDER BY created_at ASC",
            ATTACHMENT_COLUMNS
        ))
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }
}
