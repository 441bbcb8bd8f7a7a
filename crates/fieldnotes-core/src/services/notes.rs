//! Owner-facing note operations on top of a `NoteRepository`.

use crate::db::{NoteListParams, NoteRepository};
use crate::error::{Error, Result};
use crate::models::validation::{validate_bounding_box, validate_client_id, validate_location, validate_title};
use crate::models::{BoundingBox, Location, Note, NoteId, PageInfo, PageParams};
use crate::util::{normalize_text_option, owner_fingerprint};

/// Fields for a new note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub location: Option<Location>,
    pub client_id: Option<String>,
}

/// Partial edit; `None` leaves a field as stored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListNotesInput {
    pub page: PageParams,
    pub bounding_box: Option<BoundingBox>,
}

pub struct NoteService<'a, R> {
    repo: &'a R,
}

impl<'a, R: NoteRepository> NoteService<'a, R> {
    pub const fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Create a note; repeating a known `client_id` returns the stored note
    pub async fn create(&self, owner_id: &str, input: NoteInput) -> Result<Note> {
        validate_title(&input.title)?;
        if let Some(location) = &input.location {
            validate_location(location)?;
        }

        let client_id = normalize_text_option(input.client_id);
        if let Some(client_id) = &client_id {
            validate_client_id(client_id)?;
            if let Some(existing) = self.repo.get_by_client_id(owner_id, client_id).await? {
                tracing::debug!(
                    owner = owner_fingerprint(owner_id),
                    note = %existing.id,
                    "Create replayed for known client_id"
                );
                return Ok(existing);
            }
        }

        let note = Note::new(owner_id, input.title, input.content, input.location, client_id);
        self.repo.create(&note).await?;
        tracing::info!(owner = owner_fingerprint(owner_id), note = %note.id, "Created note");
        Ok(note)
    }

    pub async fn list(&self, owner_id: &str, input: ListNotesInput) -> Result<(Vec<Note>, PageInfo)> {
        if let Some(bbox) = &input.bounding_box {
            validate_bounding_box(bbox)?;
        }

        let params = NoteListParams {
            page: input.page,
            bounding_box: input.bounding_box,
            include_deleted: false,
        };
        self.repo.list(owner_id, &params).await
    }

    /// Fetch a live note the caller owns
    pub async fn get(&self, owner_id: &str, id: &NoteId) -> Result<Note> {
        let note = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NoteNotFound(id.to_string()))?;

        if !note.is_owned_by(owner_id) {
            return Err(Error::Forbidden(format!("note {id} belongs to another user")));
        }
        if note.is_deleted() {
            return Err(Error::NoteNotFound(id.to_string()));
        }
        Ok(note)
    }

    pub async fn update(&self, owner_id: &str, id: &NoteId, changes: NoteUpdate) -> Result<Note> {
        let mut note = self.get(owner_id, id).await?;

        let title = changes.title.unwrap_or_else(|| note.title.clone());
        validate_title(&title)?;
        let content = changes.content.unwrap_or_else(|| note.content.clone());
        let location = match changes.location {
            Some(location) => {
                validate_location(&location)?;
                Some(location)
            }
            None => note.location,
        };

        note.update(title, content, location);
        self.repo.update(&note).await?;
        tracing::info!(owner = owner_fingerprint(owner_id), note = %note.id, "Updated note");
        Ok(note)
    }

    /// Tombstone a note the caller owns
    pub async fn delete(&self, owner_id: &str, id: &NoteId) -> Result<()> {
        let note = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NoteNotFound(id.to_string()))?;

        if !note.is_owned_by(owner_id) {
            return Err(Error::Forbidden(format!("note {id} belongs to another user")));
        }

        self.repo.soft_delete(id).await?;
        tracing::info!(owner = owner_fingerprint(owner_id), note = %id, "Deleted note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlNoteRepository};
    use pretty_assertions::assert_eq;

    fn input(title: &str, client_id: Option<&str>) -> NoteInput {
        NoteInput {
            title: title.to_string(),
            content: "Observed".to_string(),
            location: Some(Location::new(47.0, 8.0, None, Some(3.0))),
            client_id: client_id.map(str::to_string),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_is_idempotent_on_client_id() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let first = service.create("user-1", input("Heron", Some("n1"))).await.unwrap();
        let second = service.create("user-1", input("Heron again", Some("n1"))).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Heron");

        // Another owner may reuse the correlation id
        let other = service.create("user-2", input("Heron", Some("n1"))).await.unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_invalid_input() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let err = service.create("user-1", input("  ", None)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let mut bad_location = input("Pin", None);
        bad_location.location = Some(Location::new(91.0, 0.0, None, None));
        let err = service.create("user-1", bad_location).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = service
            .create("user-1", input("Pin", Some(&"x".repeat(37))))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_checks_owner_and_tombstone() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let note = service.create("user-1", input("Owl", None)).await.unwrap();
        assert_eq!(service.get("user-1", &note.id).await.unwrap().title, "Owl");

        let err = service.get("user-2", &note.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        service.delete("user-1", &note.id).await.unwrap();
        let err = service.get("user-1", &note.id).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));

        let err = service.get("user-1", &NoteId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_update_keeps_untouched_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let note = service.create("user-1", input("Fox", None)).await.unwrap();
        let updated = service
            .update(
                "user-1",
                &note.id,
                NoteUpdate {
                    content: Some("Two kits".to_string()),
                    ..NoteUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Fox");
        assert_eq!(updated.content, "Two kits");
        assert_eq!(updated.location, note.location);
        assert!(updated.updated_at > note.updated_at);

        let stored = service.get("user-1", &note.id).await.unwrap();
        assert_eq!(stored, updated);

        let err = service
            .update("user-2", &note.id, NoteUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_requires_owner() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let note = service.create("user-1", input("Elk", None)).await.unwrap();
        let err = service.delete("user-2", &note.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        service.delete("user-1", &note.id).await.unwrap();
        let err = service.delete("user-1", &note.id).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_hides_tombstones_and_filters_by_box() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlNoteRepository::new(db.connection());
        let service = NoteService::new(&repo);

        let inside = service.create("user-1", input("Inside", None)).await.unwrap();
        let mut far = input("Far", None);
        far.location = Some(Location::new(-33.0, 151.0, None, None));
        service.create("user-1", far).await.unwrap();
        let gone = service.create("user-1", input("Gone", None)).await.unwrap();
        service.delete("user-1", &gone.id).await.unwrap();

        let (notes, info) = service
            .list(
                "user-1",
                ListNotesInput {
                    bounding_box: Some(BoundingBox::new(40.0, 50.0, 0.0, 10.0)),
                    ..ListNotesInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(info.total_items, 1);
        assert_eq!(notes[0].id, inside.id);

        let err = service
            .list(
                "user-1",
                ListNotesInput {
                    bounding_box: Some(BoundingBox::new(50.0, 40.0, 0.0, 10.0)),
                    ..ListNotesInput::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
