//! Typed access to subjects and notes on top of the record store.

mod cache;

pub use cache::{ListingCache, DEFAULT_LISTING_CAPACITY};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::config::NotesConfig;
use crate::error::NoteError;
use crate::object_store::ObjectStore;
use crate::seed::SubjectSeed;
use crate::storage::models::{ListedNote, Note, Subject};
use crate::store::{from_record, to_record, Filter, Query, Record, RecordStore, StoreError, Table};
use crate::upload::NoteCreator;

/// Input for a new note. Only title and subject are required.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub subject_id: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub uploader_name: Option<String>,
    pub user_id: Option<String>,
    pub file: Option<FileUpload>,
}

/// An attached file, stored as an opaque blob.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub data: Bytes,
}

/// Extensions accepted for attached files.
pub const ALLOWED_FILE_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "ppt", "pptx"];

pub struct NoteRepository {
    blobs: Arc<dyn ObjectStore>,
    cache: Arc<ListingCache>,
    policy: NotesConfig,
    store: Arc<dyn RecordStore>,
}

impl NoteRepository {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn ObjectStore>,
        policy: NotesConfig,
    ) -> Self {
        let cache = Arc::new(ListingCache::new(policy.listing_cache_ttl));
        Self::with_cache(store, blobs, policy, cache)
    }

    /// Use a listing cache shared with another writer, e.g. the replicated
    /// state machine applying writes from other nodes.
    pub fn with_cache(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn ObjectStore>,
        policy: NotesConfig,
        cache: Arc<ListingCache>,
    ) -> Self {
        Self {
            blobs,
            cache,
            policy,
            store,
        }
    }

    pub fn policy(&self) -> &NotesConfig {
        &self.policy
    }

    /// Drop every cached listing so the next read goes to the store.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// All subjects, ordered by code.
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, NoteError> {
        Ok(self.subjects().await?.as_ref().clone())
    }

    async fn subjects(&self) -> Result<Arc<Vec<Subject>>, NoteError> {
        if let Some(subjects) = self.cache.subjects() {
            return Ok(subjects);
        }

        let generation = self.cache.generation();
        let records = self
            .store
            .select(Table::Subjects, &Query::new().order_by("code", false))
            .await?;
        let subjects = Arc::new(
            records
                .into_iter()
                .map(|r| from_record(Table::Subjects, r))
                .collect::<Result<Vec<Subject>, _>>()?,
        );

        self.cache.store_subjects(generation, Arc::clone(&subjects));
        Ok(subjects)
    }

    /// Look a subject up in the store, bypassing the cache.
    pub async fn get_subject(&self, id: &str) -> Result<Option<Subject>, NoteError> {
        let records = self
            .store
            .select(Table::Subjects, &Query::new().eq("id", id))
            .await?;
        match records.into_iter().next() {
            Some(record) => Ok(Some(from_record(Table::Subjects, record)?)),
            None => Ok(None),
        }
    }

    /// Approved notes, optionally restricted to one subject, newest first.
    /// Notes whose subject no longer resolves are left out.
    pub async fn list_notes(&self, subject_id: Option<&str>) -> Result<Vec<ListedNote>, NoteError> {
        if let Some(notes) = self.cache.notes(subject_id) {
            return Ok(notes.as_ref().clone());
        }

        let generation = self.cache.generation();
        let mut query = Query::new().eq("is_approved", true);
        if let Some(subject_id) = subject_id {
            query = query.eq("subject_id", subject_id);
        }
        let query = query.order_by("created_at", true);

        let records = self.store.select(Table::Notes, &query).await?;
        let subjects = self.subjects().await?;
        let by_id: HashMap<&str, &Subject> =
            subjects.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut listed = Vec::with_capacity(records.len());
        for record in records {
            let note: Note = from_record(Table::Notes, record)?;
            match by_id.get(note.subject_id.as_str()) {
                Some(subject) => listed.push(ListedNote {
                    subject: (*subject).clone(),
                    note,
                }),
                None => tracing::warn!(
                    note_id = %note.id,
                    subject_id = %note.subject_id,
                    "Skipping note with unresolved subject"
                ),
            }
        }

        let listed = Arc::new(listed);
        // Unknown subject filters come straight from query strings; don't
        // let them occupy the cache
        if subject_id.is_some_and(|id| !by_id.contains_key(id)) {
            return Ok(listed.as_ref().clone());
        }
        if !self.cache.store_notes(subject_id, generation, Arc::clone(&listed)) {
            tracing::debug!("Listing raced an invalidation, not cached");
        }
        Ok(listed.as_ref().clone())
    }

    /// Validate and persist a new note. Invalidates cached listings on success.
    pub async fn create_note(&self, input: NewNote) -> Result<Note, NoteError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(NoteError::validation("Title is required"));
        }
        let subject_id = input.subject_id.trim();
        if subject_id.is_empty() {
            return Err(NoteError::validation("Subject is required"));
        }
        if self.get_subject(subject_id).await?.is_none() {
            return Err(NoteError::validation(format!(
                "Subject '{subject_id}' does not exist"
            )));
        }

        if let Some(ref file) = input.file {
            check_file_type(&file.name)?;
        }

        let uploader = non_blank(input.uploader_name)
            .unwrap_or_else(|| self.policy.anonymous_uploader.clone());

        let mut record = Record::new();
        record.insert("title".into(), Value::from(title));
        record.insert("subject_id".into(), Value::from(subject_id));
        record.insert("description".into(), Value::from(non_blank(input.description)));
        record.insert("tags".into(), Value::from(normalize_tags(input.tags)));
        record.insert("uploader_name".into(), Value::from(uploader));
        record.insert("user_id".into(), Value::from(non_blank(input.user_id)));
        record.insert("is_approved".into(), Value::from(self.policy.auto_approve));

        // Phase 1: store the attached blob (keyed by its own UUID)
        let blob_key = match input.file {
            Some(file) => {
                let key = blob_key(&file.name);
                let size = file.data.len() as u64;
                self.blobs
                    .put(&key, file.data)
                    .await
                    .map_err(StoreError::from)?;
                record.insert("file_url".into(), Value::from(format!("/files/{key}")));
                record.insert("file_name".into(), Value::from(base_name(&file.name)));
                record.insert("file_size".into(), Value::from(size));
                Some(key)
            }
            None => None,
        };

        // Phase 2: insert the note record
        let persisted = match self.store.insert(Table::Notes, record).await {
            Ok(persisted) => persisted,
            Err(e) => {
                if let Some(key) = blob_key {
                    // Best-effort cleanup of the orphaned blob
                    if let Err(cleanup) = self.blobs.delete(&key).await {
                        tracing::warn!(
                            key = %key,
                            error = %cleanup,
                            "Failed to remove blob after note insert failed"
                        );
                    }
                }
                return Err(e.into());
            }
        };
        let note: Note = from_record(Table::Notes, persisted)?;
        self.invalidate();

        tracing::info!(
            note_id = %note.id,
            subject_id = %note.subject_id,
            approved = note.is_approved,
            "Created note"
        );
        Ok(note)
    }

    /// Mark a note approved so it shows up in public listings. Returns
    /// `None` when no such note exists.
    pub async fn approve_note(&self, id: &str) -> Result<Option<Note>, NoteError> {
        let mut patch = Record::new();
        patch.insert("is_approved".into(), Value::Bool(true));

        let updated = self
            .store
            .update(Table::Notes, &[Filter::eq("id", id)], patch)
            .await?;
        self.invalidate();

        match updated.into_iter().next() {
            Some(record) => {
                tracing::info!(note_id = %id, "Approved note");
                Ok(Some(from_record(Table::Notes, record)?))
            }
            None => Ok(None),
        }
    }

    /// Insert each given subject whose code is not in the catalog yet.
    /// Returns how many were inserted. Seeded subjects get an id derived
    /// from their code, so every node seeding the same list writes the same
    /// rows and a partially seeded catalog is completed on the next run.
    pub async fn seed_subjects(&self, seeds: &[SubjectSeed]) -> Result<usize, NoteError> {
        let mut inserted = 0;
        for seed in seeds {
            let existing = self
                .store
                .select(Table::Subjects, &Query::new().eq("code", seed.code))
                .await?;
            if !existing.is_empty() {
                continue;
            }

            let mut record = to_record(Table::Subjects, seed)?;
            record.insert("id".into(), Value::from(seed_subject_id(seed.code)));
            match self.store.insert(Table::Subjects, record).await {
                Ok(_) => inserted += 1,
                // Seeded concurrently elsewhere
                Err(StoreError::Conflict(message)) => {
                    tracing::debug!(code = seed.code, %message, "Subject already seeded");
                }
                Err(e) => {
                    if inserted > 0 {
                        self.invalidate();
                    }
                    return Err(e.into());
                }
            }
        }

        if inserted > 0 {
            self.invalidate();
        }
        Ok(inserted)
    }
}

#[async_trait]
impl NoteCreator for NoteRepository {
    async fn create_note(&self, input: NewNote) -> Result<Note, NoteError> {
        NoteRepository::create_note(self, input).await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim tags, drop empty ones and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

/// Stable subject id for a seeded subject code.
pub fn seed_subject_id(code: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, code.as_bytes()).to_string()
}

fn check_file_type(file_name: &str) -> Result<(), NoteError> {
    let name = base_name(file_name);
    let allowed = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_FILE_EXTENSIONS.contains(&ext.as_str()));
    if allowed {
        Ok(())
    } else {
        Err(NoteError::validation(format!(
            "File '{name}' is not an accepted type (PDF, DOC, DOCX, TXT, PPT, PPTX)"
        )))
    }
}

/// A fresh UUID key, carrying the file's extension so it can be served
/// with a sensible content type.
fn blob_key(file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let ext = base_name(file_name)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

/// Strip any client-side directory from an uploaded file name.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = vec![
            " trees ".to_string(),
            "".to_string(),
            "graphs".to_string(),
            "trees".to_string(),
        ];
        assert_eq!(normalize_tags(tags), vec!["trees", "graphs"]);
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("C:\\Users\\me\\notes.pdf"), "notes.pdf");
        assert_eq!(base_name("/tmp/unit-1.docx"), "unit-1.docx");
        assert_eq!(base_name("plain.txt"), "plain.txt");
    }

    #[test]
    fn blob_key_keeps_a_plain_extension() {
        assert!(blob_key("Unit 1.PDF").ends_with(".pdf"));
        assert!(!blob_key("README").contains('.'));
        assert!(!blob_key("archive.tar/gz").contains('.'));
        assert!(!blob_key("weird.p d f").contains('.'));
    }

    #[test]
    fn only_document_types_are_accepted() {
        for name in ["unit-1.pdf", "Syllabus.DOCX", "C:\\notes\\slides.pptx", "todo.txt"] {
            assert!(check_file_type(name).is_ok(), "{name} should be accepted");
        }
        for name in ["index.html", "setup.exe", "README", "notes.pdf.html", ".pdf/evil.sh"] {
            assert!(
                matches!(check_file_type(name), Err(NoteError::Validation(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn seeded_ids_are_stable() {
        assert_eq!(seed_subject_id("BCA-101"), seed_subject_id("BCA-101"));
        assert_ne!(seed_subject_id("BCA-101"), seed_subject_id("BCA-201"));
    }

    #[tokio::test]
    async fn unknown_subject_filters_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::storage::Database::open(dir.path().join("data")).unwrap();
        let blobs = Arc::new(crate::object_store::LocalStore::new(dir.path().join("files")).unwrap());
        let repo = NoteRepository::new(
            Arc::new(crate::store::EmbeddedStore::new(db)),
            blobs,
            NotesConfig::default(),
        );
        repo.seed_subjects(&crate::seed::default_subjects())
            .await
            .unwrap();

        for i in 0..50 {
            let listed = repo.list_notes(Some(&format!("bogus-{i}"))).await.unwrap();
            assert!(listed.is_empty());
        }
        assert!(repo.cache.is_empty());

        let subject = repo.list_subjects().await.unwrap().remove(0);
        repo.list_notes(Some(&subject.id)).await.unwrap();
        assert_eq!(repo.cache.len(), 1);
    }
}
