use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{from_record, to_record, Filter, Query, Record, RecordStore, StoreError, Table};
use crate::state_machine::CatalogStateMachine;
use crate::storage::models::{Note, Subject, WriteOp};
use crate::storage::Database;

/// How writes reach the database.
enum WritePath {
    /// Single node: apply straight to the local redb.
    Direct,
    /// Clustered: replicate through muster, which applies on every node.
    Replicated(Arc<muster::RedbNode<CatalogStateMachine>>),
}

/// Record store backed by the local redb database. Acts as the "server" for
/// inserted rows: it assigns ids, timestamps and column defaults, and
/// enforces subject-code uniqueness and note-to-subject references.
pub struct EmbeddedStore {
    db: Database,
    writes: WritePath,
}

impl EmbeddedStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            writes: WritePath::Direct,
        }
    }

    pub fn replicated(db: Database, node: Arc<muster::RedbNode<CatalogStateMachine>>) -> Self {
        Self {
            db,
            writes: WritePath::Replicated(node),
        }
    }

    async fn write(&self, op: WriteOp) -> Result<(), StoreError> {
        match &self.writes {
            WritePath::Direct => Ok(self.db.apply(&op)?),
            WritePath::Replicated(node) => node
                .replicate(op)
                .await
                .map(|_| ())
                .map_err(replication_error),
        }
    }

    fn load(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError> {
        match table {
            Table::Subjects => self
                .db
                .get_all_subjects()?
                .iter()
                .map(|s| to_record(table, s))
                .collect(),
            // Use the subject index when the query pins a subject
            Table::Notes => {
                let notes = match query.pinned("subject_id") {
                    Some(subject_id) => self.db.get_notes_by_subject(subject_id)?,
                    None => self.db.get_all_notes()?,
                };
                notes.iter().map(|n| to_record(table, n)).collect()
            }
        }
    }

    fn check_subject_code(&self, subject: &Subject) -> Result<(), StoreError> {
        match self.db.subject_id_for_code(&subject.code)? {
            Some(owner) if owner != subject.id => Err(StoreError::Conflict(format!(
                "subject code '{}' is already in use",
                subject.code
            ))),
            _ => Ok(()),
        }
    }

    fn check_note_subject(&self, note: &Note) -> Result<(), StoreError> {
        if self.db.get_subject(&note.subject_id)?.is_none() {
            return Err(StoreError::InvalidRecord {
                table: Table::Notes,
                message: format!("subject '{}' does not exist", note.subject_id),
            });
        }
        Ok(())
    }

    async fn insert_subject(&self, mut record: Record) -> Result<Record, StoreError> {
        fill_default(&mut record, "id", || Value::from(uuid::Uuid::new_v4().to_string()));
        let subject: Subject = from_record(Table::Subjects, record)?;

        if self.db.get_subject(&subject.id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "subject '{}' already exists",
                subject.id
            )));
        }
        self.check_subject_code(&subject)?;

        self.write(WriteOp::PutSubject(subject.clone())).await?;
        tracing::debug!(subject_id = %subject.id, code = %subject.code, "Inserted subject");
        to_record(Table::Subjects, &subject)
    }

    async fn insert_note(&self, mut record: Record) -> Result<Record, StoreError> {
        fill_default(&mut record, "id", || Value::from(uuid::Uuid::new_v4().to_string()));
        fill_default(&mut record, "download_count", || Value::from(0));
        fill_default(&mut record, "is_approved", || Value::from(false));
        fill_default(&mut record, "tags", || Value::Array(Vec::new()));
        record.insert("created_at".to_string(), Value::from(Utc::now().to_rfc3339()));

        let note: Note = from_record(Table::Notes, record)?;
        if note.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                table: Table::Notes,
                message: "title must not be empty".to_string(),
            });
        }
        if self.db.get_note(&note.id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "note '{}' already exists",
                note.id
            )));
        }
        self.check_note_subject(&note)?;

        self.write(WriteOp::PutNote(note.clone())).await?;
        tracing::debug!(note_id = %note.id, subject_id = %note.subject_id, "Inserted note");
        to_record(Table::Notes, &note)
    }
}

#[async_trait]
impl RecordStore for EmbeddedStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError> {
        let records = self.load(table, query)?;
        Ok(query.apply(records))
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        match table {
            Table::Subjects => self.insert_subject(record).await,
            Table::Notes => self.insert_note(record).await,
        }
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let query = Query {
            filters: filters.to_vec(),
            order: None,
        };
        let matching = query.apply(self.load(table, &query)?);

        let mut updated = Vec::with_capacity(matching.len());
        for mut record in matching {
            // Identity and creation time are server-owned
            for (column, value) in patch.iter() {
                if column != "id" && column != "created_at" {
                    record.insert(column.clone(), value.clone());
                }
            }

            let op = match table {
                Table::Subjects => {
                    let subject: Subject = from_record(table, record)?;
                    self.check_subject_code(&subject)?;
                    WriteOp::PutSubject(subject)
                }
                Table::Notes => {
                    let note: Note = from_record(table, record)?;
                    self.check_note_subject(&note)?;
                    WriteOp::PutNote(note)
                }
            };

            let row = match &op {
                WriteOp::PutSubject(subject) => to_record(table, subject)?,
                WriteOp::PutNote(note) => to_record(table, note)?,
            };
            self.write(op).await?;
            updated.push(row);
        }

        tracing::debug!(table = %table, rows = updated.len(), "Updated records");
        Ok(updated)
    }
}

/// Set a column default when the caller left it out or sent `null`.
fn fill_default(record: &mut Record, column: &str, default: impl FnOnce() -> Value) {
    if record.get(column).map_or(true, Value::is_null) {
        record.insert(column.to_string(), default());
    }
}

fn replication_error(e: muster::MusterError) -> StoreError {
    match e {
        muster::MusterError::NotLeader { .. } => {
            StoreError::Unavailable("No leader available, retry shortly".to_string())
        }
        muster::MusterError::NoQuorum => {
            StoreError::Unavailable("Failed to reach quorum for replication".to_string())
        }
        _ => StoreError::Replication(e.to_string()),
    }
}
