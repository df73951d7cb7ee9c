use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::Note;
use super::tables::*;

impl Database {
    // ========================================================================
    // Note operations
    // ========================================================================

    /// Store a note record and update the subject index. Re-putting an
    /// existing note (e.g. on approval) replaces it in place.
    pub fn put_note(&self, note: &Note) -> Result<(), DatabaseError> {
        debug_assert!(!note.id.is_empty(), "note id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(NOTES)?;
            let previous_subject: Option<String> = match table.get(note.id.as_str())? {
                Some(data) => {
                    let existing: Note = rmp_serde::from_slice(data.value())?;
                    Some(existing.subject_id)
                }
                None => None,
            };
            let data = rmp_serde::to_vec_named(note)?;
            table.insert(note.id.as_str(), data.as_slice())?;

            if let Some(old) = previous_subject.filter(|s| *s != note.subject_id) {
                unindex_note(&write_txn, &old, &note.id)?;
            }
            index_note(&write_txn, &note.subject_id, &note.id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_note(&self, id: &str) -> Result<Option<Note>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(NOTES)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get all notes filed under a subject, via the subject index
    pub fn get_notes_by_subject(&self, subject_id: &str) -> Result<Vec<Note>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let subject_table = read_txn.open_table(SUBJECT_NOTES)?;
        let notes_table = read_txn.open_table(NOTES)?;

        let note_ids: Vec<String> = match subject_table.get(subject_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut notes = Vec::with_capacity(note_ids.len());
        for note_id in note_ids {
            if let Some(data) = notes_table.get(note_id.as_str())? {
                notes.push(rmp_serde::from_slice(data.value())?);
            }
        }
        Ok(notes)
    }

    /// Get all notes (for selects without a subject filter and for snapshots)
    pub fn get_all_notes(&self) -> Result<Vec<Note>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(NOTES)?;

        let mut notes = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            notes.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(notes)
    }
}

fn index_note(
    write_txn: &WriteTransaction,
    subject_id: &str,
    note_id: &str,
) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(SUBJECT_NOTES)?;
    let mut note_ids: Vec<String> = match table.get(subject_id)? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };

    if !note_ids.iter().any(|id| id == note_id) {
        note_ids.push(note_id.to_string());
        let data = rmp_serde::to_vec_named(&note_ids)?;
        table.insert(subject_id, data.as_slice())?;
    }
    Ok(())
}

fn unindex_note(
    write_txn: &WriteTransaction,
    subject_id: &str,
    note_id: &str,
) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(SUBJECT_NOTES)?;
    let note_ids: Option<Vec<String>> = match table.get(subject_id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };

    if let Some(mut ids) = note_ids {
        ids.retain(|id| id != note_id);
        if ids.is_empty() {
            table.remove(subject_id)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            table.insert(subject_id, data.as_slice())?;
        }
    }
    Ok(())
}
