use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Subject;
use super::tables::*;

impl Database {
    /// Store a subject record and keep the code index in step with it
    pub fn put_subject(&self, subject: &Subject) -> Result<(), DatabaseError> {
        debug_assert!(!subject.id.is_empty(), "subject id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SUBJECTS)?;
            let previous: Option<Subject> = match table.get(subject.id.as_str())? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            let data = rmp_serde::to_vec_named(subject)?;
            table.insert(subject.id.as_str(), data.as_slice())?;

            let mut code_table = write_txn.open_table(SUBJECT_CODES)?;
            if let Some(previous) = previous.filter(|p| p.code != subject.code) {
                code_table.remove(previous.code.as_str())?;
            }
            code_table.insert(subject.code.as_str(), subject.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_subject(&self, id: &str) -> Result<Option<Subject>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve a subject code (e.g. "BCA-101") to its subject id
    pub fn subject_id_for_code(&self, code: &str) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECT_CODES)?;
        Ok(table.get(code)?.map(|id| id.value().to_string()))
    }

    /// All subjects, in key order
    pub fn get_all_subjects(&self) -> Result<Vec<Subject>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;

        let mut subjects = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            subjects.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(subjects)
    }
}
