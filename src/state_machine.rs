//! Catalog state machine for muster cluster replication.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::repository::ListingCache;
use crate::storage::models::{Note, Subject, WriteOp};
use crate::storage::Database;

/// The catalog state machine, replicated by muster.
pub struct CatalogStateMachine {
    db: Database,
    listings: Option<Arc<ListingCache>>,
}

impl CatalogStateMachine {
    pub fn new(db: Database) -> Self {
        Self { db, listings: None }
    }

    /// Invalidate this node's listing cache whenever a write is applied,
    /// including writes replicated from other nodes.
    pub fn with_listing_cache(mut self, cache: Arc<ListingCache>) -> Self {
        self.listings = Some(cache);
        self
    }

    fn invalidate_listings(&self) {
        if let Some(ref cache) = self.listings {
            cache.invalidate();
        }
    }
}

/// Full state snapshot for syncing lagging followers.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub subjects: Vec<Subject>,
    pub notes: Vec<Note>,
}

impl muster::StateMachine for CatalogStateMachine {
    type WriteOp = WriteOp;
    type Snapshot = CatalogSnapshot;

    fn apply(&self, op: &WriteOp) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.db.apply(op)?;
        self.invalidate_listings();
        Ok(())
    }

    fn snapshot(&self) -> Result<CatalogSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        Ok(CatalogSnapshot {
            subjects: self.db.get_all_subjects()?,
            notes: self.db.get_all_notes()?,
        })
    }

    // Subjects first so restored notes never reference a missing subject.
    fn restore(
        &self,
        snapshot: CatalogSnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for subject in &snapshot.subjects {
            self.db.put_subject(subject)?;
        }
        for note in &snapshot.notes {
            self.db.put_note(note)?;
        }
        self.invalidate_listings();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster::StateMachine;

    fn subject(id: &str, code: &str) -> Subject {
        Subject {
            id: id.to_string(),
            name: format!("Subject {code}"),
            code: code.to_string(),
            description: None,
            color: None,
            icon: None,
        }
    }

    fn note(id: &str, subject_id: &str) -> Note {
        Note {
            id: id.to_string(),
            subject_id: subject_id.to_string(),
            created_at: chrono::Utc::now(),
            download_count: 0,
            is_approved: true,
            title: "Graphs".to_string(),
            description: None,
            tags: vec![],
            uploader_name: None,
            user_id: None,
            file_url: None,
            file_name: None,
            file_size: None,
        }
    }

    #[test]
    fn snapshot_restores_into_empty_database() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = CatalogStateMachine::new(Database::open(source_dir.path()).unwrap());
        source
            .apply(&WriteOp::PutSubject(subject("s1", "BCA-201")))
            .unwrap();
        source.apply(&WriteOp::PutNote(note("n1", "s1"))).unwrap();

        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot.subjects.len(), 1);
        assert_eq!(snapshot.notes.len(), 1);

        let target_dir = tempfile::tempdir().unwrap();
        let target_db = Database::open(target_dir.path()).unwrap();
        CatalogStateMachine::new(target_db.clone())
            .restore(snapshot)
            .unwrap();

        assert_eq!(target_db.get_notes_by_subject("s1").unwrap().len(), 1);
        assert_eq!(
            target_db.subject_id_for_code("BCA-201").unwrap().as_deref(),
            Some("s1")
        );
    }

    #[test]
    fn applied_writes_invalidate_listings() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ListingCache::new(std::time::Duration::from_secs(60)));
        let machine = CatalogStateMachine::new(Database::open(dir.path()).unwrap())
            .with_listing_cache(Arc::clone(&cache));

        let generation = cache.generation();
        cache.store_notes(None, generation, Arc::new(Vec::new()));
        machine
            .apply(&WriteOp::PutSubject(subject("s1", "BCA-201")))
            .unwrap();

        assert!(cache.notes(None).is_none());
        assert!(cache.generation() > generation);
    }
}
