//! Shared test helpers for notes-hub unit tests.

use std::sync::Arc;

use crate::config::{ClusterConfig, Config, NodeConfig, NotesConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::repository::NoteRepository;
use crate::seed;
use crate::storage::models::Subject;
use crate::storage::Database;
use crate::store::EmbeddedStore;
use crate::AppState;

/// Create a test AppState with a temporary database, local object store
/// and the default subjects seeded.
pub async fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, NotesConfig::default()).await
}

/// Same as [`test_state`] with a custom note policy.
pub async fn test_state_with(temp_dir: &tempfile::TempDir, policy: NotesConfig) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        cluster: ClusterConfig::default(),
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            id: uuid::Uuid::new_v4().to_string(),
        },
        notes: policy.clone(),
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            ..StorageConfig::default()
        },
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store =
        Arc::new(LocalStore::new(&files_dir).expect("Failed to create test object store"));
    let store = Arc::new(EmbeddedStore::new(db.clone()));

    let notes = NoteRepository::new(store, object_store.clone(), policy);
    notes
        .seed_subjects(&seed::default_subjects())
        .await
        .expect("Failed to seed subjects");

    Arc::new(AppState {
        config,
        notes,
        object_store,
        db: Some(db),
        node: None,
    })
}

/// The seeded subject with the lowest code.
pub async fn first_subject(state: &AppState) -> Subject {
    state
        .notes
        .list_subjects()
        .await
        .expect("Failed to list subjects")
        .into_iter()
        .next()
        .expect("No subjects seeded")
}
