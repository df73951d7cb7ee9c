use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use notes_hub::config::NotesConfig;
use notes_hub::error::NoteError;
use notes_hub::object_store::LocalStore;
use notes_hub::repository::{NewNote, NoteRepository};
use notes_hub::seed;
use notes_hub::storage::models::Note;
use notes_hub::storage::Database;
use notes_hub::store::EmbeddedStore;
use notes_hub::upload::{FormStatus, NoteCreator, SubmitError, UploadForm};
use tokio::sync::Mutex;

/// Counts create calls before handing them to the repository.
struct CountingCreator {
    calls: AtomicUsize,
    repo: NoteRepository,
}

#[async_trait]
impl NoteCreator for CountingCreator {
    async fn create_note(&self, input: NewNote) -> Result<Note, NoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.repo.create_note(input).await
    }
}

async fn setup() -> (tempfile::TempDir, Database, Arc<CountingCreator>, String) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let blobs = Arc::new(LocalStore::new(dir.path().join("files")).unwrap());
    let repo = NoteRepository::new(
        Arc::new(EmbeddedStore::new(db.clone())),
        blobs,
        NotesConfig::default(),
    );
    repo.seed_subjects(&seed::default_subjects()).await.unwrap();
    let subject_id = repo.list_subjects().await.unwrap()[0].id.clone();

    let creator = Arc::new(CountingCreator {
        calls: AtomicUsize::new(0),
        repo,
    });
    (dir, db, creator, subject_id)
}

fn filled_form(subject_id: &str) -> UploadForm {
    let mut form = UploadForm::new();
    form.edit(|f| {
        f.title = "Trees".to_string();
        f.subject_id = subject_id.to_string();
        f.description = "BST and AVL rotations".to_string();
        f.tags = "bst, avl".to_string();
        f.user_id = Some("user-42".to_string());
    });
    form
}

#[tokio::test]
async fn test_double_submission_persists_one_note() {
    let (_dir, db, creator, subject_id) = setup().await;
    let form = Arc::new(Mutex::new(filled_form(&subject_id)));

    // First submission is accepted and left outstanding
    let input = form.lock().await.begin_submit().unwrap();

    // A second activation while outstanding is rejected
    let second = form.lock().await.begin_submit();
    assert!(matches!(second, Err(SubmitError::InFlight)));
    assert!(!form.lock().await.can_submit());

    let result = creator.create_note(input).await;
    form.lock().await.complete(result);

    assert_eq!(creator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(db.get_all_notes().unwrap().len(), 1);
    assert!(matches!(
        form.lock().await.status(),
        FormStatus::Succeeded(_)
    ));
}

#[tokio::test]
async fn test_success_clears_fields_but_keeps_identity() {
    let (_dir, _db, creator, subject_id) = setup().await;
    let mut form = filled_form(&subject_id);

    let status = form.submit(creator.as_ref()).await.unwrap().clone();
    let FormStatus::Succeeded(note) = status else {
        panic!("unexpected status: {status:?}");
    };
    assert_eq!(note.title, "Trees");
    assert_eq!(note.tags, vec!["bst", "avl"]);
    assert_eq!(note.user_id.as_deref(), Some("user-42"));

    assert!(form.fields().title.is_empty());
    assert!(form.fields().subject_id.is_empty());
    assert!(form.fields().tags.is_empty());
    assert_eq!(form.fields().user_id.as_deref(), Some("user-42"));
    assert!(form.can_submit());
}

#[tokio::test]
async fn test_invalid_form_never_calls_creator() {
    let (_dir, db, creator, _) = setup().await;
    let mut form = UploadForm::new();
    form.edit(|f| f.title = "Trees".to_string());

    let result = form.submit(creator.as_ref()).await;
    assert!(matches!(result, Err(SubmitError::Invalid(ref errors)) if errors.len() == 1));
    assert_eq!(creator.calls.load(Ordering::SeqCst), 0);
    assert!(db.get_all_notes().unwrap().is_empty());
    assert_eq!(form.status(), &FormStatus::Editing);
}

#[tokio::test]
async fn test_failed_submission_can_be_retried() {
    let (_dir, db, creator, subject_id) = setup().await;
    let mut form = filled_form("no-such-subject");

    form.submit(creator.as_ref()).await.unwrap();
    assert!(matches!(form.status(), FormStatus::Failed(message) if message.contains("does not exist")));
    assert_eq!(form.fields().title, "Trees");

    // Fixing the field returns the form to editing and the retry succeeds
    assert!(form.edit(|f| f.subject_id = subject_id.clone()));
    assert_eq!(form.status(), &FormStatus::Editing);
    form.submit(creator.as_ref()).await.unwrap();
    assert!(matches!(form.status(), FormStatus::Succeeded(_)));

    assert_eq!(creator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(db.get_all_notes().unwrap().len(), 1);
}
