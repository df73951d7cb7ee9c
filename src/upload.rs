//! Note upload form: field state plus the submission state machine.
//!
//! ```text
//! Editing ──submit (valid)──▶ Submitting ──ok──▶ Succeeded (fields cleared)
//!    ▲  └─submit (invalid): stays, reports field errors      │
//!    │                           └──err──▶ Failed (fields kept)
//!    └──────────── any edit ─────────────────────┘
//! ```
//!
//! The machine does no I/O itself: `begin_submit` hands out the request and
//! `complete` takes the outcome, so the caller decides how the create call
//! is dispatched. `submit` does both around any [`NoteCreator`].

use async_trait::async_trait;

use crate::error::NoteError;
use crate::repository::{FileUpload, NewNote};
use crate::storage::models::Note;

/// Anything that can persist a new note.
#[async_trait]
pub trait NoteCreator: Send + Sync {
    async fn create_note(&self, input: NewNote) -> Result<Note, NoteError>;
}

/// Raw form values as the user typed them.
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub title: String,
    pub subject_id: String,
    pub description: String,
    /// Comma-separated, e.g. "algorithms, sorting, binary-tree"
    pub tags: String,
    pub uploader_name: String,
    /// Authenticated identity, when there is one
    pub user_id: Option<String>,
    pub file: Option<FileUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Subject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FormStatus {
    #[default]
    Editing,
    Submitting,
    Succeeded(Note),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("form has invalid fields")]
    Invalid(Vec<FieldError>),
    #[error("a submission is already in progress")]
    InFlight,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: UploadFields,
    field_errors: Vec<FieldError>,
    status: FormStatus,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &UploadFields {
        &self.fields
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        !matches!(self.status, FormStatus::Submitting)
    }

    /// Change field values. Ignored while a submission is outstanding;
    /// otherwise the form returns to editing. Returns whether the edit
    /// was applied.
    pub fn edit(&mut self, change: impl FnOnce(&mut UploadFields)) -> bool {
        if !self.can_submit() {
            return false;
        }
        change(&mut self.fields);
        self.field_errors.clear();
        self.status = FormStatus::Editing;
        true
    }

    /// Required-field check, producing the create request on success.
    pub fn validate(&self) -> Result<NewNote, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.fields.title.trim().is_empty() {
            errors.push(FieldError {
                field: Field::Title,
                message: "Title is required",
            });
        }
        if self.fields.subject_id.trim().is_empty() {
            errors.push(FieldError {
                field: Field::Subject,
                message: "Please select a subject",
            });
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let fields = &self.fields;
        Ok(NewNote {
            title: fields.title.trim().to_string(),
            subject_id: fields.subject_id.trim().to_string(),
            description: Some(fields.description.clone()),
            tags: parse_tags(&fields.tags),
            uploader_name: Some(fields.uploader_name.clone()),
            user_id: fields.user_id.clone(),
            file: fields.file.clone(),
        })
    }

    /// Move to `Submitting` and hand out the request to send. The caller
    /// must follow up with exactly one `complete`.
    pub fn begin_submit(&mut self) -> Result<NewNote, SubmitError> {
        if !self.can_submit() {
            return Err(SubmitError::InFlight);
        }
        match self.validate() {
            Ok(input) => {
                self.field_errors.clear();
                self.status = FormStatus::Submitting;
                Ok(input)
            }
            Err(errors) => {
                self.field_errors = errors.clone();
                self.status = FormStatus::Editing;
                Err(SubmitError::Invalid(errors))
            }
        }
    }

    /// Record the outcome of the create call started by `begin_submit`.
    /// Success clears the fields; failure keeps them for another attempt.
    pub fn complete(&mut self, result: Result<Note, NoteError>) {
        if !matches!(self.status, FormStatus::Submitting) {
            tracing::warn!("Upload result arrived with no submission outstanding");
            return;
        }
        self.status = match result {
            Ok(note) => {
                self.fields = UploadFields {
                    user_id: self.fields.user_id.take(),
                    ..Default::default()
                };
                FormStatus::Succeeded(note)
            }
            Err(NoteError::Validation(message)) => {
                // Server-side validation maps back onto the form inline
                FormStatus::Failed(message)
            }
            Err(e) => FormStatus::Failed(e.to_string()),
        };
    }

    /// Validate, call the creator once, and record the outcome.
    pub async fn submit<C>(&mut self, creator: &C) -> Result<&FormStatus, SubmitError>
    where
        C: NoteCreator + ?Sized,
    {
        let input = self.begin_submit()?;
        let result = creator.create_note(input).await;
        self.complete(result);
        Ok(&self.status)
    }
}

/// Split a comma-separated tag string into trimmed, non-empty tags.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
