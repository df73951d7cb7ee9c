use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend, PaginatedData, Pagination};
use crate::catalog;
use crate::repository::{FileUpload, NewNote};
use crate::storage::models::{ListedNote, Note};
use crate::upload::parse_tags;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub subject_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentNotesParams {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

fn default_recent_limit() -> u32 {
    5
}

const MAX_RECENT_LIMIT: u32 = 50;

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListNotesParams>,
) -> Result<Json<JSend<PaginatedData<ListedNote>>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let subject_id = params.subject_id.as_deref().filter(|s| !s.is_empty());
    let notes = state.notes.list_notes(subject_id).await?;

    let total = notes.len() as u64;
    let items: Vec<ListedNote> = notes
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect();

    Ok(JSend::paginated(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn recent_notes(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<RecentNotesParams>,
) -> Result<Json<JSend<Vec<ListedNote>>>, ApiError> {
    if params.limit == 0 || params.limit > MAX_RECENT_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_RECENT_LIMIT}"
        )));
    }

    let notes = catalog::recent_activity(&state.notes, params.limit as usize).await?;
    Ok(JSend::success(notes))
}

pub async fn create_note(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<Note>>, ApiError> {
    let mut input = NewNote::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            let name = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

            if data.len() as u64 > state.config.max_upload_size {
                return Err(ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {} bytes",
                    state.config.max_upload_size
                )));
            }

            // Browsers send an empty, unnamed part when no file was picked
            match name.filter(|n| !n.is_empty()) {
                Some(name) => input.file = Some(FileUpload { name, data }),
                None if data.is_empty() => {}
                None => return Err(ApiError::bad_request("file part must carry a filename")),
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid {field_name}: {e}")))?;

        match field_name.as_str() {
            "title" => input.title = value,
            "subject_id" => input.subject_id = value,
            "description" => input.description = Some(value),
            // Either one comma-separated field or repeated fields
            "tags" => input.tags.extend(parse_tags(&value)),
            "uploader_name" => input.uploader_name = Some(value),
            "user_id" => input.user_id = Some(value),
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let note = state.notes.create_note(input).await?;
    Ok(JSend::success(note))
}

/// Out-of-band moderation: make a note publicly visible.
pub async fn approve_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Note>>, ApiError> {
    let note = state
        .notes
        .approve_note(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Note not found"))?;

    Ok(JSend::success(note))
}
