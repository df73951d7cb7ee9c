use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Serve a file attached to a note.
/// Route: GET /files/:key
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.object_store.get(&key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
            ApiError::not_found("File not found")
        }
        _ => ApiError::internal(format!("Failed to retrieve file: {e}")),
    })?;

    let mime = mime_guess::from_path(&key).first_or_octet_stream();
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    if let Ok(value) = mime.essence_str().parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_static("inline"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );

    // Blobs never change once written
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=86400, immutable"),
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FileUpload, NewNote};
    use crate::testutil;
    use bytes::Bytes;

    #[tokio::test]
    async fn serves_attached_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let state = testutil::test_state(&dir).await;
        let subject = testutil::first_subject(&state).await;

        let note = state
            .notes
            .create_note(NewNote {
                title: "Unit 1".to_string(),
                subject_id: subject.id,
                file: Some(FileUpload {
                    name: "unit-1.pdf".to_string(),
                    data: Bytes::from_static(b"%PDF-1.4"),
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        let key = note
            .file_url
            .as_deref()
            .and_then(|url| url.strip_prefix("/files/"))
            .unwrap()
            .to_string();

        let response = serve_file(State(state), Path(key)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "inline");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn unknown_or_unsafe_keys_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = testutil::test_state(&dir).await;

        for key in ["missing.pdf", "../notes-hub.redb"] {
            let result = serve_file(State(Arc::clone(&state)), Path(key.to_string())).await;
            assert!(matches!(result, Err(ApiError::Fail(code, _)) if code == StatusCode::NOT_FOUND));
        }
    }
}
