//! HTTP client for the notes API, for front-ends and tooling.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::response::{JSend, JSendError, JSendFail, PaginatedData};
use crate::catalog::{CatalogStats, SubjectSummary};
use crate::error::NoteError;
use crate::repository::NewNote;
use crate::storage::models::{ListedNote, Note, Subject};
use crate::store::StoreError;
use crate::upload::NoteCreator;

/// Page size used when walking the full note listing.
const PAGE_SIZE: u32 = 100;

pub struct NotesClient {
    base_url: String,
    client: Client,
    page_size: u32,
}

impl NotesClient {
    pub fn new(base_url: &str) -> Result<Self, NoteError> {
        let client = Client::builder().build().map_err(StoreError::from)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            page_size: PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn list_subjects(&self, search: Option<&str>) -> Result<Vec<Subject>, NoteError> {
        let request = self.client.get(self.url("/subjects"));
        fetch(with_search(request, search)).await
    }

    pub async fn catalog(&self, search: Option<&str>) -> Result<Vec<SubjectSummary>, NoteError> {
        let request = self.client.get(self.url("/catalog"));
        fetch(with_search(request, search)).await
    }

    pub async fn stats(&self) -> Result<CatalogStats, NoteError> {
        fetch(self.client.get(self.url("/stats"))).await
    }

    /// Every approved note, optionally for one subject, newest first.
    /// Notes created between page requests shift the listing down; items
    /// already seen on an earlier page are skipped.
    pub async fn list_notes(&self, subject_id: Option<&str>) -> Result<Vec<ListedNote>, NoteError> {
        let mut notes = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0u32;

        loop {
            let mut request = self
                .client
                .get(self.url("/notes"))
                .query(&[("limit", self.page_size), ("offset", offset)]);
            if let Some(subject_id) = subject_id {
                request = request.query(&[("subject_id", subject_id)]);
            }

            let page: PaginatedData<ListedNote> = fetch(request).await?;
            let fetched = page.items.len() as u32;
            collect_page(&mut notes, &mut seen, page.items);
            offset += fetched;

            if fetched < self.page_size || u64::from(offset) >= page.pagination.total {
                return Ok(notes);
            }
        }
    }

    pub async fn recent(&self, limit: u32) -> Result<Vec<ListedNote>, NoteError> {
        let request = self
            .client
            .get(self.url("/notes/recent"))
            .query(&[("limit", limit)]);
        fetch(request).await
    }

    pub async fn create_note(&self, input: NewNote) -> Result<Note, NoteError> {
        let mut form = Form::new()
            .text("title", input.title)
            .text("subject_id", input.subject_id);
        if let Some(description) = input.description {
            form = form.text("description", description);
        }
        if !input.tags.is_empty() {
            form = form.text("tags", input.tags.join(","));
        }
        if let Some(uploader_name) = input.uploader_name {
            form = form.text("uploader_name", uploader_name);
        }
        if let Some(user_id) = input.user_id {
            form = form.text("user_id", user_id);
        }
        if let Some(file) = input.file {
            form = form.part("file", Part::bytes(file.data.to_vec()).file_name(file.name));
        }

        fetch(self.client.post(self.url("/notes")).multipart(form)).await
    }
}

#[async_trait]
impl NoteCreator for NotesClient {
    async fn create_note(&self, input: NewNote) -> Result<Note, NoteError> {
        NotesClient::create_note(self, input).await
    }
}

/// Append the notes of one page that have not been collected yet.
fn collect_page(notes: &mut Vec<ListedNote>, seen: &mut HashSet<String>, page: Vec<ListedNote>) {
    for item in page {
        if seen.insert(item.note.id.clone()) {
            notes.push(item);
        }
    }
}

fn with_search(request: RequestBuilder, search: Option<&str>) -> RequestBuilder {
    match search.filter(|s| !s.is_empty()) {
        Some(term) => request.query(&[("search", term)]),
        None => request,
    }
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, NoteError> {
    let response = request.send().await.map_err(StoreError::from)?;
    read_data(response).await
}

/// Unwrap a JSend success envelope, or map a fail/error envelope back onto
/// the error taxonomy the server produced it from.
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, NoteError> {
    let status = response.status();
    if status.is_success() {
        let envelope: JSend<T> = response.json().await.map_err(StoreError::from)?;
        return Ok(envelope.data);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    let error = match status {
        StatusCode::BAD_REQUEST => return Err(NoteError::Validation(message)),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Backend {
            status: status.as_u16(),
            message,
        },
    };
    Err(NoteError::Query(error))
}

fn error_message(body: &str) -> String {
    if let Ok(fail) = serde_json::from_str::<JSendFail>(body) {
        return fail.data.message;
    }
    if let Ok(error) = serde_json::from_str::<JSendError>(body) {
        return error.message;
    }
    body.to_string()
}
