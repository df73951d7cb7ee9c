use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::catalog::{self, CatalogStats, SubjectSummary};
use crate::storage::models::Subject;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
}

pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<Vec<Subject>>>, ApiError> {
    let mut subjects = state.notes.list_subjects().await?;
    if let Some(ref term) = params.search {
        subjects.retain(|s| catalog::matches_search(s, term));
    }
    Ok(JSend::success(subjects))
}

/// Subjects with their total and recent note counts.
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<Vec<SubjectSummary>>>, ApiError> {
    let summaries =
        catalog::build_catalog(&state.notes, params.search.as_deref(), Utc::now()).await?;
    Ok(JSend::success(summaries))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<CatalogStats>>, ApiError> {
    let stats = catalog::build_stats(&state.notes).await?;
    Ok(JSend::success(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn search_filters_seeded_subjects() {
        let dir = tempfile::tempdir().unwrap();
        let state = testutil::test_state(&dir).await;

        let Json(all) = list_subjects(
            State(Arc::clone(&state)),
            AppQuery(SearchParams { search: None }),
        )
        .await
        .unwrap();
        assert_eq!(all.data.len(), 6);
        let codes: Vec<&str> = all.data.iter().map(|s| s.code.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);

        let Json(found) = list_subjects(
            State(state),
            AppQuery(SearchParams {
                search: Some("web".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(found.data.len(), 1);
        assert_eq!(found.data[0].code, "BCA-401");
    }

    #[tokio::test]
    async fn catalog_starts_with_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let state = testutil::test_state(&dir).await;

        let Json(summaries) = catalog(State(state), AppQuery(SearchParams { search: None }))
            .await
            .unwrap();
        assert_eq!(summaries.data.len(), 6);
        assert!(summaries
            .data
            .iter()
            .all(|s| s.total_notes == 0 && s.recent_notes == 0));
    }
}
