//! Catalog view: per-subject note counts, subject search, and aggregate
//! stats. Everything here is derived from fresh listings on each call.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NoteError;
use crate::repository::NoteRepository;
use crate::storage::models::{ListedNote, Subject};

/// Trailing window, in days, for a note to count as recent.
pub const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    #[serde(flatten)]
    pub subject: Subject,
    pub total_notes: usize,
    pub recent_notes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub subjects: usize,
    pub notes: usize,
    pub downloads: u64,
    /// Distinct uploader names across approved notes
    pub contributors: usize,
}

pub fn is_recent(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at > now - Duration::days(RECENT_WINDOW_DAYS)
}

pub fn summarize(subject: Subject, notes: &[ListedNote], now: DateTime<Utc>) -> SubjectSummary {
    SubjectSummary {
        total_notes: notes.len(),
        recent_notes: notes
            .iter()
            .filter(|n| is_recent(n.note.created_at, now))
            .count(),
        subject,
    }
}

/// Case-insensitive match on subject name or code. A blank term matches all.
pub fn matches_search(subject: &Subject, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty()
        || subject.name.to_lowercase().contains(&term)
        || subject.code.to_lowercase().contains(&term)
}

/// One summary per (matching) subject, in subject code order.
pub async fn build_catalog(
    repo: &NoteRepository,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<SubjectSummary>, NoteError> {
    let subjects = repo.list_subjects().await?;

    let mut summaries = Vec::with_capacity(subjects.len());
    for subject in subjects {
        if !search.map_or(true, |term| matches_search(&subject, term)) {
            continue;
        }
        let notes = repo.list_notes(Some(&subject.id)).await?;
        summaries.push(summarize(subject, &notes, now));
    }
    Ok(summaries)
}

pub fn stats(subjects: &[Subject], notes: &[ListedNote]) -> CatalogStats {
    let contributors: HashSet<&str> = notes
        .iter()
        .filter_map(|n| n.note.uploader_name.as_deref())
        .collect();

    CatalogStats {
        subjects: subjects.len(),
        notes: notes.len(),
        downloads: notes.iter().map(|n| n.note.download_count).sum(),
        contributors: contributors.len(),
    }
}

pub async fn build_stats(repo: &NoteRepository) -> Result<CatalogStats, NoteError> {
    let subjects = repo.list_subjects().await?;
    let notes = repo.list_notes(None).await?;
    Ok(stats(&subjects, &notes))
}

/// The newest approved notes across all subjects.
pub async fn recent_activity(
    repo: &NoteRepository,
    limit: usize,
) -> Result<Vec<ListedNote>, NoteError> {
    let mut notes = repo.list_notes(None).await?;
    notes.truncate(limit);
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Note;

    fn subject() -> Subject {
        Subject {
            id: "s1".to_string(),
            name: "Database Management Systems".to_string(),
            code: "BCA-301".to_string(),
            description: None,
            color: None,
            icon: None,
        }
    }

    fn listed(id: &str, created_at: DateTime<Utc>, uploader: Option<&str>) -> ListedNote {
        ListedNote {
            note: Note {
                id: id.to_string(),
                subject_id: "s1".to_string(),
                created_at,
                download_count: 3,
                is_approved: true,
                title: "Normalization".to_string(),
                description: None,
                tags: vec![],
                uploader_name: uploader.map(str::to_string),
                user_id: None,
                file_url: None,
                file_name: None,
                file_size: None,
            },
            subject: subject(),
        }
    }

    #[test]
    fn recent_window_is_exclusive_at_seven_days() {
        let now = Utc::now();
        assert!(is_recent(now - Duration::days(6), now));
        assert!(!is_recent(now - Duration::days(RECENT_WINDOW_DAYS), now));
        assert!(!is_recent(now - Duration::days(30), now));
    }

    #[test]
    fn summary_counts_recent_within_total() {
        let now = Utc::now();
        let notes = vec![
            listed("a", now - Duration::hours(2), None),
            listed("b", now - Duration::days(3), None),
            listed("c", now - Duration::days(10), None),
        ];

        let summary = summarize(subject(), &notes, now);
        assert_eq!(summary.total_notes, 3);
        assert_eq!(summary.recent_notes, 2);
        assert!(summary.recent_notes <= summary.total_notes);
    }

    #[test]
    fn search_matches_name_or_code_case_insensitively() {
        let s = subject();
        assert!(matches_search(&s, "database"));
        assert!(matches_search(&s, "bca-3"));
        assert!(matches_search(&s, "  "));
        assert!(!matches_search(&s, "networks"));
    }

    #[test]
    fn stats_count_distinct_contributors() {
        let now = Utc::now();
        let notes = vec![
            listed("a", now, Some("Asha")),
            listed("b", now, Some("Asha")),
            listed("c", now, Some("Ravi")),
        ];

        let totals = stats(&[subject()], &notes);
        assert_eq!(totals.subjects, 1);
        assert_eq!(totals.notes, 3);
        assert_eq!(totals.downloads, 9);
        assert_eq!(totals.contributors, 2);
    }
}
