use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A curriculum subject that notes are filed under. Reference data,
/// maintained out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    /// Short unique code, e.g. "BCA-301"
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A study-material record tied to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    // System fields
    pub id: String,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub is_approved: bool,

    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub uploader_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,

    // Attached file reference (blob lives in the object store)
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// A note joined with the subject it is filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedNote {
    #[serde(flatten)]
    pub note: Note,
    pub subject: Subject,
}

/// Types of write operations (replicated via muster)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    PutSubject(Subject),
    PutNote(Note),
}

/// Relational backends hand back `null` for an empty array column.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
