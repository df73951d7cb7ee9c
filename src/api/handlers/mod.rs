mod admin;
mod files;
mod notes;
mod subjects;

pub use admin::{admin_purge, cluster_status, health};
pub use files::serve_file;
pub use notes::{approve_note, create_note, list_notes, recent_notes};
pub use subjects::{catalog, list_subjects, stats};
