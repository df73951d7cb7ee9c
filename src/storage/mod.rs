pub mod db;
pub mod models;
mod notes;
mod subjects;
mod tables;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
