//! notes-hub - A study-notes catalog service
//!
//! This crate serves a subject catalog and approved study notes, and accepts
//! note uploads, with:
//! - A generic select/insert record store boundary (embedded redb or a
//!   PostgREST-compatible remote service)
//! - Embedded catalog writes replicated via muster when clustered
//! - Listing cache invalidated on every successful upload
//! - An upload-form state machine and HTTP client for front-ends
//! - REST API with multipart upload support

pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod object_store;
pub mod repository;
pub mod seed;
pub mod state_machine;
pub mod storage;
pub mod store;
pub mod upload;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use repository::NoteRepository;
use state_machine::CatalogStateMachine;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub notes: NoteRepository,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    /// Local database, present with the embedded store backend
    pub db: Option<Database>,
    /// Cluster node, present when the embedded store is replicated
    pub node: Option<Arc<muster::RedbNode<CatalogStateMachine>>>,
}
