use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notes_hub::{
    api,
    config::{Config, StoreBackend},
    object_store as obj,
    error::NoteError,
    repository::{ListingCache, NoteRepository},
    seed,
    state_machine::CatalogStateMachine,
    storage::Database,
    store::{EmbeddedStore, RecordStore, RestStore},
    AppState,
};

type ClusterNode = Arc<muster::RedbNode<CatalogStateMachine>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "notes-hub starting");

    let config = Config::load()?;
    info!("Loaded configuration for node: {}", config.node.id);

    let object_store = Arc::new(obj::LocalStore::new(&config.storage.local_storage_path)?);
    info!(
        "Storing attached files at: {}",
        config.storage.local_storage_path
    );

    let listings = Arc::new(ListingCache::new(config.notes.listing_cache_ttl));
    let mut db = None;
    let mut node = None;
    let mut cluster_handles = Vec::new();

    let store: Arc<dyn RecordStore> = match config.storage.backend {
        StoreBackend::Rest => {
            let url = config
                .storage
                .rest_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REST_URL is required when STORE_BACKEND=rest"))?;
            info!("Using REST store backend at: {}", url);
            Arc::new(RestStore::new(url, config.storage.rest_api_key.as_deref())?)
        }
        StoreBackend::Embedded => {
            let database = Database::open(&config.node.data_dir)?;
            info!("Database opened at: {}", config.node.data_dir);
            db = Some(database.clone());

            if config.is_single_node() {
                info!("Single-node mode, writes applied locally");
                Arc::new(EmbeddedStore::new(database))
            } else {
                let cluster_node = cluster_node(&config, &database, Arc::clone(&listings))?;
                // Start cluster background tasks (heartbeat, election, discovery, TCP server)
                cluster_handles.extend(cluster_node.start());
                info!(
                    peers = config.cluster.peers.len(),
                    "Cluster node started on port {}", config.cluster.cluster_port
                );
                node = Some(Arc::clone(&cluster_node));
                Arc::new(EmbeddedStore::replicated(database, cluster_node))
            }
        }
    };

    let notes =
        NoteRepository::with_cache(store, object_store.clone(), config.notes.clone(), listings);
    info!(
        auto_approve = config.notes.auto_approve,
        "Note approval policy"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        notes,
        object_store,
        db,
        node: node.clone(),
    });

    if config.notes.seed_subjects {
        // Without a leader yet the first attempt fails; keep retrying in the
        // background. Once another node's seed replicates here, every code
        // is present and the retry finishes without writing.
        if let Err(e) = seed_subjects(&state).await {
            tracing::warn!(error = %e, "Failed to seed default subjects, retrying in background");
            let state = Arc::clone(&state);
            tokio::spawn(async move { seed_until_done(state).await });
        }
    }

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(node) = node {
        info!("Shutting down background tasks");
        for handle in cluster_handles {
            handle.abort();
        }

        if let Err(e) = node.persist_state().await {
            tracing::error!(error = %e, "Failed to persist cluster state during shutdown");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn seed_subjects(state: &AppState) -> Result<(), NoteError> {
    let count = state.notes.seed_subjects(&seed::default_subjects()).await?;
    if count > 0 {
        info!(count, "Seeded default subjects");
    }
    Ok(())
}

async fn seed_until_done(state: Arc<AppState>) {
    let mut delay = Duration::from_millis(500);
    loop {
        tokio::time::sleep(delay).await;
        match seed_subjects(&state).await {
            Ok(()) => return,
            Err(e) => {
                tracing::debug!(error = %e, "Seeding attempt failed");
                delay = (delay * 2).min(Duration::from_secs(30));
            }
        }
    }
}

/// Create the muster node; it shares the catalog's redb instance and
/// invalidates this node's listings on every applied write.
fn cluster_node(
    config: &Config,
    db: &Database,
    listings: Arc<ListingCache>,
) -> anyhow::Result<ClusterNode> {
    let cluster_port = config.cluster.cluster_port;
    let cluster_peers: Vec<String> = config
        .cluster
        .peers
        .iter()
        .map(|peer| {
            if let Some((host, _)) = peer.rsplit_once(':') {
                format!("{host}:{cluster_port}")
            } else {
                format!("{peer}:{cluster_port}")
            }
        })
        .collect();

    let muster_config = muster::Config {
        node_id: config.node.id.clone(),
        cluster_port,
        heartbeat_interval_ms: config.cluster.heartbeat_interval_ms,
        election_timeout_ms: config.cluster.election_timeout_ms,
        discovery: muster::DiscoveryConfig {
            dns_name: config.cluster.discovery.dns_name.clone(),
            peers: cluster_peers,
            poll_interval_secs: config.cluster.discovery.poll_interval_seconds,
        },
    };

    let muster_storage = muster::RedbStorage::new(db.inner())?;
    let state_machine = CatalogStateMachine::new(db.clone()).with_listing_cache(listings);
    let node = muster::MusterNode::new(muster_config, muster_storage, state_machine)?;
    Ok(node)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
