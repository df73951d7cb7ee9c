use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub node: NodeConfig,
    pub notes: NotesConfig,
    pub storage: StorageConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// TCP port for inter-node cluster communication
    pub cluster_port: u16,
    pub discovery: DiscoveryConfig,
    pub election_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub peers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// DNS name to resolve for peer discovery (e.g., a Kubernetes headless service).
    pub dns_name: Option<String>,
    /// How often to poll for peer changes (seconds)
    pub poll_interval_seconds: u64,
}

/// Policy applied to notes as they are created and listed.
#[derive(Debug, Clone)]
pub struct NotesConfig {
    /// Whether new notes are publicly visible without moderation.
    pub auto_approve: bool,
    /// Uploader name recorded when the form leaves it blank.
    pub anonymous_uploader: String,
    /// How long a cached listing may be served before it is refetched.
    pub listing_cache_ttl: Duration,
    /// Insert the default subject list on startup when the catalog is empty.
    pub seed_subjects: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    /// Local redb database, replicated via muster when clustered.
    Embedded,
    /// PostgREST-compatible remote service.
    Rest,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    /// Directory for attached note files
    pub local_storage_path: String,
    /// Base URL of the REST backend (required when backend is rest)
    pub rest_url: Option<String>,
    /// API key sent as `apikey` and bearer token to the REST backend
    pub rest_api_key: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dns_name: None,
            poll_interval_seconds: 5,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_port: 9993,
            discovery: DiscoveryConfig::default(),
            election_timeout_ms: 3000,
            heartbeat_interval_ms: 300,
            peers: Vec::new(),
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            anonymous_uploader: "Anonymous".to_string(),
            listing_cache_ttl: Duration::from_secs(30),
            seed_subjects: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Embedded,
            local_storage_path: "./files".to_string(),
            rest_url: None,
            rest_api_key: None,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_id = std::env::var("NODE_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let peers: Vec<String> = std::env::var("PEERS")
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .filter(|s| !s.starts_with(&format!("{node_id}:")) && s != &node_id)
                    .collect()
            })
            .unwrap_or_default();

        let dns_name = std::env::var("DISCOVERY_DNS_NAME").ok();
        let poll_interval = std::env::var("DISCOVERY_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let cluster_port = std::env::var("CLUSTER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9993);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10MB

        let backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "embedded".to_string())
            .to_lowercase()
            .as_str()
        {
            "rest" => StoreBackend::Rest,
            _ => StoreBackend::Embedded,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let defaults = NotesConfig::default();
        let listing_cache_ttl = std::env::var("LISTING_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.listing_cache_ttl);

        let config = Config {
            node: NodeConfig {
                id: node_id,
                bind_address,
                data_dir,
            },
            cluster: ClusterConfig {
                cluster_port,
                peers,
                discovery: DiscoveryConfig {
                    dns_name,
                    poll_interval_seconds: poll_interval,
                },
                ..Default::default()
            },
            notes: NotesConfig {
                auto_approve: env_flag("NOTES_AUTO_APPROVE", defaults.auto_approve),
                anonymous_uploader: std::env::var("ANONYMOUS_UPLOADER")
                    .unwrap_or(defaults.anonymous_uploader),
                listing_cache_ttl,
                seed_subjects: env_flag("SEED_SUBJECTS", defaults.seed_subjects),
            },
            storage: StorageConfig {
                backend,
                local_storage_path,
                rest_url: std::env::var("REST_URL").ok(),
                rest_api_key: std::env::var("REST_API_KEY").ok(),
            },
            test_mode: env_flag("TEST_MODE", false),
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.id.is_empty() {
            return Err(ConfigError::ValidationError(
                "NODE_ID cannot be empty".to_string(),
            ));
        }

        if self.storage.backend == StoreBackend::Rest && self.storage.rest_url.is_none() {
            return Err(ConfigError::ValidationError(
                "REST_URL is required when STORE_BACKEND=rest".to_string(),
            ));
        }

        if self.notes.anonymous_uploader.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ANONYMOUS_UPLOADER cannot be blank".to_string(),
            ));
        }

        let cluster_size = self.cluster.peers.len() + 1;
        if cluster_size > 1 && cluster_size.is_multiple_of(2) {
            tracing::warn!(
                "Cluster size {} is even. This may lead to split-brain scenarios. \
                 Consider using an odd number of nodes.",
                cluster_size
            );
        }

        Ok(())
    }

    /// Check if running in single-node mode.
    pub fn is_single_node(&self) -> bool {
        self.cluster.peers.is_empty() && self.cluster.discovery.dns_name.is_none()
    }
}
