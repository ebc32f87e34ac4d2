//! Project Tracker
//!
//! A project/task tracking backend with:
//! - Status propagation walking Task → Sprint → Module → Project
//! - A role-based notification engine (~80 event types)
//! - Real-time delivery over WebSocket channels with durable queuing
//! - Periodic SLA sweeps for deadlines, inactivity, and budgets

pub mod api;
pub mod notify;
pub mod sla;
pub mod store;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use notify::{DeliverySubsystem, NotificationDispatcher, PresenceRegistry};
use serde::Deserialize;
use sla::{SlaConfig, SlaMonitor};
use std::path::Path;
use std::sync::Arc;
use workflow::{StatusAggregator, WorkflowManager};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub sla: SlaConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "tracker123".into(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_port: u16,
    pub sla: SlaConfig,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            sla: yaml.sla,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state & server startup
// ============================================================================

/// Shared application state wiring the engine together
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn store::EntityStore>,
    pub presence: Arc<PresenceRegistry>,
    pub delivery: Arc<DeliverySubsystem>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub aggregator: Arc<StatusAggregator>,
    pub manager: Arc<WorkflowManager>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state against a connected Neo4j backend
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn store::EntityStore> = Arc::new(
            store::Neo4jClient::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
                .await?,
        );
        Ok(Self::with_store(store, config))
    }

    /// Wire the engine on top of any EntityStore implementation
    pub fn with_store(store: Arc<dyn store::EntityStore>, config: Config) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        let delivery = Arc::new(DeliverySubsystem::new(store.clone(), presence.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), delivery.clone()));
        let aggregator = Arc::new(StatusAggregator::new(store.clone(), dispatcher.clone()));
        let manager = Arc::new(WorkflowManager::new(
            store.clone(),
            aggregator.clone(),
            dispatcher.clone(),
        ));

        Self {
            store,
            presence,
            delivery,
            dispatcher,
            aggregator,
            manager,
            config: Arc::new(config),
        }
    }
}

/// Start the HTTP/WebSocket server and the SLA timers; runs until shutdown
pub async fn start_server(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j");

    let mut monitor = SlaMonitor::new(
        state.store.clone(),
        state.dispatcher.clone(),
        state.config.sla.clone(),
    );
    monitor.start();

    let server_state = Arc::new(api::handlers::ServerState {
        store: state.store.clone(),
        manager: state.manager.clone(),
        dispatcher: state.dispatcher.clone(),
        delivery: state.delivery.clone(),
    });
    let router = api::create_router(server_state);

    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
server:
  port: 9090

neo4j:
  uri: bolt://db:7687
  user: admin
  password: secret

sla:
  deadline_warning_days: 5
  inactivity_hours: 24
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.neo4j.uri, "bolt://db:7687");
        assert_eq!(config.sla.deadline_warning_days, 5);
        assert_eq!(config.sla.inactivity_hours, 24);
        // Unspecified SLA fields keep their defaults
        assert_eq!(config.sla.budget_warning_pct, 80.0);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(config.neo4j.user, "neo4j");
        assert_eq!(config.sla.deadline_warning_days, 3);
        assert_eq!(config.sla.sweep_timeout_secs, 60);
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &["NEO4J_URI", "NEO4J_USER", "NEO4J_PASSWORD", "SERVER_PORT"] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
neo4j:
  uri: bolt://yaml-host:7687
  user: yaml-user
  password: yaml-pass
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.neo4j_uri, "bolt://yaml-host:7687");
        assert_eq!(config.neo4j_user, "yaml-user");

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("NEO4J_URI", "bolt://env-host:7687");
        std::env::set_var("SERVER_PORT", "7777");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.neo4j_uri, "bolt://env-host:7687");
        assert_eq!(config.server_port, 7777);
        // YAML value still used where no env override
        assert_eq!(config.neo4j_user, "yaml-user");

        clear_env();

        // --- Phase 3: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.neo4j_uri, "bolt://localhost:7687");
    }
}
