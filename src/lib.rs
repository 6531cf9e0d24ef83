//! Mokuhyo goal-tree server
//!
//! A backend for goal decomposition:
//! - Goal trees of nodes and typed edges, soft-deleted by subtree
//! - Follow-up questions for new children, drafted by an LLM oracle and
//!   validated, with one repair round-trip and a deterministic fallback
//! - HTTP API (axum) over a pluggable `TreeStore`

pub mod api;
pub mod oracle;
pub mod question;
pub mod tree;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use oracle::{GeminiOracle, QuestionOracle};
use question::{FallbackChooser, OrchestratorConfig, QuestionMode, QuestionOrchestrator};
use tree::{MemoryTreeStore, NodeManager, TreeStore};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub oracle: OracleYamlConfig,
    pub question: QuestionYamlConfig,
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

/// Oracle (Gemini) configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleYamlConfig {
    /// Absent means no oracle: every question comes from the fallback chooser
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for OracleYamlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: oracle::gemini::DEFAULT_MODEL.into(),
            base_url: oracle::gemini::DEFAULT_BASE_URL.into(),
            temperature: oracle::gemini::DEFAULT_TEMPERATURE,
            max_output_tokens: oracle::gemini::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Question subsystem configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuestionYamlConfig {
    pub timeout_ms: u64,
    pub mode: QuestionMode,
    /// Overrides of the fallback candidate tables
    pub purpose_candidates: Option<Vec<String>>,
    pub general_candidates: Option<Vec<String>>,
}

impl Default for QuestionYamlConfig {
    fn default() -> Self {
        Self {
            timeout_ms: question::orchestrator::DEFAULT_TIMEOUT.as_millis() as u64,
            mode: QuestionMode::default(),
            purpose_candidates: None,
            general_candidates: None,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub oracle_temperature: f32,
    pub oracle_max_output_tokens: u32,
    pub question_timeout_ms: u64,
    pub question_mode: QuestionMode,
    pub purpose_candidates: Option<Vec<String>>,
    pub general_candidates: Option<Vec<String>>,
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
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing file means
    /// env vars and defaults only.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Build Config with env var overrides
        let question_mode = match non_empty_env("QUESTION_MODE") {
            Some(raw) => raw
                .parse::<QuestionMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid QUESTION_MODE")?,
            None => yaml.question.mode,
        };

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            gemini_api_key: non_empty_env("GEMINI_API_KEY")
                .or(yaml.oracle.api_key)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            gemini_model: non_empty_env("GEMINI_MODEL").unwrap_or(yaml.oracle.model),
            gemini_base_url: non_empty_env("GEMINI_BASE_URL").unwrap_or(yaml.oracle.base_url),
            oracle_temperature: yaml.oracle.temperature,
            oracle_max_output_tokens: yaml.oracle.max_output_tokens,
            question_timeout_ms: std::env::var("QUESTION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.question.timeout_ms),
            question_mode,
            purpose_candidates: yaml.question.purpose_candidates,
            general_candidates: yaml.question.general_candidates,
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

    /// The configured oracle, if an API key is present
    pub fn oracle(&self) -> Option<GeminiOracle> {
        let api_key = self.gemini_api_key.clone()?;
        Some(
            GeminiOracle::new(api_key, self.gemini_model.clone(), self.gemini_base_url.clone())
                .with_generation(self.oracle_temperature, self.oracle_max_output_tokens),
        )
    }

    /// Fallback chooser, with candidate table overrides applied
    pub fn fallback_chooser(&self) -> FallbackChooser {
        let defaults = FallbackChooser::default();
        let table = |custom: &Option<Vec<String>>, focus| match custom {
            Some(list) => list.clone(),
            None => defaults.bucket(focus).to_vec(),
        };
        FallbackChooser::new(
            table(&self.purpose_candidates, question::fallback::FallbackFocus::Purpose),
            table(&self.general_candidates, question::fallback::FallbackFocus::General),
        )
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            mode: self.question_mode,
            timeout: Duration::from_millis(self.question_timeout_ms),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<QuestionOrchestrator>,
    pub manager: Arc<NodeManager>,
    /// Model of the configured oracle; None means fallback-only
    pub oracle_model: Option<String>,
    pub question_mode: QuestionMode,
}

impl AppState {
    /// Wire the services over the in-memory store
    pub fn new(config: Config) -> Self {
        let oracle = config
            .oracle()
            .map(|o| Arc::new(o) as Arc<dyn QuestionOracle>);
        Self::with_services(config, Arc::new(MemoryTreeStore::new()), oracle)
    }

    /// Wire the services over an explicit store and oracle
    pub fn with_services(
        config: Config,
        store: Arc<dyn TreeStore>,
        oracle: Option<Arc<dyn QuestionOracle>>,
    ) -> Self {
        let oracle_model = oracle.as_ref().map(|o| o.model_name().to_string());
        let questions = Arc::new(QuestionOrchestrator::new(
            store.clone(),
            oracle,
            config.fallback_chooser(),
            config.orchestrator_config(),
        ));
        let manager = Arc::new(NodeManager::new(store, questions.clone()));
        Self {
            questions,
            manager,
            oracle_model,
            question_mode: config.question_mode,
        }
    }

    /// State handed to the HTTP handlers
    pub fn server_state(&self) -> api::handlers::AppState {
        Arc::new(api::handlers::ServerState {
            manager: self.manager.clone(),
            oracle_model: self.oracle_model.clone(),
            question_mode: self.question_mode,
        })
    }
}

/// Start the HTTP server and run until Ctrl-C
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config);

    match &state.oracle_model {
        Some(model) => {
            tracing::info!(%model, mode = ?state.question_mode, "question oracle enabled")
        }
        None => tracing::info!("no GEMINI_API_KEY, questions use the deterministic fallback"),
    }

    let app = api::create_router(state.server_state());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
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

oracle:
  api_key: yaml-key
  model: gemini-2.0-flash
  temperature: 0.2

question:
  timeout_ms: 3000
  mode: select
  purpose_candidates:
    - 目的は？
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.oracle.api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.oracle.model, "gemini-2.0-flash");
        assert_eq!(config.oracle.max_output_tokens, 64);
        assert_eq!(config.question.timeout_ms, 3000);
        assert_eq!(config.question.mode, QuestionMode::Select);
        assert_eq!(config.question.purpose_candidates, Some(vec!["目的は？".to_string()]));
        assert!(config.question.general_candidates.is_none());
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.oracle.api_key.is_none());
        assert_eq!(config.oracle.model, "gemini-1.5-flash");
        assert_eq!(config.oracle.max_output_tokens, 64);
        assert_eq!(config.question.timeout_ms, 8000);
        assert_eq!(config.question.mode, QuestionMode::Generate);
    }

    #[test]
    fn test_fallback_chooser_overrides() {
        let config = Config {
            server_port: 8080,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".into(),
            gemini_base_url: "http://localhost".into(),
            oracle_temperature: 0.4,
            oracle_max_output_tokens: 64,
            question_timeout_ms: 8000,
            question_mode: QuestionMode::Generate,
            purpose_candidates: None,
            general_candidates: Some(vec!["次の一歩は".into(), "  ".into()]),
        };
        let chooser = config.fallback_chooser();
        // Overrides go through question normalization
        assert_eq!(chooser.choose("健康になる", &[]), "次の一歩は？");
        // Purpose table keeps its defaults
        assert_eq!(
            chooser.bucket(question::fallback::FallbackFocus::Purpose),
            FallbackChooser::default().bucket(question::fallback::FallbackFocus::Purpose)
        );
    }

    #[test]
    fn test_app_state_reports_oracle() {
        let config = Config {
            server_port: 8080,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".into(),
            gemini_base_url: "http://localhost".into(),
            oracle_temperature: 0.4,
            oracle_max_output_tokens: 64,
            question_timeout_ms: 8000,
            question_mode: QuestionMode::Select,
            purpose_candidates: None,
            general_candidates: None,
        };

        let state = AppState::new(config.clone());
        assert!(state.oracle_model.is_none());

        let oracle: Arc<dyn QuestionOracle> = Arc::new(oracle::ScriptedOracle::new());
        let state = AppState::with_services(config, Arc::new(MemoryTreeStore::new()), Some(oracle));
        let server = state.server_state();
        assert_eq!(server.oracle_model.as_deref(), Some("scripted"));
        assert_eq!(server.question_mode, QuestionMode::Select);
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "SERVER_PORT",
                "GEMINI_API_KEY",
                "GEMINI_MODEL",
                "GEMINI_BASE_URL",
                "QUESTION_TIMEOUT_MS",
                "QUESTION_MODE",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
oracle:
  api_key: yaml-key
  base_url: http://yaml-gemini:8000
question:
  timeout_ms: 1500
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.gemini_api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.gemini_base_url, "http://yaml-gemini:8000");
        assert_eq!(config.orchestrator_config().timeout, Duration::from_millis(1500));
        assert!(config.oracle().is_some());

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("SERVER_PORT", "7777");
        std::env::set_var("GEMINI_MODEL", "gemini-env");
        std::env::set_var("QUESTION_MODE", "select");
        std::env::set_var("QUESTION_TIMEOUT_MS", "250");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 7777);
        assert_eq!(config.gemini_model, "gemini-env");
        assert_eq!(config.question_mode, QuestionMode::Select);
        assert_eq!(config.question_timeout_ms, 250);
        // YAML value still used where no env override
        assert_eq!(config.gemini_api_key.as_deref(), Some("yaml-key"));

        // --- Phase 3: invalid mode is an error ---
        std::env::set_var("QUESTION_MODE", "guess");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());

        clear_env();

        // --- Phase 4: No YAML file → defaults, no oracle ---
        let nonexistent = Path::new("/tmp/nonexistent-mokuhyo-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 8080);
        assert!(config.gemini_api_key.is_none());
        assert!(config.oracle().is_none());
        assert_eq!(config.question_mode, QuestionMode::Generate);
    }
}
