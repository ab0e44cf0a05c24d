use std::env;
use std::str::FromStr;
use std::time::Duration;

use gridedit_history::DEFAULT_UNDO_DEPTH;

/// Whether row/column additions are persisted remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuralSync {
    /// Structural edits live only in the session
    #[default]
    LocalOnly,
    /// Structural edits are also sent to the remote store in the background
    Remote,
}

impl FromStr for StructuralSync {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local-only" => Ok(StructuralSync::LocalOnly),
            "remote" => Ok(StructuralSync::Remote),
            other => anyhow::bail!("unknown structural sync mode: {other}"),
        }
    }
}

/// Edit session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the grid API
    pub api_url: String,
    /// Upper bound on every remote call
    pub sync_timeout: Duration,
    /// Maximum number of undo levels
    pub undo_depth: usize,
    pub structural_sync: StructuralSync,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            sync_timeout: Duration::from_secs(10),
            undo_depth: DEFAULT_UNDO_DEPTH,
            structural_sync: StructuralSync::LocalOnly,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let api_url = env::var("GRIDEDIT_API_URL").unwrap_or(defaults.api_url);
        let sync_timeout = match env::var("GRIDEDIT_SYNC_TIMEOUT_MS") {
            Ok(ms) => Duration::from_millis(ms.parse()?),
            Err(_) => defaults.sync_timeout,
        };
        let undo_depth = match env::var("GRIDEDIT_UNDO_DEPTH") {
            Ok(depth) => depth.parse()?,
            Err(_) => defaults.undo_depth,
        };
        let structural_sync = match env::var("GRIDEDIT_STRUCTURAL_SYNC") {
            Ok(mode) => mode.parse()?,
            Err(_) => defaults.structural_sync,
        };

        Ok(Self {
            api_url,
            sync_timeout,
            undo_depth,
            structural_sync,
        })
    }
}
