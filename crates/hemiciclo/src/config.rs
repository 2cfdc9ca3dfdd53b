use std::path::PathBuf;
use std::time::Duration;

use crate::types::Legislature;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
}

/// Bounded waits against the live page.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// How many times to re-read the results summary after a next-page click.
    pub range_polls: u32,
    pub range_poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(250),
            range_polls: 20,
            range_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Per-row retry, applied when a row read or detail fetch fails.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
}

impl BrowserOptions {
    /// Honors `CHROME_EXECUTABLE` when set.
    pub fn from_env(headless: bool) -> Self {
        dotenvy::dotenv().ok();
        Self {
            headless,
            executable: std::env::var_os("CHROME_EXECUTABLE").map(PathBuf::from),
        }
    }
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub legislature: Legislature,
    pub waits: WaitConfig,
    pub retry: RetryPolicy,
    /// Hard stop for a single listing; `None` relies on range checks alone.
    pub max_pages: Option<u32>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            legislature: Legislature::default(),
            waits: WaitConfig::default(),
            retry: RetryPolicy::default(),
            max_pages: None,
        }
    }
}

/// Neo4j connection parameters.
#[derive(Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

impl GraphConfig {
    /// Reads `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD` and `NEO4J_DATABASE`
    /// (default `neo4j`), loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        Ok(Self {
            uri: required("NEO4J_URI")?,
            user: required("NEO4J_USER")?,
            password: required("NEO4J_PASSWORD")?,
            database: lookup("NEO4J_DATABASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "neo4j".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_graph_config_defaults_database() {
        let vars = env(&[
            ("NEO4J_URI", "bolt://localhost:7687"),
            ("NEO4J_USER", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
        ]);
        let config = GraphConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.database, "neo4j");
        assert_eq!(config.uri, "bolt://localhost:7687");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_graph_config_requires_password() {
        let vars = env(&[("NEO4J_URI", "bolt://x"), ("NEO4J_USER", "neo4j")]);
        let err = GraphConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("NEO4J_PASSWORD")));
    }

    #[test]
    fn test_default_retry_policy_allows_three_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }
}
