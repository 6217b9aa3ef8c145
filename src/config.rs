use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Full API base URL. Derived from `region` when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default = "default_true")]
    pub compartment_id_in_subtree: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the env var holding a bearer token, if any.
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            namespace: String::new(),
            compartment_id: String::new(),
            compartment_id_in_subtree: true,
            timeout_secs: default_timeout_secs(),
            auth_token_env: None,
        }
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://loganalytics.{}.oci.oraclecloud.com",
                self.region
            ),
        }
    }
}

fn default_region() -> String {
    "us-ashburn-1".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_time_period")]
    pub default_time_period_minutes: u32,
    #[serde(default = "default_min_time_period")]
    pub min_time_period_minutes: u32,
    #[serde(default = "default_max_time_period")]
    pub max_time_period_minutes: u32,
    #[serde(default = "default_max_rows")]
    pub default_max_rows: u32,
    #[serde(default = "default_console_max_rows")]
    pub console_max_rows: u32,
    #[serde(default = "default_max_rows_limit")]
    pub max_rows_limit: u32,
    #[serde(default)]
    pub available_sources: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_time_period_minutes: default_time_period(),
            min_time_period_minutes: default_min_time_period(),
            max_time_period_minutes: default_max_time_period(),
            default_max_rows: default_max_rows(),
            console_max_rows: default_console_max_rows(),
            max_rows_limit: default_max_rows_limit(),
            available_sources: Vec::new(),
        }
    }
}

impl QueryConfig {
    /// Reject minute counts outside the configured window.
    pub fn check_minutes(&self, minutes: u32) -> Result<u32> {
        if minutes < self.min_time_period_minutes || minutes > self.max_time_period_minutes {
            anyhow::bail!(
                "time_period_minutes must be between {} and {} (got {})",
                self.min_time_period_minutes,
                self.max_time_period_minutes,
                minutes
            );
        }
        Ok(minutes)
    }

    pub fn clamp_rows(&self, rows: u32) -> u32 {
        rows.clamp(1, self.max_rows_limit)
    }
}

fn default_time_period() -> u32 {
    1440
}
fn default_min_time_period() -> u32 {
    1
}
fn default_max_time_period() -> u32 {
    43_200
}
fn default_max_rows() -> u32 {
    50
}
fn default_console_max_rows() -> u32 {
    2000
}
fn default_max_rows_limit() -> u32 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Defaults only. Enough for commands that never reach the backend.
    pub fn minimal() -> Self {
        Self {
            backend: BackendConfig::default(),
            query: QueryConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Overlay `LOGAN_REGION`, `LOGAN_NAMESPACE` and `LOGAN_COMPARTMENT_ID`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(region) = non_empty("LOGAN_REGION") {
            self.backend.region = region;
        }
        if let Some(namespace) = non_empty("LOGAN_NAMESPACE") {
            self.backend.namespace = namespace;
        }
        if let Some(compartment) = non_empty("LOGAN_COMPARTMENT_ID") {
            self.backend.compartment_id = compartment;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.compartment_id.trim().is_empty() {
            anyhow::bail!(
                "backend.compartment_id must be set (or provide LOGAN_COMPARTMENT_ID)"
            );
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be > 0");
        }

        let q = &self.query;
        if q.min_time_period_minutes < 1 {
            anyhow::bail!("query.min_time_period_minutes must be >= 1");
        }
        if !(q.min_time_period_minutes..=q.max_time_period_minutes)
            .contains(&q.default_time_period_minutes)
        {
            anyhow::bail!(
                "query.default_time_period_minutes must be in [{}, {}]",
                q.min_time_period_minutes,
                q.max_time_period_minutes
            );
        }
        if q.default_max_rows < 1 || q.default_max_rows > q.max_rows_limit {
            anyhow::bail!(
                "query.default_max_rows must be in [1, {}]",
                q.max_rows_limit
            );
        }
        if q.console_max_rows < 1 || q.console_max_rows > q.max_rows_limit {
            anyhow::bail!(
                "query.console_max_rows must be in [1, {}]",
                q.max_rows_limit
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.apply_env_overrides();
    config.validate()?;

    Ok(config)
}
