use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_CLICKHOUSE_URL: &str = "http://127.0.0.1:8123";
const DEFAULT_CLICKHOUSE_USER: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub url: Url,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigOverrides {
    #[serde(default)]
    clickhouse_url: Option<String>,
    #[serde(default)]
    clickhouse_user: Option<String>,
    #[serde(default)]
    clickhouse_password: Option<String>,
    #[serde(default)]
    clickhouse_database: Option<String>,
    #[serde(default)]
    clickhouse_timeout_secs: Option<u64>,
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_override("XATU_QUERIES_CONFIG_PATH").map(PathBuf::from))
}

fn load_overrides(path: &Path) -> Result<ConfigOverrides> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

impl ClickHouseConfig {
    /// Defaults, then the JSON config file (if any), then `XATU_CLICKHOUSE_*` environment.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let file = match config_path(explicit_path) {
            Some(path) => load_overrides(&path)?,
            None => ConfigOverrides::default(),
        };
        let env = ConfigOverrides {
            clickhouse_url: env_override("XATU_CLICKHOUSE_URL"),
            clickhouse_user: env_override("XATU_CLICKHOUSE_USER"),
            clickhouse_password: env_override("XATU_CLICKHOUSE_PASSWORD"),
            clickhouse_database: env_override("XATU_CLICKHOUSE_DATABASE"),
            clickhouse_timeout_secs: env_override("XATU_CLICKHOUSE_TIMEOUT_SECS")
                .map(|raw| {
                    raw.parse::<u64>()
                        .with_context(|| format!("invalid XATU_CLICKHOUSE_TIMEOUT_SECS: {raw}"))
                })
                .transpose()?,
        };

        let mut config = Self::defaults()?;
        config.apply(&file)?;
        config.apply(&env)?;
        Ok(config)
    }

    fn defaults() -> Result<Self> {
        Ok(Self {
            url: Url::parse(DEFAULT_CLICKHOUSE_URL)?,
            user: DEFAULT_CLICKHOUSE_USER.to_string(),
            password: None,
            database: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    fn apply(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(raw) = non_empty(overrides.clickhouse_url.as_deref()) {
            self.url =
                Url::parse(&raw).with_context(|| format!("invalid clickhouse url: {raw}"))?;
        }
        if let Some(user) = non_empty(overrides.clickhouse_user.as_deref()) {
            self.user = user;
        }
        if let Some(password) = overrides.clickhouse_password.as_deref() {
            self.password = non_empty(Some(password));
        }
        if let Some(database) = non_empty(overrides.clickhouse_database.as_deref()) {
            self.database = Some(database);
        }
        if let Some(secs) = overrides.clickhouse_timeout_secs.filter(|v| *v != 0) {
            self.timeout = Duration::from_secs(secs);
        }
        Ok(())
    }
}
