//! Configuration loading.
//!
//! Settings come from a TOML file (default `./config/harvest.toml`), then
//! environment variables override individual fields. A missing file is not an
//! error: defaults apply and the environment fills in the secrets.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SLACK_BOT_TOKEN` | `slack.bot_token` |
//! | `SLACK_CHANNEL` | `slack.channel` |
//! | `OPENAI_API_KEY` / `OPEN_AI_KEY` | `llm.api_key` |
//! | `OPENAI_MODEL` / `OPEN_AI_MODEL` | `llm.model` |
//! | `PDF_PATH` | `storage.root` |
//! | `PDF_WORKERS` | `extract.workers` |
//! | `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` | `db.*` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    #[serde(default = "default_slack_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel: String::new(),
            api_base: default_slack_api_base(),
            timeout_secs: default_slack_timeout_secs(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_slack_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between consecutive documents, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout_secs(),
            max_attempts: default_max_attempts(),
            pause_ms: default_pause_ms(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl LlmConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_pause_ms() -> u64 {
    1000
}
fn default_max_input_chars() -> usize {
    100_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./pdfs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub database: String,
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    #[serde(default = "default_ready_delay_secs")]
    pub ready_delay_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: default_db_password(),
            database: default_db_name(),
            ready_attempts: default_ready_attempts(),
            ready_delay_secs: default_ready_delay_secs(),
        }
    }
}

impl DbConfig {
    pub fn ready_delay(&self) -> Duration {
        Duration::from_secs(self.ready_delay_secs)
    }
}

fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_user() -> String {
    "postgres".to_string()
}
fn default_db_password() -> String {
    "postgres".to_string()
}
fn default_db_name() -> String {
    "postgres".to_string()
}
fn default_ready_attempts() -> u32 {
    10
}
fn default_ready_delay_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Load, override from the process environment, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = read_config_file(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Parse the TOML file, or return defaults if it does not exist.
pub fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Override config fields from environment-style lookups.
///
/// `lookup` returns `None` for unset variables; empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| lookup(k))
            .find(|v| !v.trim().is_empty())
    };

    if let Some(v) = get(&["SLACK_BOT_TOKEN"]) {
        config.slack.bot_token = v;
    }
    if let Some(v) = get(&["SLACK_CHANNEL"]) {
        config.slack.channel = v;
    }
    if let Some(v) = get(&["OPENAI_API_KEY", "OPEN_AI_KEY"]) {
        config.llm.api_key = v;
    }
    if let Some(v) = get(&["OPENAI_MODEL", "OPEN_AI_MODEL"]) {
        config.llm.model = v;
    }
    if let Some(v) = get(&["PDF_PATH"]) {
        config.storage.root = PathBuf::from(v);
    }
    if let Some(v) = get(&["PDF_WORKERS"]) {
        config.extract.workers = v
            .trim()
            .parse()
            .with_context(|| format!("PDF_WORKERS must be a positive integer, got '{}'", v))?;
    }
    if let Some(v) = get(&["DB_HOST"]) {
        config.db.host = v;
    }
    if let Some(v) = get(&["DB_PORT"]) {
        config.db.port = v
            .trim()
            .parse()
            .with_context(|| format!("DB_PORT must be a port number, got '{}'", v))?;
    }
    if let Some(v) = get(&["DB_USER"]) {
        config.db.user = v;
    }
    if let Some(v) = get(&["DB_PASSWORD"]) {
        config.db.password = v;
    }
    if let Some(v) = get(&["DB_NAME"]) {
        config.db.database = v;
    }

    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    if config.slack.bot_token.trim().is_empty() {
        bail!("slack.bot_token is required (or set SLACK_BOT_TOKEN)");
    }
    if config.slack.channel.trim().is_empty() {
        bail!("slack.channel is required (or set SLACK_CHANNEL)");
    }
    if config.llm.api_key.trim().is_empty() {
        bail!("llm.api_key is required (or set OPENAI_API_KEY)");
    }

    if config.extract.workers == 0 {
        bail!("extract.workers must be >= 1");
    }
    if config.llm.max_attempts == 0 {
        bail!("llm.max_attempts must be >= 1");
    }
    if config.db.ready_attempts == 0 {
        bail!("db.ready_attempts must be >= 1");
    }

    match config.logging.format.as_str() {
        "pretty" | "json" => {}
        other => bail!(
            "Unknown logging.format: '{}'. Must be pretty or json.",
            other
        ),
    }

    Ok(())
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

    fn complete() -> Config {
        let mut cfg = Config::default();
        cfg.slack.bot_token = "xoxb-test".into();
        cfg.slack.channel = "research".into();
        cfg.llm.api_key = "sk-test".into();
        cfg
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.extract.workers, 3);
        assert_eq!(cfg.llm.max_attempts, 3);
        assert_eq!(cfg.llm.pause(), Duration::from_secs(1));
        assert_eq!(cfg.llm.model, "gpt-4.1-mini");
        assert_eq!(cfg.db.port, 5432);
        assert_eq!(cfg.db.ready_attempts, 10);
        assert_eq!(cfg.storage.root, PathBuf::from("./pdfs"));
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [slack]
            channel = "research"

            [extract]
            workers = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.slack.channel, "research");
        assert_eq!(cfg.slack.api_base, "https://slack.com/api");
        assert_eq!(cfg.extract.workers, 5);
        assert_eq!(cfg.db.user, "postgres");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::default();
        cfg.slack.channel = "general".into();
        let vars = env(&[
            ("SLACK_CHANNEL", "research"),
            ("OPEN_AI_KEY", "sk-legacy"),
            ("PDF_WORKERS", "4"),
            ("DB_PORT", "6543"),
        ]);
        apply_env_overrides(&mut cfg, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.slack.channel, "research");
        assert_eq!(cfg.llm.api_key, "sk-legacy");
        assert_eq!(cfg.extract.workers, 4);
        assert_eq!(cfg.db.port, 6543);
    }

    #[test]
    fn primary_key_name_wins_over_legacy() {
        let mut cfg = Config::default();
        let vars = env(&[("OPENAI_API_KEY", "sk-new"), ("OPEN_AI_KEY", "sk-old")]);
        apply_env_overrides(&mut cfg, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.llm.api_key, "sk-new");
    }

    #[test]
    fn bad_worker_count_is_rejected() {
        let mut cfg = Config::default();
        let vars = env(&[("PDF_WORKERS", "many")]);
        assert!(apply_env_overrides(&mut cfg, |k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let mut cfg = complete();
        assert!(validate(&cfg).is_ok());

        cfg.slack.bot_token.clear();
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("bot_token"));

        let mut cfg = complete();
        cfg.slack.channel = "  ".into();
        assert!(validate(&cfg).unwrap_err().to_string().contains("channel"));

        let mut cfg = complete();
        cfg.llm.api_key.clear();
        assert!(validate(&cfg).unwrap_err().to_string().contains("api_key"));
    }

    #[test]
    fn zero_workers_rejected() {
        let mut cfg = complete();
        cfg.extract.workers = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let mut cfg = complete();
        cfg.logging.format = "xml".into();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn example_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../config/harvest.example.toml")).unwrap();
        assert_eq!(cfg.slack.channel, "research");
        assert_eq!(cfg.llm.model, "gpt-4.1-mini");
        assert_eq!(cfg.db.ready_delay(), Duration::from_secs(2));
        assert_eq!(cfg.logging.format, "pretty");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = read_config_file(Path::new("/nonexistent/harvest.toml")).unwrap();
        assert_eq!(cfg.extract.workers, 3);
    }
}
