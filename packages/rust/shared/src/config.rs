//! Application configuration for BudgetLens.
//!
//! User config lives at `~/.budgetlens/budgetlens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BudgetLensError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "budgetlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".budgetlens";

// ---------------------------------------------------------------------------
// Config structs (matching budgetlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Remote classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Session store settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// OCR settings for image sources.
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Additions to the built-in noise filters.
    #[serde(default)]
    pub filters: FiltersConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Upper bound on concurrently running units of work.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Minimum relevance score kept by the parent-assignment workflow.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u8,

    /// How many preceding items are offered as parent candidates.
    #[serde(default = "default_parent_window")]
    pub parent_window: usize,

    /// Directory holding the session database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            score_threshold: default_score_threshold(),
            parent_window: default_parent_window(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_max_workers() -> usize {
    10
}
fn default_score_threshold() -> u8 {
    7
}
fn default_parent_window() -> usize {
    10
}
fn default_data_dir() -> String {
    "~/.budgetlens".into()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model id sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on the length of a classifier answer, in tokens.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Answer bound for parent selection, which echoes a full item name.
    #[serde(default = "default_parent_max_output_tokens")]
    pub parent_max_output_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            parent_max_output_tokens: default_parent_max_output_tokens(),
        }
    }
}

impl ClassifierConfig {
    /// Parsed base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            BudgetLensError::config(format!("invalid classifier base_url '{}': {e}", self.base_url))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_output_tokens() -> u32 {
    15
}
fn default_parent_max_output_tokens() -> u32 {
    100
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session expires.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Database file name, relative to `defaults.data_dir`.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            db_file: default_db_file(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    3600
}
fn default_db_file() -> String {
    "sessions.db".into()
}

/// `[ocr]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract executable (name on `PATH` or absolute path).
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,

    /// Tesseract language pack.
    #[serde(default = "default_language")]
    pub language: String,

    /// Tesseract page segmentation mode.
    #[serde(default = "default_page_seg_mode")]
    pub page_seg_mode: u8,

    /// Grayscale cut-off used to binarize images before recognition.
    #[serde(default = "default_binarize_threshold")]
    pub binarize_threshold: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: default_tesseract_cmd(),
            language: default_language(),
            page_seg_mode: default_page_seg_mode(),
            binarize_threshold: default_binarize_threshold(),
        }
    }
}

fn default_tesseract_cmd() -> String {
    "tesseract".into()
}
fn default_language() -> String {
    "vie".into()
}
fn default_page_seg_mode() -> u8 {
    12
}
fn default_binarize_threshold() -> u8 {
    150
}

/// `[filters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Extra lowercase prefixes that disqualify a cell.
    #[serde(default)]
    pub extra_noise_keywords: Vec<String>,

    /// Extra structural headings dropped on exact (case-insensitive) match.
    #[serde(default)]
    pub extra_heading_phrases: Vec<String>,

    /// Header names that identify the task column of a table.
    #[serde(default = "default_task_columns")]
    pub task_columns: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            extra_noise_keywords: Vec::new(),
            extra_heading_phrases: Vec::new(),
            task_columns: default_task_columns(),
        }
    }
}

fn default_task_columns() -> Vec<String> {
    ["nhiệm vụ", "nhiệm vụ chi thường xuyên", "chỉ tiêu", "nội dung"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.budgetlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BudgetLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.budgetlens/budgetlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BudgetLensError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BudgetLensError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BudgetLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BudgetLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BudgetLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the session database path, expanding a leading `~/` in `data_dir`.
pub fn session_db_path(config: &AppConfig) -> Result<PathBuf> {
    let data_dir = &config.defaults.data_dir;
    let base = match data_dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .ok_or_else(|| BudgetLensError::config("could not determine home directory"))?
            .join(rest),
        None => PathBuf::from(data_dir),
    };
    Ok(base.join(&config.session.db_file))
}

/// Check that the classifier API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.classifier.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(BudgetLensError::config(format!(
            "classifier API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_workers"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("tesseract"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_workers, 10);
        assert_eq!(parsed.defaults.score_threshold, 7);
        assert_eq!(parsed.session.ttl_secs, 3600);
        assert_eq!(parsed.classifier.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
max_workers = 4

[filters]
extra_noise_keywords = ["phường"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.max_workers, 4);
        assert_eq!(config.defaults.parent_window, 10);
        assert_eq!(config.filters.extra_noise_keywords, vec!["phường".to_string()]);
        assert_eq!(config.filters.task_columns.len(), 4);
        assert_eq!(config.ocr.page_seg_mode, 12);
    }

    #[test]
    fn session_db_path_joins_data_dir() {
        let mut config = AppConfig::default();
        config.defaults.data_dir = "/var/lib/budgetlens".into();
        let path = session_db_path(&config).expect("path");
        assert_eq!(path, PathBuf::from("/var/lib/budgetlens/sessions.db"));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let mut config = ClassifierConfig::default();
        config.base_url = "not a url".into();
        let err = config.base_url().unwrap_err();
        assert!(err.to_string().contains("invalid classifier base_url"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.classifier.api_key_env = "BL_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
