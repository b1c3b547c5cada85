//! Configuration for signal-ingress paths and delivery settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SIGNAL_INGRESS_HOME, SIGNAL_INGRESS_STORE)
//! 2. Config file (.signal-ingress/config.yaml)
//! 3. Defaults (~/.signal-ingress)
//!
//! Config file discovery:
//! - Searches current directory and parents for .signal-ingress/config.yaml
//! - Paths in the config file are relative to the config file's directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub report: Option<ReportConfig>,
    #[serde(default)]
    pub transcription: Option<TranscriptionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Pipeline home directory (relative to config file)
    pub home: Option<String>,
    /// Row store directory (relative to config file)
    pub store: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    /// CRM portal id used in entity profile links
    pub portal_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name
    pub model: Option<String>,
    /// Chat model for the transcript cleanup pass
    pub format_model: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the pipeline home
    pub home: PathBuf,
    /// Absolute path to the row store directory
    pub store: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Report delivery settings
    pub report: ReportSettings,
    /// Transcription settings
    pub transcription: TranscriptionSettings,
}

#[derive(Debug, Clone, Default)]
pub struct ReportSettings {
    pub sender: String,
    pub recipient: String,
    pub portal_id: String,
}

#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub model: String,
    pub format_model: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            format_model: "gpt-4o".to_string(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".signal-ingress").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".signal-ingress");

    let config_file = find_config_file();

    let (home, store, report, transcription) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;
        let base_dir = config_path.parent().unwrap_or(Path::new("."));

        let home = if let Ok(env_home) = std::env::var("SIGNAL_INGRESS_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(base_dir, home_path)
        } else {
            default_home.clone()
        };

        let store = if let Ok(env_store) = std::env::var("SIGNAL_INGRESS_STORE") {
            PathBuf::from(env_store)
        } else if let Some(ref store_path) = config.paths.store {
            resolve_path(base_dir, store_path)
        } else {
            home.join("store")
        };

        let report_cfg = config.report.unwrap_or_default();
        let report = ReportSettings {
            sender: report_cfg.sender.unwrap_or_default(),
            recipient: report_cfg.recipient.unwrap_or_default(),
            portal_id: report_cfg.portal_id.unwrap_or_default(),
        };

        let trans_cfg = config.transcription.unwrap_or_default();
        let defaults = TranscriptionSettings::default();
        let transcription = TranscriptionSettings {
            model: trans_cfg.model.unwrap_or(defaults.model),
            format_model: trans_cfg.format_model.unwrap_or(defaults.format_model),
        };

        (home, store, report, transcription)
    } else {
        let home = std::env::var("SIGNAL_INGRESS_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let store = std::env::var("SIGNAL_INGRESS_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("store"));

        (
            home,
            store,
            ReportSettings::default(),
            TranscriptionSettings::default(),
        )
    };

    Ok(ResolvedConfig {
        home,
        store,
        config_file,
        report,
        transcription,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the row store directory
pub fn store_dir() -> Result<PathBuf> {
    Ok(config()?.store.clone())
}

/// Get the transcripts directory ($HOME/transcripts)
pub fn transcripts_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("transcripts"))
}
