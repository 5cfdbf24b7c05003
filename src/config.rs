use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned as-is; relative paths are joined with the
/// config file's parent directory so behavior does not depend on the
/// current working directory.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_timeout() -> u64 {
    600
}

fn default_file_poll_interval() -> u64 {
    10
}

fn default_file_poll_max_attempts() -> u32 {
    30
}

fn default_database_path() -> PathBuf {
    PathBuf::from("complyd.db")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("static")
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports the following syntax (shell-compatible):
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `${VAR:-}` - Optional variable, empty string if not set
/// - `$$` - Escaped `$` (only needed before `{` to prevent expansion)
///
/// Nested expansion (`${VAR:-${DEFAULT}}`) is not supported, and an
/// unclosed `${` returns an error.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            match chars.peek() {
                // Escaped $ -> literal $
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                // Start of variable reference
                Some('{') => {
                    chars.next(); // consume '{'
                    let expanded = parse_var_reference(&mut chars)?;
                    result.push_str(&expanded);
                }
                // Not a variable reference, keep literal $
                _ => {
                    result.push('$');
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut in_default = false;
    let mut found_closing_brace = false;

    while let Some(&c) = chars.peek() {
        match c {
            '}' => {
                chars.next(); // consume '}'
                found_closing_brace = true;
                break;
            }
            ':' if !in_default => {
                chars.next(); // consume ':'
                // Check for '-' (default value syntax)
                if chars.peek() == Some(&'-') {
                    chars.next(); // consume '-'
                    in_default = true;
                    default_value = Some(String::new());
                } else {
                    // ':' without '-' is part of var name (unusual but valid)
                    var_name.push(':');
                }
            }
            _ => {
                chars.next();
                if in_default {
                    default_value.as_mut().unwrap().push(c);
                } else {
                    var_name.push(c);
                }
            }
        }
    }

    if !found_closing_brace {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => match default_value {
            Some(default) => Ok(default),
            None => Err(ConfigError::MissingEnvVar(var_name)),
        },
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

// ============================================================================
// GeminiConfig
// ============================================================================

/// Configuration for the Gemini generative backend.
#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    /// API key. Falls back to the GEMINI_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on a single generation call.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_seconds: u64,
    /// Interval between readiness checks for an uploaded asset.
    #[serde(default = "default_file_poll_interval")]
    pub file_poll_interval_seconds: u64,
    /// Readiness checks performed before giving up on an uploaded asset.
    #[serde(default = "default_file_poll_max_attempts")]
    pub file_poll_max_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            generation_timeout_seconds: default_generation_timeout(),
            file_poll_interval_seconds: default_file_poll_interval(),
            file_poll_max_attempts: default_file_poll_max_attempts(),
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key from config or the environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key
            && !key.is_empty()
        {
            return Ok(key.clone());
        }
        std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))
    }
}

// ============================================================================
// DatabaseConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

// ============================================================================
// UploadsConfig
// ============================================================================

/// Where uploaded files are saved before analysis.
#[derive(Debug, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
