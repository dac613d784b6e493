//! Loading engine settings from a JSON file and the process environment.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{EngineSettings, LogFormatSetting};
use crate::validate::validate;

/// Overrides the logging level.
pub const ENV_LOG_LEVEL: &str = "ANITORRENT_LOG_LEVEL";
/// Overrides the logging format (`json`, `pretty`, `auto`).
pub const ENV_LOG_FORMAT: &str = "ANITORRENT_LOG_FORMAT";
/// Overrides the download rate limit in bytes per second.
pub const ENV_DOWNLOAD_RATE_LIMIT: &str = "ANITORRENT_DOWNLOAD_RATE_LIMIT";
/// Overrides the upload rate limit in bytes per second.
pub const ENV_UPLOAD_RATE_LIMIT: &str = "ANITORRENT_UPLOAD_RATE_LIMIT";

/// Load settings: file (when given) over defaults, then process environment, then validation.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or the resulting settings fail validation.
pub fn load(path: Option<&Path>) -> ConfigResult<EngineSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Like [`load`], reading overrides through `lookup` instead of the process environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<EngineSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match path {
        Some(path) => read_file(path)?,
        None => EngineSettings::default(),
    };
    apply_overrides(&mut settings, lookup)?;
    validate(&settings)?;
    Ok(settings)
}

/// Parse a settings document from disk. Missing fields take their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
pub fn read_file(path: &Path) -> ConfigResult<EngineSettings> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded engine settings file");
    Ok(settings)
}

fn apply_overrides<F>(settings: &mut EngineSettings, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        settings.logging.level = level;
    }

    if let Some(format) = lookup(ENV_LOG_FORMAT) {
        settings.logging.format = match format.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormatSetting::Json,
            "pretty" => LogFormatSetting::Pretty,
            "auto" => LogFormatSetting::Auto,
            _ => {
                return Err(ConfigError::InvalidOverride {
                    variable: ENV_LOG_FORMAT,
                    value: format,
                });
            }
        };
    }

    if let Some(value) = lookup(ENV_DOWNLOAD_RATE_LIMIT) {
        settings.download_rate_limit_bytes = parse_limit(ENV_DOWNLOAD_RATE_LIMIT, value)?;
    }

    if let Some(value) = lookup(ENV_UPLOAD_RATE_LIMIT) {
        settings.upload_rate_limit_bytes = parse_limit(ENV_UPLOAD_RATE_LIMIT, value)?;
    }

    Ok(())
}

fn parse_limit(variable: &'static str, value: String) -> ConfigResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride { variable, value })
}
