//! Validation rules for engine settings.

use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineSettings;

/// Largest rate limit accepted by libtorrent's integer settings.
pub const MAX_RATE_LIMIT_BPS: u64 = i32::MAX as u64;

const TRACKER_SCHEMES: [&str; 3] = ["http://", "https://", "udp://"];

/// Validate a settings document before it is handed to an engine.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the first offending field.
pub fn validate(settings: &EngineSettings) -> ConfigResult<()> {
    validate_fingerprint(&settings.peer_fingerprint)?;

    if settings.user_agent.trim().is_empty() {
        return Err(invalid("engine", "user_agent", None, "must not be empty"));
    }

    for (field, value) in [
        ("download_rate_limit_bytes", settings.download_rate_limit_bytes),
        ("upload_rate_limit_bytes", settings.upload_rate_limit_bytes),
    ] {
        if value > MAX_RATE_LIMIT_BPS {
            return Err(invalid(
                "engine",
                field,
                Some(value.to_string()),
                "exceeds maximum rate limit",
            ));
        }
    }

    for tracker in &settings.default_trackers {
        if !TRACKER_SCHEMES
            .iter()
            .any(|scheme| tracker.starts_with(scheme))
        {
            return Err(invalid(
                "engine",
                "default_trackers",
                Some(tracker.clone()),
                "unsupported tracker scheme",
            ));
        }
    }

    if settings.logging.level.trim().is_empty() {
        return Err(invalid("logging", "level", None, "must not be empty"));
    }

    Ok(())
}

fn validate_fingerprint(fingerprint: &str) -> ConfigResult<()> {
    let well_formed = fingerprint.len() == 8
        && fingerprint.is_ascii()
        && fingerprint.starts_with('-')
        && fingerprint.ends_with('-');
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            "engine",
            "peer_fingerprint",
            Some(fingerprint.to_string()),
            "must be 8 ASCII characters wrapped in '-'",
        ))
    }
}

const fn invalid(
    section: &'static str,
    field: &'static str,
    value: Option<String>,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        value,
        reason,
    }
}
