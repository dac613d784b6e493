//! Typed engine settings document.

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Settings applied to a torrent engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Peer id prefix, e.g. `-AL4000-`.
    pub peer_fingerprint: String,
    /// User agent sent to trackers.
    pub user_agent: String,
    /// Client version advertised in the extension handshake.
    pub handshake_client_version: Option<String>,
    /// Download cap in bytes per second; 0 means unlimited.
    pub download_rate_limit_bytes: u64,
    /// Upload cap in bytes per second; 0 means unlimited.
    pub upload_rate_limit_bytes: u64,
    /// Share ratio limit, 100 = 1.0.
    pub share_ratio_limit: u32,
    /// Trackers attached to every newly added torrent.
    pub default_trackers: Vec<String>,
    /// Fail limit used for default trackers (0 = unlimited retries).
    pub default_tracker_fail_limit: u8,
    /// Logging section.
    pub logging: LoggingSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            peer_fingerprint: defaults::PEER_FINGERPRINT.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            handshake_client_version: Some(defaults::HANDSHAKE_CLIENT_VERSION.to_string()),
            download_rate_limit_bytes: 0,
            upload_rate_limit_bytes: 0,
            share_ratio_limit: defaults::SHARE_RATIO_LIMIT,
            default_trackers: Vec::new(),
            default_tracker_fail_limit: 0,
            logging: LoggingSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Download cap, `None` when unlimited.
    #[must_use]
    pub const fn download_rate_limit(&self) -> Option<u64> {
        if self.download_rate_limit_bytes == 0 {
            None
        } else {
            Some(self.download_rate_limit_bytes)
        }
    }

    /// Upload cap, `None` when unlimited.
    #[must_use]
    pub const fn upload_rate_limit(&self) -> Option<u64> {
        if self.upload_rate_limit_bytes == 0 {
            None
        } else {
            Some(self.upload_rate_limit_bytes)
        }
    }
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Pick based on build profile.
    #[default]
    Auto,
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `anitorrent_handle=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormatSetting,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: LogFormatSetting::Auto,
        }
    }
}
