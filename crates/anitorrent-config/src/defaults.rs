//! Default values for engine settings.

/// Peer id prefix announced to other peers.
pub(crate) const PEER_FINGERPRINT: &str = "-AL4000-";
/// User agent sent to trackers and in the extension handshake.
pub(crate) const USER_AGENT: &str = "ani_libtorrent/3.0.0";
/// Client version advertised in the extension handshake.
pub(crate) const HANDSHAKE_CLIENT_VERSION: &str = "3.0.0";
/// Share ratio limit, where 100 means 1.0.
pub(crate) const SHARE_RATIO_LIMIT: u32 = 200;
/// Log level applied when nothing else is configured.
pub(crate) const LOG_LEVEL: &str = "info";
