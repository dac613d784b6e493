#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(missing_docs, unreachable_pub)]

//! Engine settings for the torrent handle layer.
//!
//! Layout: `model.rs` (typed settings), `validate.rs` (validation rules),
//! `loader.rs` (file + environment loading).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_with_env, read_file};
pub use model::{EngineSettings, LogFormatSetting, LoggingSettings};
pub use validate::{MAX_RATE_LIMIT_BPS, validate};
