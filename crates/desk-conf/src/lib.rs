//! # Contract Desk configuration
//!
//! [`Settings`] are merged from layered sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`desk.toml` unless another path is given)
//! 3. environment variables prefixed `DESK_`, e.g. `DESK_LIST_PER_PAGE=50`
//!
//! [`logging::init`] installs the tracing subscriber the settings describe.

pub mod logging;
pub mod settings;
pub mod sources;

pub use settings::{DEFAULT_CONFIG_FILE, ENV_PREFIX, LogFormat, Settings, SettingsError};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
