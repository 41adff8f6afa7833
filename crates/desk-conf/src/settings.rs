use crate::sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file read when no other path is given
pub const DEFAULT_CONFIG_FILE: &str = "desk.toml";

/// Prefix of environment variables that override settings
pub const ENV_PREFIX: &str = "DESK_";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error(transparent)]
	Source(#[from] SourceError),

	#[error("Invalid settings: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
}

/// Everything the desk binary needs to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub database_url: String,
	pub max_connections: u32,
	/// Address the HTTP server binds
	pub bind: String,
	/// Root of uploaded files
	pub media_root: PathBuf,
	pub site_title: String,
	pub list_per_page: u64,
	pub history_per_page: u64,
	/// `tracing` filter directive, overridden by `RUST_LOG`
	pub log_level: String,
	pub log_format: LogFormat,
	/// Realm of the Basic authentication challenge
	pub realm: String,
	/// Origins besides the desk's own allowed to submit forms
	pub csrf_trusted_origins: Vec<String>,
	pub shutdown_timeout_secs: u64,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			database_url: "sqlite://desk.db".to_string(),
			max_connections: 5,
			bind: "127.0.0.1:8000".to_string(),
			media_root: PathBuf::from("media"),
			site_title: "Contract Desk".to_string(),
			list_per_page: 100,
			history_per_page: 50,
			log_level: "info".to_string(),
			log_format: LogFormat::Pretty,
			realm: "desk".to_string(),
			csrf_trusted_origins: Vec::new(),
			shutdown_timeout_secs: 30,
		}
	}
}

impl Settings {
	/// Merge defaults, the TOML file and `DESK_*` variables, then validate
	///
	/// `config` falls back to [`DEFAULT_CONFIG_FILE`]; a missing file is
	/// not an error.
	pub fn load(config: Option<&Path>) -> Result<Self, SettingsError> {
		let path = config.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(DefaultSource::from_object(serde_json::to_value(Self::default()).map_err(SourceError::from)?)?),
			Box::new(TomlFileSource::new(path)),
			Box::new(EnvSource::new().with_prefix(ENV_PREFIX)),
		];
		Self::from_sources(sources)
	}

	/// Merge `sources` in priority order, higher priorities winning
	///
	/// # Examples
	///
	/// ```
	/// use desk_conf::{ConfigSource, DefaultSource, Settings};
	/// use serde_json::Value;
	///
	/// let sources: Vec<Box<dyn ConfigSource>> = vec![
	///     Box::new(DefaultSource::new().with_value("list_per_page", Value::from(20))),
	/// ];
	/// let settings = Settings::from_sources(sources).unwrap();
	/// assert_eq!(settings.list_per_page, 20);
	/// assert_eq!(settings.history_per_page, 50);
	/// ```
	pub fn from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<Self, SettingsError> {
		sources.sort_by_key(|source| source.priority());

		let mut merged = Map::new();
		for source in &sources {
			let values = source.load()?;
			tracing::debug!(source = %source.description(), keys = values.len(), "Loaded settings source");
			merged.extend(values);
		}

		let settings: Settings =
			serde_json::from_value(Value::Object(merged)).map_err(|e| SettingsError::Invalid(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		self.bind_addr()?;
		if self.list_per_page == 0 || self.history_per_page == 0 {
			return Err(SettingsError::Invalid("Page sizes must be positive".to_string()));
		}
		if self.max_connections == 0 {
			return Err(SettingsError::Invalid("max_connections must be positive".to_string()));
		}
		Ok(())
	}

	pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
		self.bind
			.parse()
			.map_err(|_| SettingsError::Invalid(format!("'{}' is not a socket address", self.bind)))
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_secs(self.shutdown_timeout_secs)
	}
}
