//! Configuration sources merged by [`crate::Settings::load`]

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// One layer of configuration
pub trait ConfigSource: Send + Sync {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Higher priorities override lower ones
	fn priority(&self) -> u8;

	fn description(&self) -> String;
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variables, optionally filtered by a prefix
///
/// The prefix is stripped and keys are lowercased, so `DESK_BIND` becomes
/// `bind`. Integer and boolean looking values are typed accordingly.
pub struct EnvSource {
	prefix: Option<String>,
}

impl EnvSource {
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// # Examples
	///
	/// ```
	/// use desk_conf::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new().with_prefix("DESK_");
	/// assert_eq!(source.description(), "Environment variables (prefix: DESK_)");
	/// ```
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

fn typed_value(raw: String) -> Value {
	if let Ok(number) = raw.parse::<i64>() {
		Value::Number(number.into())
	} else if let Ok(flag) = raw.parse::<bool>() {
		Value::Bool(flag)
	} else if raw.starts_with('[')
		&& let Ok(list @ Value::Array(_)) = serde_json::from_str::<Value>(&raw)
	{
		list
	} else {
		Value::String(raw)
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(rest) => rest,
					None => continue,
				},
				None => key.as_str(),
			};
			if clean_key.is_empty() {
				continue;
			}
			config.insert(clean_key.to_lowercase(), typed_value(value));
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

/// A TOML file; a missing file contributes nothing
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected a table at the root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Fixed values, usually the defaults of a settings struct
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// # Examples
	///
	/// ```
	/// use desk_conf::{ConfigSource, DefaultSource};
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new().with_value("list_per_page", Value::from(100));
	/// assert_eq!(source.load().unwrap()["list_per_page"], Value::from(100));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}

	/// Every top-level field of a serialized object
	pub fn from_object(value: Value) -> Result<Self, SourceError> {
		match value {
			Value::Object(map) => Ok(Self {
				values: map.into_iter().collect(),
			}),
			_ => Err(SourceError::Parse("Defaults must serialize to an object".to_string())),
		}
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;
	use std::env;
	use tempfile::TempDir;

	#[rstest]
	#[case("50", Value::from(50))]
	#[case("true", Value::Bool(true))]
	#[case("127.0.0.1:8000", Value::from("127.0.0.1:8000"))]
	#[case(r#"["https://portal.example"]"#, serde_json::json!(["https://portal.example"]))]
	#[case("[broken", Value::from("[broken"))]
	fn test_typed_value(#[case] raw: &str, #[case] expected: Value) {
		assert_eq!(typed_value(raw.to_string()), expected);
	}

	#[test]
	#[serial]
	fn test_env_source_strips_prefix() {
		// SAFETY: serialized with every other test touching the environment
		unsafe {
			env::set_var("DESK_TEST_LIST_PER_PAGE", "25");
			env::set_var("OTHER_TEST_LIST_PER_PAGE", "7");
		}

		let config = EnvSource::new().with_prefix("DESK_TEST_").load().unwrap();

		assert_eq!(config.get("list_per_page"), Some(&Value::from(25)));
		assert_eq!(config.len(), 1);

		// SAFETY: see above
		unsafe {
			env::remove_var("DESK_TEST_LIST_PER_PAGE");
			env::remove_var("OTHER_TEST_LIST_PER_PAGE");
		}
	}

	#[test]
	fn test_toml_source() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("desk.toml");
		fs::write(&path, "bind = \"0.0.0.0:9000\"\nlist_per_page = 20\n").unwrap();

		let config = TomlFileSource::new(&path).load().unwrap();

		assert_eq!(config.get("bind"), Some(&Value::from("0.0.0.0:9000")));
		assert_eq!(config.get("list_per_page"), Some(&Value::from(20)));
	}

	#[test]
	fn test_missing_toml_file_is_empty() {
		let dir = TempDir::new().unwrap();
		let config = TomlFileSource::new(dir.path().join("absent.toml")).load().unwrap();
		assert!(config.is_empty());
	}

	#[test]
	fn test_broken_toml_file_is_an_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("desk.toml");
		fs::write(&path, "bind = ").unwrap();
		assert!(matches!(TomlFileSource::new(&path).load(), Err(SourceError::Toml(_))));
	}
}
