//! Submitted form data

use std::collections::BTreeMap;

/// File part of a multipart submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
	pub filename: String,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

/// Decoded POST body, a field may repeat (multi-selects)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormData {
	fields: BTreeMap<String, Vec<String>>,
	files: BTreeMap<String, UploadedFile>,
}

impl FormData {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_pairs<K, V, I>(pairs: I) -> Self
	where
		K: Into<String>,
		V: Into<String>,
		I: IntoIterator<Item = (K, V)>,
	{
		let mut data = Self::new();
		for (key, value) in pairs {
			data.append(key, value);
		}
		data
	}

	pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.fields.entry(key.into()).or_default().push(value.into());
	}

	pub fn insert_file(&mut self, key: impl Into<String>, file: UploadedFile) {
		self.files.insert(key.into(), file);
	}

	/// First value submitted for a key
	pub fn get(&self, key: &str) -> Option<&str> {
		self.fields
			.get(key)
			.and_then(|values| values.first())
			.map(String::as_str)
	}

	pub fn get_all(&self, key: &str) -> &[String] {
		self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn file(&self, key: &str) -> Option<&UploadedFile> {
		self.files.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.fields.contains_key(key) || self.files.contains_key(key)
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty() && self.files.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_repeated_keys_collect() {
		let data = FormData::from_pairs([("stage", "1"), ("stage", "3"), ("_continue", "")]);
		assert_eq!(data.get("stage"), Some("1"));
		assert_eq!(data.get_all("stage"), ["1", "3"]);
		assert!(data.contains("_continue"));
		assert!(data.get_all("missing").is_empty());
	}
}
