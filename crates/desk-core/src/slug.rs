//! Composite object addresses
//!
//! Every list/add/change/delete/history route addresses its object with a
//! slug of the form `model_name-object_id-related_id`. `0` stands for "no
//! object", so `contract-0-0` is the contract list and `letter-0-7` is the
//! letter list of contract 7.

use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug {
	pub model: String,
	pub obj_id: i64,
	pub related_id: i64,
}

impl Slug {
	/// Slug addressing the whole list of `model`
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::Slug;
	///
	/// assert_eq!(Slug::new("contract").to_string(), "contract-0-0");
	/// ```
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			obj_id: 0,
			related_id: 0,
		}
	}

	pub fn with_model(mut self, model: impl Into<String>) -> Self {
		self.model = model.into();
		self
	}

	pub fn with_obj_id(mut self, obj_id: i64) -> Self {
		self.obj_id = obj_id;
		self
	}

	pub fn with_related_id(mut self, related_id: i64) -> Self {
		self.related_id = related_id;
		self
	}

	/// Parse a slug, tolerating missing id segments
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::Slug;
	///
	/// let slug = Slug::parse("letter-3-7").unwrap();
	/// assert_eq!((slug.model.as_str(), slug.obj_id, slug.related_id), ("letter", 3, 7));
	///
	/// let slug = Slug::parse("contract").unwrap();
	/// assert_eq!(slug.to_string(), "contract-0-0");
	///
	/// assert!(Slug::parse("a-1-2-3").is_err());
	/// ```
	pub fn parse(raw: &str) -> DeskResult<Self> {
		let parts: Vec<&str> = raw.split('-').collect();
		if parts.len() > 3 {
			return Err(DeskError::InvalidSlug(raw.to_string()));
		}

		let model = parts[0];
		if model.is_empty() || !model.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
			return Err(DeskError::InvalidSlug(raw.to_string()));
		}

		let id = |index: usize| -> DeskResult<i64> {
			match parts.get(index) {
				None => Ok(0),
				Some(segment) if segment.is_empty() => Ok(0),
				Some(segment) => segment
					.parse::<i64>()
					.ok()
					.filter(|value| *value >= 0)
					.ok_or_else(|| DeskError::InvalidSlug(raw.to_string())),
			}
		};

		Ok(Self {
			model: model.to_string(),
			obj_id: id(1)?,
			related_id: id(2)?,
		})
	}

	/// Build a slug from an optional base, overriding the given parts
	///
	/// Fails when neither the base nor the override names a model.
	pub fn resolve(
		base: Option<&Slug>,
		model: Option<&str>,
		obj_id: Option<i64>,
		related_id: Option<i64>,
	) -> DeskResult<Self> {
		let model = model
			.map(str::to_string)
			.or_else(|| base.map(|b| b.model.clone()))
			.filter(|m| !m.is_empty())
			.ok_or_else(|| DeskError::ImproperlyConfigured("The model must be defined.".to_string()))?;

		Ok(Self {
			model,
			obj_id: obj_id.or_else(|| base.map(|b| b.obj_id)).unwrap_or(0),
			related_id: related_id
				.or_else(|| base.map(|b| b.related_id))
				.unwrap_or(0),
		})
	}

	/// Id of the contract the addressed object hangs off
	pub fn contract_id(&self) -> i64 {
		if self.related_id == 0 {
			self.obj_id
		} else {
			self.related_id
		}
	}

	pub fn is_list(&self) -> bool {
		self.obj_id == 0 && self.related_id == 0
	}
}

impl fmt::Display for Slug {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}-{}", self.model, self.obj_id, self.related_id)
	}
}

impl FromStr for Slug {
	type Err = DeskError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Slug::parse(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("contract-0-0")]
	#[case("letter-12-7")]
	#[case("calculation-5-5")]
	#[case("stage-0-3")]
	fn test_parse_format_round_trip(#[case] raw: &str) {
		assert_eq!(Slug::parse(raw).unwrap().to_string(), raw);
	}

	#[rstest]
	#[case("contract", "contract-0-0")]
	#[case("contract-4", "contract-4-0")]
	#[case("member--9", "member-0-9")]
	fn test_missing_segments_default_to_zero(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(Slug::parse(raw).unwrap().to_string(), expected);
	}

	#[rstest]
	#[case("")]
	#[case("-1-2")]
	#[case("contract-x-0")]
	#[case("contract-1-2-3")]
	#[case("contract--1-0")]
	#[case("con tract-1-0")]
	fn test_parse_rejects_malformed(#[case] raw: &str) {
		assert!(matches!(Slug::parse(raw), Err(DeskError::InvalidSlug(_))));
	}

	#[rstest]
	fn test_resolve_overrides_base() {
		let base = Slug::parse("letter-3-7").unwrap();
		let slug = Slug::resolve(Some(&base), None, Some(0), None).unwrap();
		assert_eq!(slug.to_string(), "letter-0-7");

		let slug = Slug::resolve(Some(&base), Some("member"), None, None).unwrap();
		assert_eq!(slug.to_string(), "member-3-7");
	}

	#[rstest]
	fn test_resolve_requires_model() {
		let err = Slug::resolve(None, None, Some(1), None).unwrap_err();
		assert_eq!(err.to_string(), "Improperly configured: The model must be defined.");
	}

	#[rstest]
	#[case("contract-8-0", 8)]
	#[case("letter-2-8", 8)]
	#[case("letter-0-8", 8)]
	fn test_contract_id(#[case] raw: &str, #[case] expected: i64) {
		assert_eq!(Slug::parse(raw).unwrap().contract_id(), expected);
	}
}
