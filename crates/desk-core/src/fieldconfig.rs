//! Declarative list configuration and its resolution
//!
//! A [`ListConfig`] says which columns a list shows, which of them link to
//! the change page, which are edited inline and which relations to load.
//! [`ListConfig::resolve`] turns it into the concrete column sets, rejecting
//! inconsistent configurations before any query runs.

use crate::error::{DeskError, DeskResult};

pub const ALL_FIELDS: &str = "__all__";

/// Which display columns link to the change page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkSetting {
	/// First display column
	#[default]
	Default,
	/// No links
	Disabled,
	Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListConfig {
	/// Relations loaded with the rows, `a__b` for nested relations
	pub fields_related: Vec<String>,
	pub fields_display: Option<Vec<String>>,
	pub fields_link: LinkSetting,
	pub fields_editable: Vec<String>,
	pub readonly_fields: Vec<String>,
}

/// Column sets after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFields {
	pub display: Vec<String>,
	pub link: Vec<String>,
	pub editable: Vec<String>,
}

fn owned(fields: &[&str]) -> Vec<String> {
	fields.iter().map(|f| f.to_string()).collect()
}

impl ListConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_related(mut self, fields: &[&str]) -> Self {
		self.fields_related = owned(fields);
		self
	}

	pub fn with_display(mut self, fields: &[&str]) -> Self {
		self.fields_display = Some(owned(fields));
		self
	}

	pub fn with_link(mut self, fields: &[&str]) -> Self {
		self.fields_link = LinkSetting::Fields(owned(fields));
		self
	}

	pub fn without_links(mut self) -> Self {
		self.fields_link = LinkSetting::Disabled;
		self
	}

	pub fn with_editable(mut self, fields: &[&str]) -> Self {
		self.fields_editable = owned(fields);
		self
	}

	pub fn with_readonly(mut self, fields: &[&str]) -> Self {
		self.readonly_fields = owned(fields);
		self
	}

	/// Resolve the display, link and editable column sets
	///
	/// `type_name` names the model in error messages.
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::fieldconfig::ListConfig;
	///
	/// let resolved = ListConfig::new().resolve("Letter").unwrap();
	/// assert_eq!(resolved.display, vec!["id"]);
	/// assert_eq!(resolved.link, vec!["id"]);
	///
	/// let err = ListConfig::new()
	///     .with_display(&["number"])
	///     .with_editable(&["date", "status"])
	///     .resolve("Letter")
	///     .unwrap_err();
	/// assert_eq!(
	///     err.to_string(),
	///     "Improperly configured: Missing fields (date, status) in \"fields_display\" for Letter"
	/// );
	/// ```
	pub fn resolve(&self, type_name: &str) -> DeskResult<ResolvedFields> {
		let display = match &self.fields_display {
			None => vec!["id".to_string()],
			Some(fields) if fields.is_empty() => vec!["id".to_string()],
			Some(fields) if fields.iter().any(|f| f == ALL_FIELDS) => {
				return Err(DeskError::ImproperlyConfigured(
					"\"__all__\" is not allowed, specify specific fields.".to_string(),
				));
			}
			Some(fields) => fields.clone(),
		};

		let link = match &self.fields_link {
			LinkSetting::Fields(fields) if !fields.is_empty() => fields.clone(),
			LinkSetting::Disabled => Vec::new(),
			_ => display.iter().take(1).cloned().collect(),
		};

		let missing: Vec<&str> = link
			.iter()
			.chain(&self.fields_editable)
			.filter(|field| !display.contains(field))
			.map(String::as_str)
			.collect();
		if !missing.is_empty() {
			return Err(DeskError::ImproperlyConfigured(format!(
				"Missing fields ({}) in \"fields_display\" for {}",
				missing.join(", "),
				type_name
			)));
		}

		Ok(ResolvedFields {
			display,
			link,
			editable: self.fields_editable.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_link_defaults_to_first_display_field() {
		let resolved = ListConfig::new()
			.with_display(&["number", "date"])
			.resolve("Letter")
			.unwrap();
		assert_eq!(resolved.link, vec!["number"]);
	}

	#[rstest]
	fn test_disabled_links_are_empty() {
		let resolved = ListConfig::new()
			.with_display(&["member", "time"])
			.without_links()
			.resolve("TimeWork")
			.unwrap();
		assert!(resolved.link.is_empty());
	}

	#[rstest]
	fn test_explicit_links_are_kept() {
		let resolved = ListConfig::new()
			.with_display(&["__str__", "tabel"])
			.with_link(&["tabel"])
			.resolve("Employee")
			.unwrap();
		assert_eq!(resolved.link, vec!["tabel"]);
	}

	#[rstest]
	#[case(&["__all__"])]
	#[case(&["number", "__all__"])]
	fn test_all_sentinel_rejected(#[case] display: &[&str]) {
		let err = ListConfig::new().with_display(display).resolve("Contract").unwrap_err();
		assert!(matches!(err, DeskError::ImproperlyConfigured(_)));
		assert!(err.to_string().contains("\"__all__\" is not allowed"));
	}

	#[rstest]
	#[case(ListConfig::new().with_display(&["name"]).with_link(&["abbr"]), "abbr")]
	#[case(ListConfig::new().with_display(&["name"]).with_editable(&["view"]), "view")]
	#[case(ListConfig::new().with_link(&["name"]), "name")]
	fn test_fields_outside_display_rejected(#[case] config: ListConfig, #[case] field: &str) {
		let err = config.resolve("Post").unwrap_err();
		assert_eq!(
			err.to_string(),
			format!(
				"Improperly configured: Missing fields ({}) in \"fields_display\" for Post",
				field
			)
		);
	}

	#[rstest]
	fn test_editable_inside_display_passes() {
		let resolved = ListConfig::new()
			.with_display(&["number", "date", "status"])
			.with_editable(&["date", "status"])
			.resolve("Letter")
			.unwrap();
		assert_eq!(resolved.editable, vec!["date", "status"]);
	}
}
