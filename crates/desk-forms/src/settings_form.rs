//! Column settings form
//!
//! Lets a user pick which columns a list shows and in which order. Each of
//! the `count` columns is a select over the same choices; the first column
//! may be pinned to a fixed value.

use crate::bound_field::ChoiceOption;
use desk_core::{DeskError, DeskResult, FormData};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DUPLICATE_COLUMNS: &str = "Column values must be unique.";
const PINNED_HELP: &str = "cannot be changed";

/// One column select, ready for a template
#[derive(Debug, Clone, Serialize)]
pub struct ColumnField {
	pub name: String,
	pub label: String,
	pub help_text: String,
	pub disabled: bool,
	pub value: String,
	pub errors: Vec<String>,
	pub choices: Vec<ChoiceOption>,
}

#[derive(Debug, Clone)]
pub struct ColumnSettingsForm {
	/// `(value, label)` pairs offered by every column
	choices: Vec<(String, String)>,
	initial: Vec<String>,
	first_column: Option<String>,
	data: Option<FormData>,
	cleaned: Vec<String>,
	errors: BTreeMap<String, Vec<String>>,
}

impl ColumnSettingsForm {
	/// Form with `count` columns prefilled from the stored `settings`
	///
	/// # Examples
	///
	/// ```
	/// use desk_forms::ColumnSettingsForm;
	///
	/// let choices = vec![("number".to_string(), "Contract number".to_string())];
	/// let form = ColumnSettingsForm::new(choices.clone(), &[], 3, Some("number")).unwrap();
	/// assert_eq!(form.column_names(), vec!["column_1", "column_2", "column_3"]);
	///
	/// assert!(ColumnSettingsForm::new(choices, &[], 0, None).is_err());
	/// ```
	pub fn new(
		choices: Vec<(String, String)>,
		settings: &[String],
		count: usize,
		first_column: Option<&str>,
	) -> DeskResult<Self> {
		if count < 1 {
			return Err(DeskError::ImproperlyConfigured(
				"The number of fields must be a positive integer".to_string(),
			));
		}
		let initial = (0..count)
			.map(|index| match (index, first_column) {
				(0, Some(first)) => first.to_string(),
				_ => settings.get(index).cloned().unwrap_or_default(),
			})
			.collect();
		Ok(Self {
			choices,
			initial,
			first_column: first_column.map(str::to_string),
			data: None,
			cleaned: Vec::new(),
			errors: BTreeMap::new(),
		})
	}

	fn column_name(index: usize) -> String {
		format!("column_{}", index + 1)
	}

	pub fn column_names(&self) -> Vec<String> {
		(0..self.initial.len()).map(Self::column_name).collect()
	}

	fn is_pinned(&self, index: usize) -> bool {
		index == 0 && self.first_column.is_some()
	}

	pub fn bind(&mut self, data: &FormData) {
		self.data = Some(data.clone());
		self.cleaned.clear();
		self.errors.clear();
	}

	/// Submitted value of a column; a pinned column ignores the submission
	fn submitted(&self, index: usize) -> String {
		if self.is_pinned(index) {
			return self.initial[index].clone();
		}
		self.data
			.as_ref()
			.and_then(|data| data.get(&Self::column_name(index)))
			.unwrap_or_default()
			.trim()
			.to_string()
	}

	pub fn is_valid(&mut self) -> bool {
		if self.data.is_none() {
			return false;
		}
		self.errors.clear();
		let values: Vec<String> = (0..self.initial.len()).map(|i| self.submitted(i)).collect();

		for (index, value) in values.iter().enumerate() {
			if !value.is_empty() && !self.choices.iter().any(|(key, _)| key == value) {
				self.errors.entry(Self::column_name(index)).or_default().push(format!(
					"Select a valid choice. {} is not one of the available choices.",
					value
				));
			}
		}
		for (index, value) in values.iter().enumerate() {
			if !value.is_empty() && values.iter().filter(|other| *other == value).count() > 1 {
				self.errors
					.entry(Self::column_name(index))
					.or_default()
					.push(DUPLICATE_COLUMNS.to_string());
			}
		}

		self.cleaned = values;
		self.errors.is_empty()
	}

	pub fn has_changed(&self) -> bool {
		self.data.is_some()
			&& (0..self.initial.len()).any(|index| self.submitted(index) != self.initial[index])
	}

	/// Non-empty picks in column order, the list that gets stored
	pub fn selected(&self) -> Vec<String> {
		self.cleaned.iter().filter(|v| !v.is_empty()).cloned().collect()
	}

	pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
		&self.errors
	}

	pub fn fields(&self) -> Vec<ColumnField> {
		(0..self.initial.len())
			.map(|index| {
				let name = Self::column_name(index);
				let value = if self.data.is_some() {
					self.submitted(index)
				} else {
					self.initial[index].clone()
				};
				let mut choices = vec![ChoiceOption::blank(value.is_empty())];
				choices.extend(self.choices.iter().map(|(key, label)| ChoiceOption {
					value: key.clone(),
					label: label.clone(),
					selected: *key == value,
				}));
				ColumnField {
					label: format!("Column {}", index + 1),
					help_text: if self.is_pinned(index) {
						PINNED_HELP.to_string()
					} else {
						String::new()
					},
					disabled: self.is_pinned(index),
					errors: self.errors.get(&name).cloned().unwrap_or_default(),
					name,
					value,
					choices,
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn choices() -> Vec<(String, String)> {
		[("number", "Contract number"), ("date", "Date"), ("letter", "Letters")]
			.into_iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[rstest]
	fn test_prefilled_from_settings_with_pinned_first(choices: Vec<(String, String)>) {
		let stored = vec!["title".to_string(), "letter".to_string()];
		let form = ColumnSettingsForm::new(choices, &stored, 3, Some("number")).unwrap();
		let fields = form.fields();

		assert_eq!(fields[0].value, "number");
		assert!(fields[0].disabled);
		assert_eq!(fields[0].help_text, "cannot be changed");
		assert_eq!(fields[1].value, "letter");
		assert_eq!(fields[2].value, "");
		assert_eq!(fields[2].label, "Column 3");
	}

	#[rstest]
	fn test_duplicates_flag_every_column(choices: Vec<(String, String)>) {
		let mut form = ColumnSettingsForm::new(choices, &[], 4, Some("number")).unwrap();
		form.bind(&FormData::from_pairs([
			("column_1", "date"),
			("column_2", "date"),
			("column_3", "letter"),
			("column_4", "date"),
		]));

		assert!(!form.is_valid());
		assert!(form.errors().get("column_1").is_none());
		assert_eq!(form.errors()["column_2"], [DUPLICATE_COLUMNS]);
		assert_eq!(form.errors()["column_4"], [DUPLICATE_COLUMNS]);
	}

	#[rstest]
	fn test_selected_skips_blanks(choices: Vec<(String, String)>) {
		let mut form = ColumnSettingsForm::new(choices, &[], 4, Some("number")).unwrap();
		form.bind(&FormData::from_pairs([("column_2", ""), ("column_3", "letter")]));

		assert!(form.is_valid());
		assert!(form.has_changed());
		assert_eq!(form.selected(), vec!["number", "letter"]);
	}

	#[rstest]
	fn test_unknown_choice_rejected(choices: Vec<(String, String)>) {
		let mut form = ColumnSettingsForm::new(choices, &[], 2, None).unwrap();
		form.bind(&FormData::from_pairs([("column_1", "closed")]));
		assert!(!form.is_valid());
		assert_eq!(
			form.errors()["column_1"],
			["Select a valid choice. closed is not one of the available choices."]
		);
	}
}
