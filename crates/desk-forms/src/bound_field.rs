use crate::field::Widget;
use serde::Serialize;

/// Option of a select element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
	/// Submitted value, empty for the blank option
	pub value: String,
	pub label: String,
	pub selected: bool,
}

impl ChoiceOption {
	pub fn new(value: i64, label: &str, current: &str) -> Self {
		let value = value.to_string();
		Self {
			selected: value == current,
			value,
			label: label.to_string(),
		}
	}

	pub fn blank(selected: bool) -> Self {
		Self {
			value: String::new(),
			label: "---------".to_string(),
			selected,
		}
	}
}

/// A form field together with its current value and errors, ready for a template
#[derive(Debug, Clone, Serialize)]
pub struct BoundField {
	pub name: String,
	/// Input name including the form prefix
	pub html_name: String,
	pub label: String,
	pub help_text: String,
	pub widget: Widget,
	pub required: bool,
	pub readonly: bool,
	/// Value prefilled into the input
	pub value: String,
	pub checked: bool,
	/// Text shown when the field is readonly
	pub display: String,
	pub errors: Vec<String>,
	pub choices: Vec<ChoiceOption>,
	/// Stored file path of a file field
	pub file: Option<String>,
}

impl BoundField {
	pub fn has_errors(&self) -> bool {
		!self.errors.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_option_selection_compares_submitted_text() {
		assert!(ChoiceOption::new(2, "outgoing", "2").selected);
		assert!(!ChoiceOption::new(2, "outgoing", "").selected);
		assert!(ChoiceOption::blank(true).value.is_empty());
	}
}
