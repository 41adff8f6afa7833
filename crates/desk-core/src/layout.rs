//! Form layouts
//!
//! A layout lists the fields a model form shows on the add and change
//! pages, the readonly subset, optional fieldsets, per-field overrides of
//! the model descriptor, choice restrictions for relations and extra
//! validation rules.

use crate::registry::FieldDescriptor;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fieldset {
	pub title: &'static str,
	pub collapsed: bool,
	/// Each row holds one or more fields rendered side by side
	pub rows: Vec<Vec<&'static str>>,
}

impl Fieldset {
	pub fn new(title: &'static str, rows: Vec<Vec<&'static str>>) -> Self {
		Self {
			title,
			collapsed: false,
			rows,
		}
	}

	pub fn collapsed(mut self) -> Self {
		self.collapsed = true;
		self
	}

	pub fn flat(title: &'static str, fields: &[&'static str]) -> Self {
		Self::new(title, fields.iter().map(|f| vec![*f]).collect())
	}

	pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.rows.iter().flatten().copied()
	}
}

/// Which rows a relation field offers as choices
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChoiceScope {
	#[default]
	All,
	/// Rows whose `view` flag is set
	Visible,
	/// Members of the current contract, optionally only those with a flag set
	ContractMembers { flag: Option<&'static str> },
	/// Visible employees not yet members of the current contract
	EmployeesOutsideContract,
}

/// Extra validation and derivation attached to a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRule {
	/// Reject text longer than `max` characters
	MaxChars {
		field: &'static str,
		max: usize,
		message: &'static str,
	},
	/// On add, reject a value already present on the same contract
	UniqueInContract {
		field: &'static str,
		message: &'static str,
	},
	/// Only Cyrillic letters and `-`
	Cyrillic { fields: &'static [&'static str] },
	/// Copy columns of the selected related row into readonly fields on save
	///
	/// Pairs are `(target field, source field of the related row)`; a
	/// relation source copies the display text of its row.
	FillFromRelated {
		relation: &'static str,
		pairs: &'static [(&'static str, &'static str)],
	},
}

pub const CYRILLIC_PATTERN: &str = r"^[А-Яа-яЁё-]+$";
pub const CYRILLIC_MESSAGE: &str = "Only Cyrillic characters and - are allowed";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormLayout {
	pub fields: Vec<&'static str>,
	pub add_fields: Option<Vec<&'static str>>,
	pub readonly: Vec<&'static str>,
	pub add_readonly: Option<Vec<&'static str>>,
	pub fieldsets: Vec<Fieldset>,
	pub overrides: BTreeMap<&'static str, FieldDescriptor>,
	pub choices: BTreeMap<&'static str, ChoiceScope>,
	pub rules: Vec<FormRule>,
}

impl FormLayout {
	pub fn new(fields: &[&'static str]) -> Self {
		Self {
			fields: fields.to_vec(),
			..Default::default()
		}
	}

	pub fn with_add_fields(mut self, fields: &[&'static str]) -> Self {
		self.add_fields = Some(fields.to_vec());
		self
	}

	pub fn with_readonly(mut self, fields: &[&'static str]) -> Self {
		self.readonly = fields.to_vec();
		self
	}

	pub fn with_add_readonly(mut self, fields: &[&'static str]) -> Self {
		self.add_readonly = Some(fields.to_vec());
		self
	}

	pub fn with_fieldset(mut self, fieldset: Fieldset) -> Self {
		self.fieldsets.push(fieldset);
		self
	}

	/// Replace the model's descriptor of a field for this form
	pub fn with_override(mut self, field: FieldDescriptor) -> Self {
		self.overrides.insert(field.name, field);
		self
	}

	pub fn with_choices(mut self, field: &'static str, scope: ChoiceScope) -> Self {
		self.choices.insert(field, scope);
		self
	}

	pub fn with_rule(mut self, rule: FormRule) -> Self {
		self.rules.push(rule);
		self
	}

	/// Fields shown on the add (`adding = true`) or change page
	pub fn fields_for(&self, adding: bool) -> &[&'static str] {
		match (&self.add_fields, adding) {
			(Some(fields), true) => fields,
			_ => &self.fields,
		}
	}

	/// Readonly fields for the page
	///
	/// The add page uses the add-specific list as soon as the layout has any
	/// add-specific setting, so a field that is readonly after creation can
	/// still be filled in when adding.
	pub fn readonly_for(&self, adding: bool) -> Vec<&'static str> {
		if !adding {
			return self.readonly.clone();
		}
		match (&self.add_fields, &self.add_readonly) {
			(_, Some(readonly)) => readonly.clone(),
			(Some(_), None) => Vec::new(),
			(None, None) => self.readonly.clone(),
		}
	}

	/// Fieldsets for the page; a single untitled one when none are declared
	pub fn fieldsets_for(&self, adding: bool) -> Vec<Fieldset> {
		if adding || self.fieldsets.is_empty() {
			return vec![Fieldset::flat("", self.fields_for(adding))];
		}
		self.fieldsets.clone()
	}

	pub fn choice_scope(&self, field: &str) -> ChoiceScope {
		self.choices.get(field).cloned().unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn member() -> FormLayout {
		FormLayout::new(&["employee", "otvetstvenny", "ispolnitel", "soprovojdenie"])
			.with_add_fields(&["employee"])
			.with_readonly(&["employee"])
	}

	#[rstest]
	fn test_add_page_uses_add_fields() {
		let layout = member();
		assert_eq!(layout.fields_for(true), ["employee"]);
		assert_eq!(layout.fields_for(false).len(), 4);
	}

	#[rstest]
	fn test_readonly_only_after_creation() {
		let layout = member();
		assert!(layout.readonly_for(true).is_empty());
		assert_eq!(layout.readonly_for(false), vec!["employee"]);
	}

	#[rstest]
	fn test_plain_layout_keeps_readonly_on_add() {
		let layout = FormLayout::new(&["number", "content"]).with_readonly(&["content"]);
		assert_eq!(layout.readonly_for(true), vec!["content"]);
	}

	#[rstest]
	fn test_fieldsets_fall_back_to_flat_list() {
		let layout = FormLayout::new(&["number", "date"])
			.with_fieldset(Fieldset::new("", vec![vec!["number", "date"]]))
			.with_fieldset(Fieldset::flat("Cost", &["price"]).collapsed());

		assert_eq!(layout.fieldsets_for(false).len(), 2);
		let add = layout.fieldsets_for(true);
		assert_eq!(add.len(), 1);
		assert_eq!(add[0].fields().collect::<Vec<_>>(), vec!["number", "date"]);
	}
}
