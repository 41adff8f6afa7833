//! Formsets: one model form per list row
//!
//! Every formset posts a management form (`{prefix}-TOTAL_FORMS`,
//! `{prefix}-INITIAL_FORMS`) and a hidden `{prefix}-{i}-id` per saved row.
//! Extra forms beyond the saved rows are validated only when the user filled
//! them in.

use crate::field::Choice;
use crate::form::ModelForm;
use desk_core::layout::FormLayout;
use desk_core::registry::ModelDescriptor;
use desk_core::{DeskResult, FormData, Record};
use serde::Serialize;
use std::collections::BTreeMap;

pub const TOTAL_FORM_COUNT: &str = "TOTAL_FORMS";
pub const INITIAL_FORM_COUNT: &str = "INITIAL_FORMS";

const MANAGEMENT_FORM_TAMPERED: &str = "ManagementForm data is missing or has been tampered with.";
const ROWS_CHANGED: &str = "The list has changed since the page was loaded. Reload the page and try again.";

/// Hidden bookkeeping inputs of a formset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagementForm {
	pub prefix: String,
	pub total_forms: usize,
	pub initial_forms: usize,
}

impl ManagementForm {
	pub fn total_name(&self) -> String {
		format!("{}-{}", self.prefix, TOTAL_FORM_COUNT)
	}

	pub fn initial_name(&self) -> String {
		format!("{}-{}", self.prefix, INITIAL_FORM_COUNT)
	}
}

#[derive(Debug, Clone)]
pub struct FormSet {
	prefix: String,
	forms: Vec<ModelForm>,
	initial_forms: usize,
	non_form_errors: Vec<String>,
	bound: bool,
}

impl FormSet {
	/// Build one form per saved row, followed by one per extra (unsaved) row
	pub fn new(
		model: &ModelDescriptor,
		layout: Option<&FormLayout>,
		fields: &[&'static str],
		readonly: &[&'static str],
		prefix: impl Into<String>,
		rows: Vec<Record>,
		extra: Vec<Record>,
	) -> DeskResult<Self> {
		let prefix = prefix.into();
		let initial_forms = rows.len();
		let mut forms = Vec::with_capacity(rows.len() + extra.len());
		for (index, instance) in rows.into_iter().chain(extra).enumerate() {
			let form = ModelForm::for_fields(model, layout, fields, readonly)?
				.with_instance(instance)
				.with_prefix(format!("{}-{}", prefix, index));
			forms.push(form);
		}
		Ok(Self {
			prefix,
			forms,
			initial_forms,
			non_form_errors: Vec::new(),
			bound: false,
		})
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn forms(&self) -> &[ModelForm] {
		&self.forms
	}

	pub fn forms_mut(&mut self) -> &mut [ModelForm] {
		&mut self.forms
	}

	/// Form of the saved row with primary key `id`
	pub fn form_for(&self, id: i64) -> Option<&ModelForm> {
		self.forms[..self.initial_forms]
			.iter()
			.find(|form| form.instance().id == id)
	}

	pub fn extra_forms(&self) -> &[ModelForm] {
		&self.forms[self.initial_forms..]
	}

	pub fn initial_form_count(&self) -> usize {
		self.initial_forms
	}

	pub fn total_form_count(&self) -> usize {
		self.forms.len()
	}

	pub fn management_form(&self) -> ManagementForm {
		ManagementForm {
			prefix: self.prefix.clone(),
			total_forms: self.forms.len(),
			initial_forms: self.initial_forms,
		}
	}

	pub fn set_choices(&mut self, field: &str, choices: Vec<Choice>) {
		for form in &mut self.forms {
			form.set_choices(field, choices.clone());
		}
	}

	pub fn is_bound(&self) -> bool {
		self.bound
	}

	fn count(data: &FormData, key: &str) -> Option<usize> {
		data.get(key).and_then(|raw| raw.trim().parse().ok())
	}

	/// Bind submitted data, checking it against the rows the formset was built from
	pub fn bind(&mut self, data: &FormData) {
		self.bound = true;
		self.non_form_errors.clear();

		let management = self.management_form();
		let total = Self::count(data, &management.total_name());
		let initial = Self::count(data, &management.initial_name());
		match (total, initial) {
			(Some(total), Some(initial)) => {
				let ids_match = self.forms[..self.initial_forms].iter().all(|form| {
					data.get(&form.add_prefix("id"))
						.and_then(|raw| raw.parse::<i64>().ok())
						== Some(form.instance().id)
				});
				if total != self.forms.len() || initial != self.initial_forms || !ids_match {
					self.non_form_errors.push(ROWS_CHANGED.to_string());
				}
			}
			_ => self.non_form_errors.push(MANAGEMENT_FORM_TAMPERED.to_string()),
		}

		for form in &mut self.forms {
			form.bind(data);
		}
	}

	/// Validate every saved row and each filled-in extra row
	///
	/// All forms are validated even after a failure so every row shows its
	/// errors.
	pub fn is_valid(&mut self) -> bool {
		if !self.bound {
			return false;
		}
		let initial_forms = self.initial_forms;
		let mut valid = self.non_form_errors.is_empty();
		for (index, form) in self.forms.iter_mut().enumerate() {
			if index >= initial_forms && !form.has_changed() {
				continue;
			}
			valid &= form.is_valid();
		}
		valid && self.forms.iter().all(|form| !form.has_errors())
	}

	/// Forms whose values differ from their rows, in form order
	pub fn changed_forms(&self) -> impl Iterator<Item = &ModelForm> {
		self.forms.iter().filter(|form| form.has_changed())
	}

	pub fn has_changed(&self) -> bool {
		self.forms.iter().any(ModelForm::has_changed)
	}

	pub fn non_form_errors(&self) -> &[String] {
		&self.non_form_errors
	}

	/// Errors of each form, in form order
	pub fn errors(&self) -> Vec<&BTreeMap<String, Vec<String>>> {
		self.forms.iter().map(ModelForm::errors).collect()
	}

	pub fn total_error_count(&self) -> usize {
		self.non_form_errors.len()
			+ self
				.forms
				.iter()
				.map(|form| form.errors().values().map(Vec::len).sum::<usize>())
				.sum::<usize>()
	}
}
