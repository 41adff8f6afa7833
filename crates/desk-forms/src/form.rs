use crate::bound_field::{BoundField, ChoiceOption};
use crate::field::{self, Choice, FieldError, Widget};
use desk_core::layout::{ChoiceScope, CYRILLIC_MESSAGE, CYRILLIC_PATTERN, FormLayout, FormRule};
use desk_core::registry::{FieldDescriptor, FieldKind, ModelDescriptor};
use desk_core::{DeskError, DeskResult, FieldValue, FormData, Record, Registry, UploadedFile};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Key for errors that belong to the form rather than one field
pub const ALL_FIELDS_KEY: &str = "_all";

/// Shown instead of an empty value in change messages and readonly cells
pub const EMPTY_VALUE_DISPLAY: &str = "-";

static CYRILLIC: Lazy<Regex> = Lazy::new(|| Regex::new(CYRILLIC_PATTERN).expect("valid pattern"));

/// One field of a model form
#[derive(Debug, Clone)]
pub struct FormField {
	pub descriptor: FieldDescriptor,
	pub widget: Widget,
	pub readonly: bool,
	pub scope: ChoiceScope,
	/// Offered options for relation fields, `None` until loaded
	pub choices: Option<Vec<Choice>>,
}

impl FormField {
	pub fn new(descriptor: FieldDescriptor) -> Self {
		Self {
			widget: Widget::for_field(&descriptor),
			descriptor,
			readonly: false,
			scope: ChoiceScope::default(),
			choices: None,
		}
	}

	pub fn name(&self) -> &'static str {
		self.descriptor.name
	}
}

/// Form for one record of a registered model
///
/// The form starts from an instance (an unsaved one when adding), is bound
/// to submitted data, validated, and finally writes its cleaned values back
/// into a record.
#[derive(Debug, Clone)]
pub struct ModelForm {
	model: &'static str,
	verbose_name: &'static str,
	adding: bool,
	prefix: Option<String>,
	fields: Vec<FormField>,
	rules: Vec<FormRule>,
	instance: Record,
	data: Option<FormData>,
	cleaned: BTreeMap<String, FieldValue>,
	errors: BTreeMap<String, Vec<String>>,
}

impl ModelForm {
	/// Form for the add (`adding = true`) or change page of a model
	pub fn new(model: &ModelDescriptor, layout: &FormLayout, adding: bool) -> DeskResult<Self> {
		let names = layout.fields_for(adding).to_vec();
		let readonly = layout.readonly_for(adding);
		let mut form = Self::for_fields(model, Some(layout), &names, &readonly)?;
		form.adding = adding;
		form.rules = layout.rules.clone();
		Ok(form)
	}

	/// Form over an explicit field list, e.g. the editable columns of a list
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::catalog::site;
	/// use desk_forms::ModelForm;
	///
	/// let catalog = site();
	/// let letter = catalog.registry.model("letter").unwrap();
	/// let form = ModelForm::for_fields(letter, None, &["status", "date"], &[]).unwrap();
	/// assert_eq!(form.field_names(), vec!["status", "date"]);
	/// assert!(ModelForm::for_fields(letter, None, &["missing"], &[]).is_err());
	/// ```
	pub fn for_fields(
		model: &ModelDescriptor,
		layout: Option<&FormLayout>,
		names: &[&'static str],
		readonly: &[&'static str],
	) -> DeskResult<Self> {
		let mut fields = Vec::with_capacity(names.len());
		for name in names {
			let descriptor = layout
				.and_then(|l| l.overrides.get(name))
				.or_else(|| model.field(name))
				.cloned()
				.ok_or_else(|| {
					DeskError::ImproperlyConfigured(format!(
						"Unknown field(s) ({}) specified for {}",
						name, model.model_name
					))
				})?;
			let mut field = FormField::new(descriptor);
			field.readonly = readonly.contains(name);
			if let Some(layout) = layout {
				field.scope = layout.choice_scope(name);
			}
			fields.push(field);
		}
		Ok(Self {
			model: model.model_name,
			verbose_name: model.verbose_name,
			adding: false,
			prefix: None,
			fields,
			rules: Vec::new(),
			instance: Record::new(model.model_name, 0),
			data: None,
			cleaned: BTreeMap::new(),
			errors: BTreeMap::new(),
		})
	}

	pub fn with_instance(mut self, instance: Record) -> Self {
		self.instance = instance;
		self
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	/// Render every field readonly (view pages, archive, missing change permission)
	pub fn all_readonly(mut self) -> Self {
		for field in &mut self.fields {
			field.readonly = true;
		}
		self
	}

	pub fn model(&self) -> &'static str {
		self.model
	}

	pub fn is_adding(&self) -> bool {
		self.adding
	}

	pub fn instance(&self) -> &Record {
		&self.instance
	}

	pub fn prefix(&self) -> Option<&str> {
		self.prefix.as_deref()
	}

	pub fn fields(&self) -> &[FormField] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&FormField> {
		self.fields.iter().find(|f| f.name() == name)
	}

	pub fn field_names(&self) -> Vec<&'static str> {
		self.fields.iter().map(FormField::name).collect()
	}

	pub fn rules(&self) -> &[FormRule] {
		&self.rules
	}

	pub fn set_choices(&mut self, name: &str, choices: Vec<Choice>) {
		if let Some(field) = self.fields.iter_mut().find(|f| f.name() == name) {
			field.choices = Some(choices);
		}
	}

	/// Name of a field's input, including the form prefix
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::catalog::site;
	/// use desk_forms::ModelForm;
	///
	/// let catalog = site();
	/// let letter = catalog.registry.model("letter").unwrap();
	/// let form = ModelForm::for_fields(letter, None, &["date"], &[])
	///     .unwrap()
	///     .with_prefix("table-0-form-3");
	/// assert_eq!(form.add_prefix("date"), "table-0-form-3-date");
	/// ```
	pub fn add_prefix(&self, name: &str) -> String {
		match &self.prefix {
			Some(prefix) => format!("{}-{}", prefix, name),
			None => name.to_string(),
		}
	}

	/// Starting value of a field: the instance value, or its default when adding
	pub fn initial(&self, field: &FormField) -> FieldValue {
		let value = self.instance.get(field.name());
		if !self.instance.is_saved() && value.is_empty() {
			return field.descriptor.default.clone();
		}
		value.clone()
	}

	pub fn bind(&mut self, data: &FormData) {
		self.data = Some(data.clone());
		self.cleaned.clear();
		self.errors.clear();
	}

	pub fn is_bound(&self) -> bool {
		self.data.is_some()
	}

	fn raw(&self, name: &str) -> Option<&str> {
		let key = self.add_prefix(name);
		self.data.as_ref().and_then(|data| data.get(&key))
	}

	fn clear_requested(&self, name: &str) -> bool {
		let key = format!("{}-clear", self.add_prefix(name));
		field::checkbox_value(self.data.as_ref().and_then(|data| data.get(&key)))
	}

	fn editable(&self) -> impl Iterator<Item = &FormField> {
		self.fields.iter().filter(|f| !f.readonly)
	}

	pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
		let key = if self.field(field).is_some() {
			field.to_string()
		} else {
			ALL_FIELDS_KEY.to_string()
		};
		self.cleaned.remove(&key);
		self.errors.entry(key).or_default().push(message.into());
	}

	/// Clean every editable field and run the form's synchronous rules
	///
	/// Rules that need the database (uniqueness within a contract) are run by
	/// [`crate::scope::validate`].
	pub fn is_valid(&mut self) -> bool {
		let Some(data) = self.data.clone() else {
			return false;
		};
		self.cleaned.clear();
		self.errors.clear();

		let mut results = Vec::new();
		for field in self.editable() {
			if field.descriptor.is_file() {
				let key = self.add_prefix(field.name());
				results.push((field.name(), self.clean_file(field, &data, &key)));
				continue;
			}
			let raw = self.raw(field.name());
			results.push((field.name(), field::clean(&field.descriptor, raw, field.choices.as_deref())));
		}
		for (name, result) in results {
			match result {
				Ok(value) => {
					self.cleaned.insert(name.to_string(), value);
				}
				Err(error) => self.add_error(name, error.to_string()),
			}
		}

		self.run_rules();
		self.errors.is_empty()
	}

	fn clean_file(&self, field: &FormField, data: &FormData, key: &str) -> Result<FieldValue, FieldError> {
		let initial = self.initial(field);
		if let Some(upload) = data.file(key)
			&& !upload.filename.is_empty()
		{
			return Ok(FieldValue::File(upload.filename.clone()));
		}
		if self.clear_requested(field.name()) {
			if field.descriptor.required {
				return Err(FieldError::Required);
			}
			return Ok(FieldValue::Null);
		}
		if field.descriptor.required && initial.is_empty() {
			return Err(FieldError::Required);
		}
		Ok(initial)
	}

	fn run_rules(&mut self) {
		let mut failures = Vec::new();
		for rule in &self.rules {
			match rule {
				FormRule::MaxChars { field, max, message } => {
					if let Some(value) = self.cleaned.get(*field).and_then(FieldValue::as_text)
						&& value.chars().count() > *max
					{
						failures.push((*field, message.to_string()));
					}
				}
				FormRule::Cyrillic { fields } => {
					for name in *fields {
						if let Some(value) = self.cleaned.get(*name).and_then(FieldValue::as_text)
							&& !value.is_empty()
							&& !CYRILLIC.is_match(value)
						{
							failures.push((*name, CYRILLIC_MESSAGE.to_string()));
						}
					}
				}
				FormRule::UniqueInContract { .. } | FormRule::FillFromRelated { .. } => {}
			}
		}
		for (field, message) in failures {
			self.add_error(field, message);
		}
	}

	pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
		&self.errors
	}

	pub fn has_errors(&self) -> bool {
		!self.errors.is_empty()
	}

	pub fn field_errors(&self, name: &str) -> &[String] {
		self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn non_field_errors(&self) -> &[String] {
		self.field_errors(ALL_FIELDS_KEY)
	}

	pub fn cleaned_data(&self) -> &BTreeMap<String, FieldValue> {
		&self.cleaned
	}

	pub fn cleaned(&self, name: &str) -> Option<&FieldValue> {
		self.cleaned.get(name)
	}

	/// Uploaded file for a file field, present when a new file was submitted
	pub fn upload(&self, name: &str) -> Option<&UploadedFile> {
		let key = self.add_prefix(name);
		self.data
			.as_ref()
			.and_then(|data| data.file(&key))
			.filter(|upload| !upload.filename.is_empty())
	}

	/// Names of the editable fields whose value differs from the initial one
	pub fn changed_data(&self) -> Vec<&'static str> {
		if self.data.is_none() {
			return Vec::new();
		}
		self.editable()
			.filter(|field| {
				let initial = self.initial(field);
				match self.cleaned.get(field.name()) {
					Some(value) if field.descriptor.is_file() => {
						self.upload(field.name()).is_some() || !field::same_value(value, &initial)
					}
					Some(value) => !field::same_value(value, &initial),
					None => {
						let raw = match field.descriptor.kind {
							FieldKind::Boolean => FieldValue::Bool(field::checkbox_value(self.raw(field.name()))),
							_ => FieldValue::Text(self.raw(field.name()).unwrap_or_default().trim().to_string()),
						};
						let initial = match field.descriptor.kind {
							FieldKind::Boolean => initial,
							_ => FieldValue::Text(initial.to_input()),
						};
						!field::same_value(&raw, &initial)
					}
				}
			})
			.map(FormField::name)
			.collect()
	}

	pub fn has_changed(&self) -> bool {
		!self.changed_data().is_empty()
	}

	/// Write the cleaned values into `record`
	///
	/// File fields are skipped; storing uploads is up to the caller.
	pub fn apply(&self, record: &mut Record) {
		for field in self.editable() {
			if field.descriptor.is_file() {
				continue;
			}
			if let Some(value) = self.cleaned.get(field.name()) {
				record.set(field.name(), value.clone());
			}
		}
	}

	/// Text of a value as it appears in messages and readonly fields
	pub fn display_value(&self, registry: &Registry, field: &FormField, value: &FieldValue) -> String {
		if value.is_empty() {
			return EMPTY_VALUE_DISPLAY.to_string();
		}
		match &field.descriptor.kind {
			FieldKind::Choice { .. } => value
				.as_ref_id()
				.and_then(|v| field.descriptor.choice_label(v))
				.map(str::to_string)
				.unwrap_or_else(|| value.to_string()),
			FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => {
				let id = value.as_ref_id();
				let offered = field
					.choices
					.as_ref()
					.and_then(|choices| choices.iter().find(|c| Some(c.value) == id))
					.map(|c| c.label.clone());
				let loaded = self
					.instance
					.related(field.name())
					.filter(|related| Some(related.id) == id)
					.map(|related| registry.display(related));
				offered.or(loaded).unwrap_or_else(|| value.to_string())
			}
			_ => value.to_string(),
		}
	}

	/// Human readable summary of the changes, one line per changed field
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::catalog::site;
	/// use desk_core::{FieldValue, FormData, Record};
	/// use desk_forms::ModelForm;
	///
	/// let catalog = site();
	/// let letter = catalog.registry.model("letter").unwrap();
	/// let instance = Record::new("letter", 7).with_value("number", FieldValue::Text("L-1".into()));
	/// let mut form = ModelForm::for_fields(letter, None, &["number", "content"], &[])
	///     .unwrap()
	///     .with_instance(instance);
	/// form.bind(&FormData::from_pairs([("number", "L-2"), ("content", "")]));
	/// assert!(form.is_valid());
	/// assert_eq!(form.change_message(&catalog.registry), "Number: was: L-1 now: L-2");
	/// ```
	pub fn change_message(&self, registry: &Registry) -> String {
		let mut lines = Vec::new();
		for name in self.changed_data() {
			let Some(field) = self.field(name) else {
				continue;
			};
			let new = self
				.cleaned
				.get(name)
				.map(|value| match value {
					FieldValue::File(_) => self
						.upload(name)
						.map(|u| u.filename.clone())
						.unwrap_or_else(|| value.to_string()),
					_ => self.display_value(registry, field, value),
				})
				.unwrap_or_else(|| EMPTY_VALUE_DISPLAY.to_string());
			let label = field.descriptor.label;
			if self.instance.is_saved() {
				let old = self.display_value(registry, field, &self.initial(field));
				lines.push(format!("{}: was: {} now: {}", label, old, new));
			} else {
				lines.push(format!("{}: added: {}", label, new));
			}
		}
		lines.join("\n")
	}

	/// Fields ready for rendering, in form order
	pub fn bound_fields(&self, registry: &Registry) -> Vec<BoundField> {
		self.fields
			.iter()
			.map(|field| self.bound_field(registry, field))
			.collect()
	}

	pub fn bound_field(&self, registry: &Registry, field: &FormField) -> BoundField {
		let initial = self.initial(field);
		let submitted = self.is_bound() && !field.readonly;
		let value = match (submitted, &field.descriptor.kind) {
			(true, FieldKind::File { .. }) => initial.to_input(),
			(true, _) => self.raw(field.name()).unwrap_or_default().to_string(),
			(false, _) => initial.to_input(),
		};
		let checked = match (submitted, &field.descriptor.kind) {
			(true, FieldKind::Boolean) => field::checkbox_value(self.raw(field.name())),
			(false, FieldKind::Boolean) => initial.as_bool(),
			_ => false,
		};

		let mut options: Vec<ChoiceOption> = match &field.descriptor.kind {
			FieldKind::Choice { choices } => choices
				.iter()
				.map(|(key, label)| ChoiceOption::new(*key, *label, &value))
				.collect(),
			_ => field
				.choices
				.iter()
				.flatten()
				.map(|choice| ChoiceOption::new(choice.value, &choice.label, &value))
				.collect(),
		};
		if matches!(field.widget, Widget::Select) {
			options.insert(0, ChoiceOption::blank(value.is_empty()));
		}

		BoundField {
			name: field.name().to_string(),
			html_name: self.add_prefix(field.name()),
			label: field.descriptor.label.to_string(),
			help_text: field.descriptor.help_text.to_string(),
			widget: field.widget,
			required: field.descriptor.required,
			readonly: field.readonly,
			value,
			checked,
			display: self.display_value(registry, field, &initial),
			errors: self.field_errors(field.name()).to_vec(),
			choices: options,
			file: match &initial {
				FieldValue::File(path) if !path.is_empty() => Some(path.clone()),
				_ => None,
			},
		}
	}

	pub fn verbose_name(&self) -> &'static str {
		self.verbose_name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::Catalog;
	use rstest::{fixture, rstest};

	#[fixture]
	fn catalog() -> Catalog {
		site()
	}

	fn contract_form(catalog: &Catalog, adding: bool) -> ModelForm {
		let model = catalog.registry.model("contract").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		ModelForm::new(model, &layout, adding).unwrap()
	}

	#[rstest]
	fn test_add_form_uses_add_fields(catalog: Catalog) {
		let form = contract_form(&catalog, true);
		assert_eq!(form.field_names(), vec!["number", "date", "eosdo", "num_ng", "igk"]);
		assert!(form.fields().iter().all(|f| !f.readonly));
	}

	#[rstest]
	fn test_change_form_marks_readonly(catalog: Catalog) {
		let form = contract_form(&catalog, false);
		assert!(form.field("summ_nds").unwrap().readonly);
		assert!(!form.field("number").unwrap().readonly);
	}

	#[rstest]
	fn test_number_length_rule(catalog: Catalog) {
		let mut form = contract_form(&catalog, true);
		form.bind(&FormData::from_pairs([("number", "12345678901")]));
		assert!(!form.is_valid());
		assert_eq!(form.field_errors("number"), ["Length exceeds 10 characters"]);
	}

	#[rstest]
	fn test_add_message_lists_filled_fields(catalog: Catalog) {
		let mut form = contract_form(&catalog, true);
		form.bind(&FormData::from_pairs([("number", "K-7"), ("date", "01.02.2024"), ("igk", "")]));
		assert!(form.is_valid());
		assert_eq!(form.changed_data(), vec!["number", "date"]);
		assert_eq!(
			form.change_message(&catalog.registry),
			"Contract number: added: K-7\nDate: added: 01.02.2024"
		);
	}

	#[rstest]
	fn test_unchanged_submission_has_no_changes(catalog: Catalog) {
		let model = catalog.registry.model("member").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		let instance = Record::new("member", 4)
			.with_value("employee", FieldValue::Ref(2))
			.with_value("otvetstvenny", FieldValue::Bool(true))
			.with_value("ispolnitel", FieldValue::Bool(false));
		let mut form = ModelForm::new(model, &layout, false).unwrap().with_instance(instance);
		form.bind(&FormData::from_pairs([("otvetstvenny", "on")]));

		assert!(form.is_valid());
		assert!(!form.has_changed());
		assert!(form.cleaned("employee").is_none());
	}

	#[rstest]
	fn test_cyrillic_names(catalog: Catalog) {
		let model = catalog.registry.model("employee").unwrap();
		let layout = catalog.layout("database", model).unwrap();
		let mut form = ModelForm::new(model, &layout, true).unwrap();
		form.bind(&FormData::from_pairs([
			("last_name", "Smith"),
			("first_name", "Анна-Мария"),
			("tabel", "5"),
		]));
		assert!(!form.is_valid());
		assert_eq!(form.field_errors("last_name"), [CYRILLIC_MESSAGE]);
		assert!(form.field_errors("first_name").is_empty());
	}

	#[rstest]
	fn test_default_shown_for_unsaved_instance(catalog: Catalog) {
		let form = contract_form(&catalog, false);
		let nds = form.field("nds").unwrap();
		assert_eq!(form.initial(nds), FieldValue::Int(20));

		let saved = contract_form(&catalog, false)
			.with_instance(Record::new("contract", 3).with_value("nds", FieldValue::Int(0)));
		let nds = saved.field("nds").unwrap();
		assert_eq!(saved.initial(nds), FieldValue::Int(0));
	}

	#[rstest]
	fn test_relation_display_prefers_loaded_row(catalog: Catalog) {
		let model = catalog.registry.model("letter").unwrap();
		let employee = Record::new("employee", 1)
			.with_value("last_name", FieldValue::Text("Петров".into()))
			.with_value("first_name", FieldValue::Text("Иван".into()))
			.with_value("middle_name", FieldValue::Text("Сергеевич".into()));
		let member = Record::new("member", 8).with_related("employee", employee);
		let instance = Record::new("letter", 2)
			.with_value("ispolnitel", FieldValue::Ref(8))
			.with_related("ispolnitel", member);
		let mut form = ModelForm::for_fields(model, None, &["ispolnitel"], &[])
			.unwrap()
			.with_instance(instance);
		form.set_choices("ispolnitel", vec![Choice::new(9, "Сидоров А.А.")]);
		form.bind(&FormData::from_pairs([("ispolnitel", "9")]));

		assert!(form.is_valid());
		assert_eq!(
			form.change_message(&catalog.registry),
			"Executor: was: Петров И.С. now: Сидоров А.А."
		);
	}

	#[rstest]
	fn test_prefixed_inputs(catalog: Catalog) {
		let model = catalog.registry.model("letter").unwrap();
		let mut form = ModelForm::for_fields(model, None, &["date"], &[])
			.unwrap()
			.with_prefix("table-0-form-1");
		form.bind(&FormData::from_pairs([("table-0-form-1-date", "not a date")]));
		assert!(!form.is_valid());
		assert_eq!(form.field_errors("date"), ["Enter a valid date."]);

		let bound = form.bound_field(&catalog.registry, form.field("date").unwrap());
		assert_eq!(bound.html_name, "table-0-form-1-date");
		assert_eq!(bound.value, "not a date");
	}
}
