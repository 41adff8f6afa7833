//! Static model descriptors
//!
//! Every model the desk manages is described once: its fields, how an
//! instance is shown, which custom permissions it carries. Views, forms, the
//! schema builder and the deletion collector all read these descriptors
//! instead of reflecting over rows.

use crate::error::{DeskError, DeskResult};
use crate::record::Record;
use crate::value::FieldValue;
use std::collections::HashMap;

pub const NAME_EMPTY: &str = "no name";
pub const NUMBER_EMPTY: &str = "no number";

/// What happens to a referencing row when its target is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
	Cascade,
	Protect,
	SetNull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
	Char { max_length: usize },
	Text { max_length: Option<usize> },
	Integer { min: Option<i64>, max: Option<i64> },
	Decimal {
		max_digits: u32,
		decimal_places: u32,
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	Date,
	Choice { choices: &'static [(i64, &'static str)] },
	ForeignKey { to: &'static str, on_delete: OnDelete },
	OneToOne { to: &'static str, on_delete: OnDelete },
	File { upload_to: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
	pub name: &'static str,
	pub label: &'static str,
	pub kind: FieldKind,
	pub required: bool,
	pub unique: bool,
	pub default: FieldValue,
	pub help_text: &'static str,
}

impl FieldDescriptor {
	fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
		Self {
			name,
			label,
			kind,
			required: false,
			unique: false,
			default: FieldValue::Null,
			help_text: "",
		}
	}

	pub fn char(name: &'static str, label: &'static str, max_length: usize) -> Self {
		Self::new(name, label, FieldKind::Char { max_length })
	}

	pub fn text(name: &'static str, label: &'static str) -> Self {
		Self::new(name, label, FieldKind::Text { max_length: None })
	}

	pub fn integer(name: &'static str, label: &'static str) -> Self {
		Self::new(name, label, FieldKind::Integer { min: None, max: None })
	}

	pub fn decimal(
		name: &'static str,
		label: &'static str,
		max_digits: u32,
		decimal_places: u32,
	) -> Self {
		Self::new(
			name,
			label,
			FieldKind::Decimal {
				max_digits,
				decimal_places,
				min: None,
				max: None,
			},
		)
	}

	pub fn boolean(name: &'static str, label: &'static str) -> Self {
		Self::new(name, label, FieldKind::Boolean).with_default(FieldValue::Bool(false))
	}

	pub fn date(name: &'static str, label: &'static str) -> Self {
		Self::new(name, label, FieldKind::Date)
	}

	pub fn choice(
		name: &'static str,
		label: &'static str,
		choices: &'static [(i64, &'static str)],
	) -> Self {
		Self::new(name, label, FieldKind::Choice { choices })
	}

	pub fn foreign_key(
		name: &'static str,
		label: &'static str,
		to: &'static str,
		on_delete: OnDelete,
	) -> Self {
		Self::new(name, label, FieldKind::ForeignKey { to, on_delete })
	}

	pub fn one_to_one(
		name: &'static str,
		label: &'static str,
		to: &'static str,
		on_delete: OnDelete,
	) -> Self {
		Self::new(name, label, FieldKind::OneToOne { to, on_delete })
	}

	pub fn file(name: &'static str, label: &'static str, upload_to: &'static str) -> Self {
		Self::new(name, label, FieldKind::File { upload_to })
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	pub fn with_default(mut self, default: FieldValue) -> Self {
		self.default = default;
		self
	}

	pub fn with_help_text(mut self, help_text: &'static str) -> Self {
		self.help_text = help_text;
		self
	}

	/// Bound the accepted numeric range (integer and decimal fields)
	pub fn with_range(mut self, lower: Option<i64>, upper: Option<i64>) -> Self {
		match &mut self.kind {
			FieldKind::Integer { min, max } | FieldKind::Decimal { min, max, .. } => {
				*min = lower;
				*max = upper;
			}
			_ => {}
		}
		self
	}

	pub fn with_max_length(mut self, limit: usize) -> Self {
		match &mut self.kind {
			FieldKind::Char { max_length } => *max_length = limit,
			FieldKind::Text { max_length } => *max_length = Some(limit),
			_ => {}
		}
		self
	}

	/// Database column backing the field
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::registry::{FieldDescriptor, OnDelete};
	///
	/// let field = FieldDescriptor::foreign_key("client", "Client", "client", OnDelete::Protect);
	/// assert_eq!(field.column(), "client_id");
	/// assert_eq!(FieldDescriptor::date("date", "Date").column(), "date");
	/// ```
	pub fn column(&self) -> String {
		if self.is_relation() {
			format!("{}_id", self.name)
		} else {
			self.name.to_string()
		}
	}

	pub fn is_relation(&self) -> bool {
		matches!(
			self.kind,
			FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. }
		)
	}

	pub fn related_model(&self) -> Option<&'static str> {
		match self.kind {
			FieldKind::ForeignKey { to, .. } | FieldKind::OneToOne { to, .. } => Some(to),
			_ => None,
		}
	}

	pub fn on_delete(&self) -> Option<OnDelete> {
		match self.kind {
			FieldKind::ForeignKey { on_delete, .. } | FieldKind::OneToOne { on_delete, .. } => {
				Some(on_delete)
			}
			_ => None,
		}
	}

	pub fn is_file(&self) -> bool {
		matches!(self.kind, FieldKind::File { .. })
	}

	pub fn choice_label(&self, value: i64) -> Option<&'static str> {
		match self.kind {
			FieldKind::Choice { choices } => choices
				.iter()
				.find(|(key, _)| *key == value)
				.map(|(_, label)| *label),
			_ => None,
		}
	}
}

/// Value derived from other columns, usable as a list column
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
	/// `last first middle`, trimmed
	FullName,
	/// A column of a related row, e.g. the post abbreviation of an employee
	RelatedField {
		relation: &'static str,
		field: &'static str,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedField {
	pub name: &'static str,
	pub label: &'static str,
	pub compute: Computed,
}

/// How an instance is rendered as text
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayRule {
	/// The `name` column (or the related row when `name` is a relation)
	NameOrEmpty,
	/// The `number` column
	NumberOrEmpty,
	/// `Lastname F.M.`
	ShortName,
	/// `last first middle`
	FullName,
	/// Text of a related row
	Related(&'static str),
	/// Fixed prefix followed by the text of a related row
	Prefixed {
		prefix: &'static str,
		relation: &'static str,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
	pub app_label: &'static str,
	pub model_name: &'static str,
	pub verbose_name: &'static str,
	pub verbose_name_plural: &'static str,
	/// Shorter plural used in cramped list cells
	pub short_plural: Option<&'static str>,
	pub fields: Vec<FieldDescriptor>,
	pub computed: Vec<ComputedField>,
	pub display: DisplayRule,
	/// Extra `(codename, label)` permissions beyond add/change/delete/view
	pub permissions: Vec<(&'static str, &'static str)>,
	pub ordering: Vec<&'static str>,
}

impl ModelDescriptor {
	pub fn new(
		app_label: &'static str,
		model_name: &'static str,
		verbose_name: &'static str,
		verbose_name_plural: &'static str,
	) -> Self {
		Self {
			app_label,
			model_name,
			verbose_name,
			verbose_name_plural,
			short_plural: None,
			fields: Vec::new(),
			computed: Vec::new(),
			display: DisplayRule::NameOrEmpty,
			permissions: Vec::new(),
			ordering: Vec::new(),
		}
	}

	pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
		self.fields = fields;
		self
	}

	pub fn with_computed(mut self, name: &'static str, label: &'static str, compute: Computed) -> Self {
		self.computed.push(ComputedField {
			name,
			label,
			compute,
		});
		self
	}

	pub fn with_display(mut self, display: DisplayRule) -> Self {
		self.display = display;
		self
	}

	pub fn with_permission(mut self, codename: &'static str, label: &'static str) -> Self {
		self.permissions.push((codename, label));
		self
	}

	pub fn with_short_plural(mut self, short_plural: &'static str) -> Self {
		self.short_plural = Some(short_plural);
		self
	}

	pub fn with_ordering(mut self, ordering: Vec<&'static str>) -> Self {
		self.ordering = ordering;
		self
	}

	/// Backing table, `{app_label}_{model_name}`
	pub fn table(&self) -> String {
		format!("{}_{}", self.app_label, self.model_name)
	}

	pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn computed_field(&self, name: &str) -> Option<&ComputedField> {
		self.computed.iter().find(|f| f.name == name)
	}

	/// Whether `name` can be shown as a list column
	pub fn has_column(&self, name: &str) -> bool {
		name == "id" || name == "__str__" || self.field(name).is_some() || self.computed_field(name).is_some()
	}

	/// Column header for a field, computed value or `__str__`
	pub fn label_for(&self, name: &str) -> String {
		if name == "__str__" {
			return capitalize(self.verbose_name);
		}
		if name == "id" {
			return "ID".to_string();
		}
		self.field(name)
			.map(|f| f.label)
			.or_else(|| self.computed_field(name).map(|c| c.label))
			.unwrap_or(name)
			.to_string()
	}

	/// The first one-to-one link to another model, if any
	pub fn one_to_one_field(&self) -> Option<&FieldDescriptor> {
		self.fields
			.iter()
			.find(|f| matches!(f.kind, FieldKind::OneToOne { .. }))
	}

	pub fn file_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
		self.fields.iter().filter(|f| f.is_file())
	}

	/// Full permission string for one of the model's codenames
	pub fn perm(&self, action: &str) -> String {
		format!("{}.{}_{}", self.app_label, action, self.model_name)
	}
}

/// Capitalize the first character, leaving the rest untouched
pub fn capitalize(text: &str) -> String {
	let mut chars = text.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// A model that points at another one
#[derive(Debug, Clone, Copy)]
pub struct Dependent<'a> {
	pub model: &'a ModelDescriptor,
	pub field: &'a FieldDescriptor,
}

#[derive(Debug, Default)]
pub struct Registry {
	models: Vec<ModelDescriptor>,
	index: HashMap<&'static str, usize>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, model: ModelDescriptor) {
		match self.index.get(model.model_name) {
			Some(&position) => self.models[position] = model,
			None => {
				self.index.insert(model.model_name, self.models.len());
				self.models.push(model);
			}
		}
	}

	pub fn with_model(mut self, model: ModelDescriptor) -> Self {
		self.register(model);
		self
	}

	pub fn get(&self, model_name: &str) -> Option<&ModelDescriptor> {
		self.index.get(model_name).map(|&i| &self.models[i])
	}

	/// Look up a model, failing with a 404 style error
	pub fn model(&self, model_name: &str) -> DeskResult<&ModelDescriptor> {
		self.get(model_name)
			.ok_or_else(|| DeskError::NotFound(format!("Unknown model '{}'", model_name)))
	}

	pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
		self.models.iter()
	}

	pub fn app_models<'a>(&'a self, app_label: &'a str) -> impl Iterator<Item = &'a ModelDescriptor> + 'a {
		self.models.iter().filter(move |m| m.app_label == app_label)
	}

	/// Every relation field in the registry that targets `model_name`
	pub fn dependents(&self, model_name: &str) -> Vec<Dependent<'_>> {
		self.models
			.iter()
			.flat_map(|model| {
				model
					.fields
					.iter()
					.filter(move |f| f.related_model() == Some(model_name))
					.map(move |field| Dependent { model, field })
			})
			.collect()
	}

	/// Text representation of a record according to its model's display rule
	///
	/// Relations named by the rule must be loaded into `record.related`,
	/// otherwise the empty placeholder is used.
	pub fn display(&self, record: &Record) -> String {
		let Some(model) = self.get(&record.model) else {
			return record.id.to_string();
		};

		match &model.display {
			DisplayRule::NameOrEmpty => {
				let text = match model.field("name") {
					Some(field) if field.is_relation() => record
						.related("name")
						.map(|related| self.display(related))
						.unwrap_or_default(),
					_ => record.get("name").to_string(),
				};
				if text.is_empty() {
					NAME_EMPTY.to_string()
				} else {
					text
				}
			}
			DisplayRule::NumberOrEmpty => {
				let text = record.get("number").to_string();
				if text.is_empty() {
					NUMBER_EMPTY.to_string()
				} else {
					text
				}
			}
			DisplayRule::ShortName => short_name(record),
			DisplayRule::FullName => {
				let text = full_name(record);
				if text.is_empty() {
					NAME_EMPTY.to_string()
				} else {
					text
				}
			}
			DisplayRule::Related(relation) => record
				.related(relation)
				.map(|related| self.display(related))
				.unwrap_or_else(|| NAME_EMPTY.to_string()),
			DisplayRule::Prefixed { prefix, relation } => {
				let related = record
					.related(relation)
					.map(|related| self.display(related))
					.unwrap_or_default();
				format!("{}{}", prefix, related)
			}
		}
	}

	/// Relation paths that must be loaded to render `model_name` as text
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::catalog::site;
	///
	/// let catalog = site();
	/// assert_eq!(catalog.registry.display_paths("timework"), vec!["contract"]);
	/// assert_eq!(catalog.registry.display_paths("member"), vec!["employee"]);
	/// assert!(catalog.registry.display_paths("employee").is_empty());
	/// ```
	pub fn display_paths(&self, model_name: &str) -> Vec<String> {
		let Some(model) = self.get(model_name) else {
			return Vec::new();
		};
		let relation = match &model.display {
			DisplayRule::NameOrEmpty => model.field("name").filter(|f| f.is_relation()),
			DisplayRule::Related(relation) | DisplayRule::Prefixed { relation, .. } => {
				model.field(relation)
			}
			_ => None,
		};
		let Some(field) = relation else {
			return Vec::new();
		};
		let mut paths = vec![field.name.to_string()];
		if let Some(target) = field.related_model()
			&& target != model_name
		{
			paths.extend(
				self.display_paths(target)
					.into_iter()
					.map(|nested| format!("{}__{}", field.name, nested)),
			);
		}
		paths
	}

	/// Relation paths needed by the display rule and computed columns
	pub fn row_paths(&self, model_name: &str) -> Vec<String> {
		let mut paths = self.display_paths(model_name);
		if let Some(model) = self.get(model_name) {
			for computed in &model.computed {
				if let Computed::RelatedField { relation, .. } = computed.compute
					&& !paths.iter().any(|p| p == relation)
				{
					paths.push(relation.to_string());
				}
			}
		}
		paths
	}

	/// Evaluate a computed column for a record
	pub fn compute(&self, record: &Record, computed: &ComputedField) -> FieldValue {
		match &computed.compute {
			Computed::FullName => FieldValue::Text(full_name(record)),
			Computed::RelatedField { relation, field } => record
				.related(relation)
				.map(|related| related.get(field).clone())
				.unwrap_or(FieldValue::Null),
		}
	}
}

fn full_name(record: &Record) -> String {
	format!(
		"{} {} {}",
		record.get("last_name"),
		record.get("first_name"),
		record.get("middle_name")
	)
	.trim()
	.to_string()
}

fn short_name(record: &Record) -> String {
	let last = capitalize(&record.get("last_name").to_string().to_lowercase());
	let first = record.get("first_name").to_string();
	let middle = record.get("middle_name").to_string();
	match (first.chars().next(), middle.chars().next()) {
		(Some(f), Some(m)) => format!(
			"{} {}.{}.",
			last,
			f.to_uppercase(),
			m.to_uppercase()
		),
		_ => last,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn registry() -> Registry {
		Registry::new()
			.with_model(
				ModelDescriptor::new("database", "employee", "employee", "employees")
					.with_fields(vec![
						FieldDescriptor::char("last_name", "Last name", 150),
						FieldDescriptor::char("first_name", "First name", 150),
						FieldDescriptor::char("middle_name", "Middle name", 150),
					])
					.with_display(DisplayRule::ShortName),
			)
			.with_model(
				ModelDescriptor::new("contract", "contract", "contract", "contracts")
					.with_fields(vec![FieldDescriptor::char("number", "Number", 255)])
					.with_display(DisplayRule::NumberOrEmpty),
			)
			.with_model(
				ModelDescriptor::new("contract", "member", "member", "members")
					.with_fields(vec![
						FieldDescriptor::foreign_key("contract", "Contract", "contract", OnDelete::Cascade),
						FieldDescriptor::foreign_key("employee", "Employee", "employee", OnDelete::Protect),
					])
					.with_display(DisplayRule::Related("employee")),
			)
	}

	fn employee(last: &str, first: &str, middle: &str) -> Record {
		Record::new("employee", 1)
			.with_value("last_name", FieldValue::Text(last.into()))
			.with_value("first_name", FieldValue::Text(first.into()))
			.with_value("middle_name", FieldValue::Text(middle.into()))
	}

	#[rstest]
	#[case("IVANOV", "petr", "sergeevich", "Ivanov P.S.")]
	#[case("ivanov", "", "sergeevich", "Ivanov")]
	fn test_short_name(
		registry: Registry,
		#[case] last: &str,
		#[case] first: &str,
		#[case] middle: &str,
		#[case] expected: &str,
	) {
		assert_eq!(registry.display(&employee(last, first, middle)), expected);
	}

	#[rstest]
	fn test_number_or_empty(registry: Registry) {
		let contract = Record::new("contract", 3);
		assert_eq!(registry.display(&contract), NUMBER_EMPTY);
		let contract = contract.with_value("number", FieldValue::Text("K-12".into()));
		assert_eq!(registry.display(&contract), "K-12");
	}

	#[rstest]
	fn test_related_display_uses_loaded_row(registry: Registry) {
		let member = Record::new("member", 5)
			.with_value("employee", FieldValue::Ref(1))
			.with_related("employee", employee("petrov", "ivan", "ilich"));
		assert_eq!(registry.display(&member), "Petrov I.I.");
	}

	#[rstest]
	fn test_dependents(registry: Registry) {
		let dependents = registry.dependents("contract");
		assert_eq!(dependents.len(), 1);
		assert_eq!(dependents[0].model.model_name, "member");
		assert_eq!(dependents[0].field.on_delete(), Some(OnDelete::Cascade));
	}

	#[rstest]
	fn test_unknown_model_is_not_found(registry: Registry) {
		assert!(matches!(registry.model("nope"), Err(DeskError::NotFound(_))));
	}

	#[rstest]
	fn test_label_for(registry: Registry) {
		let model = registry.model("employee").unwrap();
		assert_eq!(model.label_for("__str__"), "Employee");
		assert_eq!(model.label_for("last_name"), "Last name");
		assert_eq!(model.table(), "database_employee");
		assert_eq!(model.perm("view"), "database.view_employee");
	}
}
