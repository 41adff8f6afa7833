//! Table rendering helpers
//!
//! Turn a [`ChangeList`] into header and row structures the list templates
//! iterate over. Links are only produced where the user may follow them.

use crate::changelist::ChangeList;
use crate::urls;
use desk_core::registry::capitalize;
use desk_core::{
	Catalog, FieldDescriptor, FieldKind, ModelDescriptor, PermissionSet, Record, RequestContext,
	Slug,
};
use desk_forms::BoundField;
use desk_forms::form::EMPTY_VALUE_DISPLAY;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Models excluded from the contract's related lists
pub const HIDDEN_RELATIONS: &[&str] = &["timework"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
	pub name: String,
	pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Cell {
	pub text: String,
	pub url: Option<String>,
	pub title: Option<String>,
	pub add_url: Option<String>,
	pub add_title: Option<String>,
	/// Media address of a stored file
	pub file_url: Option<String>,
	/// Input of an editable column
	pub field: Option<BoundField>,
}

impl Cell {
	fn text(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			..Self::default()
		}
	}

	fn link(text: impl Into<String>, url: Option<String>) -> Self {
		Self {
			text: text.into(),
			url,
			..Self::default()
		}
	}
}

/// Hidden primary key input of a formset row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PkInput {
	pub name: String,
	pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
	pub id: i64,
	pub cells: Vec<Cell>,
	pub pk: Option<PkInput>,
}

fn or_empty(text: String) -> String {
	if text.trim().is_empty() {
		EMPTY_VALUE_DISPLAY.to_string()
	} else {
		text
	}
}

fn file_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

/// Text of `field` on `row`, with the media address of a stored file
fn field_cell(catalog: &Catalog, field: &FieldDescriptor, row: &Record) -> Cell {
	let value = row.get(field.name);
	if value.is_empty() {
		return Cell::text(EMPTY_VALUE_DISPLAY);
	}
	match &field.kind {
		FieldKind::Choice { .. } => Cell::text(
			value
				.as_ref_id()
				.and_then(|key| field.choice_label(key))
				.map(str::to_string)
				.unwrap_or_else(|| value.to_string()),
		),
		FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => Cell::text(or_empty(
			row.related(field.name)
				.map(|related| catalog.registry.display(related))
				.unwrap_or_else(|| value.to_string()),
		)),
		FieldKind::File { .. } => {
			let path = value.to_string();
			Cell {
				text: file_name(&path).to_string(),
				file_url: Some(urls::media_url(&path)),
				..Cell::default()
			}
		}
		_ => Cell::text(value.to_string()),
	}
}

/// Cell of a list column: a field, a computed value, `id` or `__str__`
///
/// # Examples
///
/// ```
/// use desk_admin::helpers::column_cell;
/// use desk_core::catalog::site;
/// use desk_core::{FieldValue, Record};
///
/// let catalog = site();
/// let letter = catalog.registry.model("letter").unwrap();
/// let row = Record::new("letter", 3)
///     .with_value("status", FieldValue::Int(2))
///     .with_value("file", FieldValue::File("document/act.pdf".into()));
///
/// assert_eq!(column_cell(&catalog, letter, &row, "status").text, "outgoing");
/// assert_eq!(column_cell(&catalog, letter, &row, "number").text, "-");
/// assert_eq!(column_cell(&catalog, letter, &row, "__str__").text, "no number");
/// let file = column_cell(&catalog, letter, &row, "file");
/// assert_eq!(file.text, "act.pdf");
/// assert_eq!(file.file_url.as_deref(), Some("/media/document/act.pdf"));
/// ```
pub fn column_cell(catalog: &Catalog, model: &ModelDescriptor, row: &Record, column: &str) -> Cell {
	if column == "__str__" {
		return Cell::text(catalog.registry.display(row));
	}
	if column == "id" {
		return Cell::text(row.id.to_string());
	}
	if let Some(computed) = model.computed_field(column) {
		return Cell::text(or_empty(catalog.registry.compute(row, computed).to_string()));
	}
	match model.field(column) {
		Some(field) => field_cell(catalog, field, row),
		None => Cell::text(EMPTY_VALUE_DISPLAY),
	}
}

pub fn result_headers(cl: &ChangeList<'_>) -> Vec<Header> {
	cl.fields
		.display
		.iter()
		.map(|name| Header {
			name: name.clone(),
			text: cl.model.label_for(name),
		})
		.collect()
}

/// Rows of a generic list; editable columns carry their formset inputs
pub fn result_rows(catalog: &Catalog, ctx: &RequestContext, cl: &ChangeList<'_>) -> Vec<ResultRow> {
	cl.rows
		.iter()
		.enumerate()
		.map(|(index, row)| {
			let form = cl
				.formset
				.as_ref()
				.and_then(|formset| formset.forms().get(index));
			let cells = cl
				.fields
				.display
				.iter()
				.map(|column| {
					let editable = form
						.filter(|_| cl.fields.editable.contains(column))
						.and_then(|form| form.field(column).map(|field| (form, field)));
					if let Some((form, field)) = editable {
						return Cell {
							field: Some(form.bound_field(&catalog.registry, field)),
							..Cell::default()
						};
					}
					let mut cell = column_cell(catalog, cl.model, row, column);
					if cl.fields.link.contains(column) {
						cell.url = cl.url_for_result(ctx, row);
						if cell.text == EMPTY_VALUE_DISPLAY {
							cell.text = catalog.registry.display(row);
						}
					}
					cell
				})
				.collect();
			ResultRow {
				id: row.id,
				cells,
				pk: form.map(|form| PkInput {
					name: form.add_prefix("id"),
					value: row.id,
				}),
			}
		})
		.collect()
}

/// Models whose rows hang off a contract and are listed from it
///
/// Grouped models are listed through their group instead.
pub fn contract_relations(catalog: &Catalog) -> Vec<&ModelDescriptor> {
	let mut models: Vec<&ModelDescriptor> = Vec::new();
	for dependent in catalog.registry.dependents("contract") {
		let name = dependent.model.model_name;
		if dependent.field.name != "contract"
			|| HIDDEN_RELATIONS.contains(&name)
			|| catalog.group_of(name).is_some()
			|| models.iter().any(|m| m.model_name == name)
		{
			continue;
		}
		models.push(dependent.model);
	}
	models
}

/// Label a related list is shown under
pub fn relation_label(model: &ModelDescriptor) -> String {
	capitalize(model.short_plural.unwrap_or(model.verbose_name_plural))
}

/// A column of the contract list
#[derive(Debug, Clone, Copy)]
pub enum ContractColumn<'a> {
	Field(&'a FieldDescriptor),
	/// The one-to-one sheet, linked to its change page
	Sheet(&'a ModelDescriptor),
	/// A related list, linked when rows exist
	Related(&'a ModelDescriptor),
}

impl<'a> ContractColumn<'a> {
	fn model(&self) -> Option<&'a ModelDescriptor> {
		match *self {
			ContractColumn::Field(_) => None,
			ContractColumn::Sheet(model) | ContractColumn::Related(model) => Some(model),
		}
	}

	fn label(&self) -> String {
		match self {
			ContractColumn::Field(field) => field.label.to_string(),
			ContractColumn::Sheet(model) => capitalize(model.verbose_name),
			ContractColumn::Related(model) => relation_label(model),
		}
	}
}

/// Resolve the stored column names; unknown names and related lists the
/// user may not view are dropped, `number` always comes first
pub fn contract_columns<'a>(
	catalog: &'a Catalog,
	ctx: &RequestContext,
	names: &[String],
) -> Vec<(String, ContractColumn<'a>)> {
	let Some(contract) = catalog.registry.get("contract") else {
		return Vec::new();
	};
	let relations = contract_relations(catalog);
	let mut ordered: Vec<&str> = vec!["number"];
	ordered.extend(names.iter().map(String::as_str).filter(|name| *name != "number"));

	let mut columns = Vec::new();
	for name in ordered {
		let column = match contract.field(name) {
			Some(field) => ContractColumn::Field(field),
			None => match relations.iter().find(|m| m.model_name == name) {
				Some(model) if model.one_to_one_field().is_some() => ContractColumn::Sheet(model),
				Some(model) => ContractColumn::Related(model),
				None => continue,
			},
		};
		if let Some(model) = column.model()
			&& !PermissionSet::for_model(&ctx.user, model).view
		{
			continue;
		}
		columns.push((name.to_string(), column));
	}
	columns
}

pub fn contract_headers(columns: &[(String, ContractColumn<'_>)]) -> Vec<Header> {
	columns
		.iter()
		.map(|(name, column)| Header {
			name: name.clone(),
			text: column.label(),
		})
		.collect()
}

/// Contract ids having rows, per related model name
pub type RelatedPresence = HashMap<String, HashSet<i64>>;

/// Rows of the contract list
pub fn contract_rows(
	catalog: &Catalog,
	ctx: &RequestContext,
	columns: &[(String, ContractColumn<'_>)],
	rows: &[Record],
	present: &RelatedPresence,
) -> Vec<ResultRow> {
	rows.iter()
		.map(|row| {
			let number = catalog.registry.display(row);
			let cells = columns
				.iter()
				.enumerate()
				.map(|(position, (name, column))| match column {
					_ if position == 0 => Cell::link(
						number.clone(),
						urls::change_url(&ctx.app, &Slug::new("contract").with_obj_id(row.id)),
					),
					ContractColumn::Field(field) => field_cell(catalog, field, row),
					ContractColumn::Sheet(model) => Cell::link(
						capitalize(model.verbose_name),
						urls::change_url(
							&ctx.app,
							&Slug::new(model.model_name)
								.with_obj_id(row.id)
								.with_related_id(row.id),
						),
					),
					ContractColumn::Related(model) => {
						let slug = Slug::new(model.model_name).with_related_id(row.id);
						let has_rows = present.get(name).is_some_and(|ids| ids.contains(&row.id));
						let may_add =
							!ctx.is_read_only() && PermissionSet::for_model(&ctx.user, model).add;
						Cell {
							text: relation_label(model),
							url: has_rows.then(|| urls::list_url(&ctx.app, &slug)).flatten(),
							add_url: may_add.then(|| urls::add_url(&ctx.app, &slug)).flatten(),
							add_title: may_add.then(|| {
								format!("Add {} to contract {}", model.verbose_name, number)
							}),
							..Cell::default()
						}
					}
				})
				.collect();
			ResultRow {
				id: row.id,
				cells,
				pk: None,
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{AuthUser, FieldValue, PageAction};
	use rstest::rstest;

	fn context(user: AuthUser, app: &str) -> RequestContext {
		RequestContext::new(user, app, Slug::new("contract"), PageAction::List)
	}

	#[rstest]
	fn test_contract_relations_skip_groups_and_time() {
		let catalog = site();
		let names: Vec<&str> = contract_relations(&catalog)
			.iter()
			.map(|m| m.model_name)
			.collect();
		assert!(names.contains(&"letter"));
		assert!(names.contains(&"calculation"));
		assert!(!names.contains(&"timework"));
		assert!(!names.contains(&"stagebeginlist"));
	}

	#[rstest]
	fn test_columns_start_with_number_and_drop_unknown() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "contract");
		let names = vec!["title".to_string(), "gone".to_string(), "number".to_string()];
		let columns = contract_columns(&catalog, &ctx, &names);
		let resolved: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
		assert_eq!(resolved, vec!["number", "title"]);
	}

	#[rstest]
	fn test_related_column_needs_view() {
		let catalog = site();
		let user = AuthUser::new(2, "boris").with_perm("contract.view_contract");
		let ctx = context(user, "contract");
		let columns = contract_columns(&catalog, &ctx, &["letter".to_string()]);
		assert_eq!(columns.len(), 1);
	}

	#[rstest]
	fn test_related_cell_links_only_when_rows_exist() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "contract");
		let columns = contract_columns(&catalog, &ctx, &["letter".to_string()]);
		let rows = vec![
			Record::new("contract", 1).with_value("number", FieldValue::Text("K-1".into())),
			Record::new("contract", 2).with_value("number", FieldValue::Text("K-2".into())),
		];
		let present = RelatedPresence::from([("letter".to_string(), HashSet::from([2]))]);
		let rendered = contract_rows(&catalog, &ctx, &columns, &rows, &present);

		assert_eq!(rendered[0].cells[0].url.as_deref(), Some("/contract/contract-1-0/change/"));
		assert_eq!(rendered[0].cells[1].url, None);
		assert_eq!(rendered[1].cells[1].url.as_deref(), Some("/contract/letter-0-2/"));
		assert_eq!(
			rendered[1].cells[1].add_title.as_deref(),
			Some("Add letter to contract K-2")
		);
	}

	#[rstest]
	fn test_archive_offers_no_add_links() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "archive");
		let columns = contract_columns(&catalog, &ctx, &["calculation".to_string(), "letter".to_string()]);
		let rows = vec![Record::new("contract", 4)];
		let rendered = contract_rows(&catalog, &ctx, &columns, &rows, &RelatedPresence::new());
		assert_eq!(
			rendered[0].cells[1].url.as_deref(),
			Some("/archive/contract/calculation-4-4/view/")
		);
		assert_eq!(rendered[0].cells[2].add_url, None);
	}
}
