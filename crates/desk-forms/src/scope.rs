//! Database-backed parts of model forms
//!
//! Offered choices of relation fields depend on the contract a form works
//! in, uniqueness needs a lookup, and some readonly fields are copied from
//! the selected related row on save. All of it runs on the caller's
//! connection so it can share a transaction with the save.

use crate::field::Choice;
use crate::form::{FormField, ModelForm};
use desk_core::layout::{ChoiceScope, FormRule};
use desk_core::registry::capitalize;
use desk_core::{DeskResult, FieldValue, Record, Registry};
use desk_db::{Filter, QuerySet, SqliteConnection};

fn visible() -> Filter {
	Filter::eq("view", FieldValue::Bool(true))
}

fn to_choices(registry: &Registry, rows: &[Record]) -> Vec<Choice> {
	rows.iter()
		.map(|row| Choice::new(row.id, registry.display(row)))
		.collect()
}

/// Choices a relation field offers in a form working on `contract_id`
///
/// `current` is the value the field holds now; hidden dictionary rows stay
/// selectable for the row that already points at them.
pub async fn choices_for(
	conn: &mut SqliteConnection,
	registry: &Registry,
	field: &FormField,
	current: Option<i64>,
	contract_id: i64,
) -> DeskResult<Vec<Choice>> {
	let Some(target) = field.descriptor.related_model() else {
		return Ok(Vec::new());
	};
	let target = registry.model(target)?;
	let rows = QuerySet::new(registry, target);

	let rows = match &field.scope {
		ChoiceScope::All if target.field("view").is_some() => {
			let mut rows = rows.filter(visible()).fetch(conn).await?;
			if let Some(id) = current
				&& !rows.iter().any(|row| row.id == id)
				&& let Some(row) = QuerySet::new(registry, target)
					.filter(Filter::eq("id", FieldValue::Int(id)))
					.first(conn)
					.await?
			{
				rows.push(row);
			}
			rows
		}
		ChoiceScope::All => rows.fetch(conn).await?,
		ChoiceScope::Visible => rows.filter(visible()).fetch(conn).await?,
		ChoiceScope::ContractMembers { flag } => {
			let mut rows = rows.filter(Filter::eq("contract", FieldValue::Ref(contract_id)));
			if let Some(flag) = flag {
				rows = rows.filter(Filter::eq(*flag, FieldValue::Bool(true)));
			}
			rows.fetch(conn).await?
		}
		ChoiceScope::EmployeesOutsideContract => {
			let member = registry.model("member")?;
			let taken: Vec<i64> = QuerySet::new(registry, member)
				.filter(Filter::eq("contract", FieldValue::Ref(contract_id)))
				.fetch(conn)
				.await?
				.iter()
				.filter_map(|m| m.ref_id("employee"))
				.collect();
			rows.filter(visible())
				.filter(Filter::is_in("id", taken).not())
				.fetch(conn)
				.await?
		}
	};
	Ok(to_choices(registry, &rows))
}

/// Load the offered choices of every editable relation field of `form`
pub async fn load_choices(
	conn: &mut SqliteConnection,
	registry: &Registry,
	form: &mut ModelForm,
	contract_id: i64,
) -> DeskResult<()> {
	let fields: Vec<FormField> = form
		.fields()
		.iter()
		.filter(|f| !f.readonly && f.descriptor.is_relation())
		.cloned()
		.collect();
	for field in fields {
		let current = form.initial(&field).as_ref_id();
		let choices = choices_for(conn, registry, &field, current, contract_id).await?;
		form.set_choices(field.name(), choices);
	}
	Ok(())
}

/// Run the uniqueness checks that need the database
///
/// Call after [`ModelForm::is_valid`]; returns whether the form is still
/// valid.
pub async fn validate(
	conn: &mut SqliteConnection,
	registry: &Registry,
	form: &mut ModelForm,
	contract_id: i64,
) -> DeskResult<bool> {
	let model = registry.model(form.model())?;
	let instance_id = form.instance().id;
	let mut failures: Vec<(&'static str, String)> = Vec::new();

	if !form.instance().is_saved() {
		for rule in form.rules() {
			let FormRule::UniqueInContract { field, message } = rule else {
				continue;
			};
			let Some(value) = form.cleaned(field).filter(|v| !v.is_empty()) else {
				continue;
			};
			let taken = QuerySet::new(registry, model)
				.filter(Filter::eq("contract", FieldValue::Ref(contract_id)))
				.filter(Filter::eq(*field, value.clone()))
				.exists(conn)
				.await?;
			if taken {
				failures.push((*field, message.to_string()));
			}
		}
	}

	let unique = form
		.fields()
		.iter()
		.filter(|f| !f.readonly && model.field(f.name()).is_some_and(|d| d.unique));
	for field in unique {
		let Some(value) = form.cleaned(field.name()).filter(|v| !v.is_empty()) else {
			continue;
		};
		let taken = QuerySet::new(registry, model)
			.filter(Filter::eq(field.name(), value.clone()))
			.filter(Filter::eq("id", FieldValue::Int(instance_id)).not())
			.exists(conn)
			.await?;
		if taken {
			failures.push((
				field.name(),
				format!(
					"{} with this {} already exists.",
					capitalize(model.verbose_name),
					field.descriptor.label
				),
			));
		}
	}

	for (field, message) in failures {
		form.add_error(field, message);
	}
	Ok(!form.has_errors())
}

/// Copy columns of the selected related rows into `record`
///
/// A relation source column copies the text of its row; clearing the
/// relation clears the copies.
pub async fn fill_from_related(
	conn: &mut SqliteConnection,
	registry: &Registry,
	form: &ModelForm,
	record: &mut Record,
) -> DeskResult<()> {
	let model = registry.model(form.model())?;
	for rule in form.rules() {
		let FormRule::FillFromRelated { relation, pairs } = rule else {
			continue;
		};
		let Some(target) = model.field(relation).and_then(|f| f.related_model()) else {
			continue;
		};
		let target = registry.model(target)?;
		let source = match record.ref_id(relation) {
			Some(id) => {
				let paths: Vec<&str> = pairs
					.iter()
					.map(|(_, source)| *source)
					.filter(|source| target.field(source).is_some_and(|f| f.is_relation()))
					.collect();
				QuerySet::new(registry, target)
					.select_related(&paths)
					.filter(Filter::eq("id", FieldValue::Int(id)))
					.first(conn)
					.await?
			}
			None => None,
		};

		for (dest, field) in pairs.iter() {
			let text = match &source {
				Some(row) if target.field(field).is_some_and(|f| f.is_relation()) => row
					.related(field)
					.map(|related| registry.display(related))
					.unwrap_or_default(),
				Some(row) => row.get(field).to_string(),
				None => String::new(),
			};
			record.set(*dest, FieldValue::Text(text));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{Catalog, FormData};
	use desk_db::{Database, repo};

	async fn setup() -> (Catalog, Database) {
		let catalog = site();
		let db = Database::memory().await.unwrap();
		db.migrate(&catalog.registry).await.unwrap();
		(catalog, db)
	}

	async fn insert(conn: &mut SqliteConnection, catalog: &Catalog, record: Record) -> i64 {
		let model = catalog.registry.model(&record.model).unwrap();
		repo::insert(conn, model, &record).await.unwrap()
	}

	fn text(value: &str) -> FieldValue {
		FieldValue::Text(value.to_string())
	}

	async fn employee(conn: &mut SqliteConnection, catalog: &Catalog, last: &str, view: bool) -> i64 {
		let record = Record::new("employee", 0)
			.with_value("last_name", text(last))
			.with_value("first_name", text("Иван"))
			.with_value("middle_name", text("Петрович"))
			.with_value("view", FieldValue::Bool(view));
		insert(conn, catalog, record).await
	}

	#[tokio::test]
	async fn test_member_add_offers_visible_employees_outside_contract() {
		let (catalog, db) = setup().await;
		let mut conn = db.acquire().await.unwrap();
		let contract = insert(&mut conn, &catalog, Record::new("contract", 0)).await;
		let taken = employee(&mut conn, &catalog, "Иванов", true).await;
		let free = employee(&mut conn, &catalog, "Петров", true).await;
		employee(&mut conn, &catalog, "Сидоров", false).await;
		insert(
			&mut conn,
			&catalog,
			Record::new("member", 0)
				.with_value("contract", FieldValue::Ref(contract))
				.with_value("employee", FieldValue::Ref(taken)),
		)
		.await;

		let model = catalog.registry.model("member").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		let mut form = ModelForm::new(model, &layout, true).unwrap();
		load_choices(&mut conn, &catalog.registry, &mut form, contract).await.unwrap();

		let offered = form.field("employee").unwrap().choices.clone().unwrap();
		assert_eq!(offered, vec![Choice::new(free, "Петров И.П.")]);
	}

	#[tokio::test]
	async fn test_same_employee_rejected_on_one_contract() {
		let (catalog, db) = setup().await;
		let mut conn = db.acquire().await.unwrap();
		let contract = insert(&mut conn, &catalog, Record::new("contract", 0)).await;
		let person = employee(&mut conn, &catalog, "Иванов", true).await;
		insert(
			&mut conn,
			&catalog,
			Record::new("member", 0)
				.with_value("contract", FieldValue::Ref(contract))
				.with_value("employee", FieldValue::Ref(person)),
		)
		.await;

		let model = catalog.registry.model("member").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		let mut form = ModelForm::new(model, &layout, true).unwrap();
		form.set_choices("employee", vec![Choice::new(person, "Иванов И.П.")]);
		form.bind(&FormData::from_pairs([("employee", person.to_string())]));

		assert!(form.is_valid());
		assert!(!validate(&mut conn, &catalog.registry, &mut form, contract).await.unwrap());
		assert_eq!(
			form.field_errors("employee"),
			["This employee has already been added to the list."]
		);
	}

	#[tokio::test]
	async fn test_unique_field_names_the_model() {
		let (catalog, db) = setup().await;
		let mut conn = db.acquire().await.unwrap();
		insert(&mut conn, &catalog, Record::new("division", 0).with_value("name", text("Отдел 1"))).await;

		let model = catalog.registry.model("division").unwrap();
		let layout = catalog.layout("database", model).unwrap();
		let mut form = ModelForm::new(model, &layout, true).unwrap();
		form.bind(&FormData::from_pairs([("name", "Отдел 1"), ("view", "on")]));

		assert!(form.is_valid());
		assert!(!validate(&mut conn, &catalog.registry, &mut form, 0).await.unwrap());
		assert_eq!(form.field_errors("name"), ["Division with this Division already exists."]);
	}

	#[tokio::test]
	async fn test_hidden_current_value_stays_offered() {
		let (catalog, db) = setup().await;
		let mut conn = db.acquire().await.unwrap();
		let shown = insert(
			&mut conn,
			&catalog,
			Record::new("statuscontract", 0).with_value("name", text("open")),
		)
		.await;
		let hidden = insert(
			&mut conn,
			&catalog,
			Record::new("statuscontract", 0)
				.with_value("name", text("legacy"))
				.with_value("view", FieldValue::Bool(false)),
		)
		.await;

		let model = catalog.registry.model("contract").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		let instance = Record::new("contract", 5).with_value("status", FieldValue::Ref(hidden));
		let field = ModelForm::new(model, &layout, false)
			.unwrap()
			.with_instance(instance)
			.field("status")
			.cloned()
			.unwrap();

		let offered = choices_for(&mut conn, &catalog.registry, &field, Some(hidden), 5).await.unwrap();
		let ids: Vec<i64> = offered.iter().map(|c| c.value).collect();
		assert_eq!(ids, vec![shown, hidden]);

		let offered = choices_for(&mut conn, &catalog.registry, &field, None, 5).await.unwrap();
		assert_eq!(offered.len(), 1);
	}

	#[tokio::test]
	async fn test_client_columns_are_copied() {
		let (catalog, db) = setup().await;
		let mut conn = db.acquire().await.unwrap();
		let department =
			insert(&mut conn, &catalog, Record::new("department", 0).with_value("name", text("Минобороны"))).await;
		let client = insert(
			&mut conn,
			&catalog,
			Record::new("client", 0)
				.with_value("name", text("АО Вектор"))
				.with_value("city", text("Казань"))
				.with_value("inn", FieldValue::Int(1655000000))
				.with_value("department", FieldValue::Ref(department)),
		)
		.await;

		let model = catalog.registry.model("contract").unwrap();
		let layout = catalog.layout("contract", model).unwrap();
		let form = ModelForm::new(model, &layout, false).unwrap();
		let mut record = Record::new("contract", 1).with_value("client", FieldValue::Ref(client));
		fill_from_related(&mut conn, &catalog.registry, &form, &mut record).await.unwrap();

		assert_eq!(record.get("city"), &text("Казань"));
		assert_eq!(record.get("inn"), &text("1655000000"));
		assert_eq!(record.get("department"), &text("Минобороны"));

		record.set("client", FieldValue::Null);
		fill_from_related(&mut conn, &catalog.registry, &form, &mut record).await.unwrap();
		assert_eq!(record.get("city"), &text(""));
	}
}
