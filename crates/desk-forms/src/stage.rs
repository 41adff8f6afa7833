//! Bulk add of contract stages
//!
//! One multi-select per stage kind. Each picked name becomes a new row of
//! the matching stage list on the contract; names the contract already has
//! are not offered.

use crate::bound_field::ChoiceOption;
use crate::field::Choice;
use desk_core::{DeskResult, FieldValue, FormData, Record, Registry};
use desk_db::{Filter, QuerySet, SqliteConnection, repo};
use serde::Serialize;
use std::collections::BTreeMap;

/// `(input name, label, stage list model, stage name model)`
pub const STAGE_KINDS: &[(&str, &str, &str, &str)] = &[
	("stage_begin", "Preparation stages", "stagebeginlist", "stagebeginname"),
	("stage_middle", "Execution stages", "stagemiddlelist", "stagemiddlename"),
	("stage_end", "Completion stages", "stageendlist", "stageendname"),
];

/// Success message after `count` stages were created
///
/// # Examples
///
/// ```
/// use desk_forms::stage::added_message;
///
/// assert_eq!(added_message(1), "Stage successfully added.");
/// assert_eq!(added_message(3), "Stages successfully added.");
/// ```
pub fn added_message(count: usize) -> &'static str {
	if count == 1 {
		"Stage successfully added."
	} else {
		"Stages successfully added."
	}
}

/// One multi-select, ready for a template
#[derive(Debug, Clone, Serialize)]
pub struct StageField {
	pub name: &'static str,
	pub label: &'static str,
	pub errors: Vec<String>,
	pub choices: Vec<ChoiceOption>,
}

#[derive(Debug, Clone)]
pub struct StageAddForm {
	contract_id: i64,
	choices: BTreeMap<&'static str, Vec<Choice>>,
	data: Option<FormData>,
	cleaned: BTreeMap<&'static str, Vec<i64>>,
	errors: BTreeMap<&'static str, Vec<String>>,
}

impl StageAddForm {
	pub fn new(contract_id: i64) -> Self {
		Self {
			contract_id,
			choices: BTreeMap::new(),
			data: None,
			cleaned: BTreeMap::new(),
			errors: BTreeMap::new(),
		}
	}

	/// Form with the stage names the contract does not have yet
	pub async fn load(conn: &mut SqliteConnection, registry: &Registry, contract_id: i64) -> DeskResult<Self> {
		let mut form = Self::new(contract_id);
		for (input, _, list_model, name_model) in STAGE_KINDS {
			let present: Vec<i64> = QuerySet::new(registry, registry.model(list_model)?)
				.filter(Filter::eq("contract", FieldValue::Ref(contract_id)))
				.fetch(conn)
				.await?
				.iter()
				.filter_map(|row| row.ref_id("name"))
				.collect();
			let names = QuerySet::new(registry, registry.model(name_model)?)
				.filter(Filter::eq("view", FieldValue::Bool(true)))
				.filter(Filter::is_in("id", present).not())
				.fetch(conn)
				.await?;
			let choices = names
				.iter()
				.map(|row| Choice::new(row.id, registry.display(row)))
				.collect();
			form.set_choices(*input, choices);
		}
		Ok(form)
	}

	pub fn set_choices(&mut self, input: &'static str, choices: Vec<Choice>) {
		self.choices.insert(input, choices);
	}

	pub fn bind(&mut self, data: &FormData) {
		self.data = Some(data.clone());
		self.cleaned.clear();
		self.errors.clear();
	}

	pub fn is_valid(&mut self) -> bool {
		let Some(data) = self.data.clone() else {
			return false;
		};
		self.cleaned.clear();
		self.errors.clear();
		for (input, ..) in STAGE_KINDS {
			let offered = self.choices.get(input).map(Vec::as_slice).unwrap_or(&[]);
			let mut picked = Vec::new();
			for raw in data.get_all(input).iter().map(|raw| raw.trim()).filter(|raw| !raw.is_empty()) {
				match raw.parse::<i64>() {
					Ok(id) if offered.iter().any(|c| c.value == id) => picked.push(id),
					_ => {
						self.errors.entry(*input).or_default().push(format!(
							"Select a valid choice. {} is not one of the available choices.",
							raw
						));
					}
				}
			}
			self.cleaned.insert(*input, picked);
		}
		self.errors.is_empty()
	}

	pub fn has_changed(&self) -> bool {
		self.cleaned.values().any(|picked| !picked.is_empty())
	}

	pub fn errors(&self) -> &BTreeMap<&'static str, Vec<String>> {
		&self.errors
	}

	/// Unsaved stage rows for the cleaned picks
	pub fn records(&self) -> Vec<Record> {
		STAGE_KINDS
			.iter()
			.flat_map(|(input, _, list_model, _)| {
				self.cleaned
					.get(input)
					.into_iter()
					.flatten()
					.map(move |name| {
						Record::new(*list_model, 0)
							.with_value("contract", FieldValue::Ref(self.contract_id))
							.with_value("name", FieldValue::Ref(*name))
					})
			})
			.collect()
	}

	/// Insert the picked stages, returning the saved rows
	pub async fn save(&self, conn: &mut SqliteConnection, registry: &Registry) -> DeskResult<Vec<Record>> {
		let mut saved = Vec::new();
		for mut record in self.records() {
			let model = registry.model(&record.model)?;
			record.id = repo::insert(conn, model, &record).await?;
			saved.push(record);
		}
		tracing::info!(contract_id = self.contract_id, count = saved.len(), "Stages added");
		Ok(saved)
	}

	pub fn fields(&self) -> Vec<StageField> {
		let submitted = |input: &str| -> Vec<String> {
			self.data
				.as_ref()
				.map(|data| data.get_all(input).to_vec())
				.unwrap_or_default()
		};
		STAGE_KINDS
			.iter()
			.map(|(input, label, ..)| {
				let selected = submitted(input);
				StageField {
					name: *input,
					label: *label,
					errors: self.errors.get(input).cloned().unwrap_or_default(),
					choices: self
						.choices
						.get(input)
						.into_iter()
						.flatten()
						.map(|choice| ChoiceOption {
							value: choice.value.to_string(),
							label: choice.label.clone(),
							selected: selected.contains(&choice.value.to_string()),
						})
						.collect(),
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_db::Database;

	fn text(value: &str) -> FieldValue {
		FieldValue::Text(value.to_string())
	}

	#[test]
	fn test_picks_become_rows_per_kind() {
		let mut form = StageAddForm::new(7);
		form.set_choices("stage_begin", vec![Choice::new(1, "ТЗ"), Choice::new(2, "Смета")]);
		form.set_choices("stage_end", vec![Choice::new(5, "Акт")]);
		form.bind(&FormData::from_pairs([
			("stage_begin", "2"),
			("stage_begin", "1"),
			("stage_end", "5"),
		]));

		assert!(form.is_valid());
		let rows = form.records();
		let models: Vec<&str> = rows.iter().map(|r| r.model.as_str()).collect();
		assert_eq!(models, vec!["stagebeginlist", "stagebeginlist", "stageendlist"]);
		assert_eq!(rows[0].ref_id("name"), Some(2));
		assert_eq!(rows[2].ref_id("contract"), Some(7));
	}

	#[test]
	fn test_names_not_offered_are_rejected() {
		let mut form = StageAddForm::new(7);
		form.set_choices("stage_middle", vec![Choice::new(3, "Сборка")]);
		form.bind(&FormData::from_pairs([("stage_middle", "4")]));

		assert!(!form.is_valid());
		assert_eq!(
			form.errors()["stage_middle"],
			["Select a valid choice. 4 is not one of the available choices."]
		);
	}

	#[test]
	fn test_empty_submission_is_unchanged() {
		let mut form = StageAddForm::new(7);
		form.bind(&FormData::new());
		assert!(form.is_valid());
		assert!(!form.has_changed());
	}

	#[tokio::test]
	async fn test_present_names_are_excluded_and_saved_rows_counted() {
		let catalog = site();
		let db = Database::memory().await.unwrap();
		db.migrate(&catalog.registry).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		let registry = &catalog.registry;

		let contract = repo::insert(&mut conn, registry.model("contract").unwrap(), &Record::new("contract", 0))
			.await
			.unwrap();
		let name_model = registry.model("stagebeginname").unwrap();
		let terms = repo::insert(&mut conn, name_model, &Record::new("stagebeginname", 0).with_value("name", text("ТЗ")))
			.await
			.unwrap();
		let estimate = repo::insert(
			&mut conn,
			name_model,
			&Record::new("stagebeginname", 0).with_value("name", text("Смета")),
		)
		.await
		.unwrap();

		let mut form = StageAddForm::load(&mut conn, registry, contract).await.unwrap();
		form.bind(&FormData::from_pairs([("stage_begin", terms.to_string())]));
		assert!(form.is_valid());
		assert_eq!(form.save(&mut conn, registry).await.unwrap().len(), 1);

		let form = StageAddForm::load(&mut conn, registry, contract).await.unwrap();
		let offered: Vec<String> = form.fields()[0].choices.iter().map(|c| c.value.clone()).collect();
		assert_eq!(offered, vec![estimate.to_string()]);
	}
}
