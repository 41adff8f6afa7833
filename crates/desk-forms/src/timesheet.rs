//! Employee time sheet
//!
//! The hours an employee booked on one day, one row per contract. Saved
//! rows come first; every open contract the employee works on without an
//! entry that day adds an extra row. A header form carries the employee's
//! details and the date new rows are booked on.

use crate::bound_field::BoundField;
use crate::field::{FieldError, Widget};
use crate::formset::FormSet;
use chrono::NaiveDate;
use desk_core::value::parse_date;
use desk_core::{DeskError, DeskResult, FieldValue, FormData, Record, Registry};
use desk_db::{Filter, QuerySet, SqliteConnection, repo};
use std::collections::BTreeMap;

pub const TIMESHEET_PREFIX: &str = "table-0-form";
pub const EDITABLE: &[&str] = &["time"];

/// Date of the sheet from the `date` query parameter, today when absent
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use desk_forms::timesheet::sheet_date;
///
/// let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// assert_eq!(sheet_date(None, today).unwrap(), today);
/// assert_eq!(sheet_date(Some("03.05.2024"), today).unwrap(), sheet_date(Some("2024-05-03"), today).unwrap());
/// assert!(sheet_date(Some("May 3rd"), today).is_err());
/// ```
pub fn sheet_date(raw: Option<&str>, today: NaiveDate) -> DeskResult<NaiveDate> {
	match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
		None => Ok(today),
		Some(raw) => {
			parse_date(raw).ok_or_else(|| DeskError::BadRequest(format!("Invalid date '{}'", raw)))
		}
	}
}

/// Message shown instead of the sheet when the employee has no rows
pub fn not_involved_message(employee: &str) -> String {
	format!("{} is not involved in any project.", employee)
}

/// Header of the sheet: readonly employee details plus the booking date
#[derive(Debug, Clone)]
pub struct TimeSheetForm {
	employee: Record,
	date: NaiveDate,
	data: Option<FormData>,
	errors: BTreeMap<String, Vec<String>>,
}

impl TimeSheetForm {
	pub fn new(employee: Record, date: NaiveDate) -> Self {
		Self {
			employee,
			date,
			data: None,
			errors: BTreeMap::new(),
		}
	}

	pub fn employee(&self) -> &Record {
		&self.employee
	}

	/// The date rows are booked on; the submitted one once validated
	pub fn date(&self) -> NaiveDate {
		self.date
	}

	pub fn bind(&mut self, data: &FormData) {
		self.data = Some(data.clone());
		self.errors.clear();
	}

	pub fn is_valid(&mut self) -> bool {
		let Some(data) = &self.data else {
			return false;
		};
		self.errors.clear();
		let raw = data.get("date").map(str::trim).unwrap_or_default();
		let error = if raw.is_empty() {
			Some(FieldError::Required)
		} else {
			match parse_date(raw) {
				Some(date) => {
					self.date = date;
					None
				}
				None => Some(FieldError::InvalidDate),
			}
		};
		if let Some(error) = error {
			self.errors.entry("date".to_string()).or_default().push(error.to_string());
		}
		self.errors.is_empty()
	}

	pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
		&self.errors
	}

	fn readonly(name: &str, label: &str, value: String) -> BoundField {
		BoundField {
			name: name.to_string(),
			html_name: name.to_string(),
			label: label.to_string(),
			help_text: String::new(),
			widget: Widget::TextInput,
			required: false,
			readonly: true,
			display: value.clone(),
			value,
			checked: false,
			errors: Vec::new(),
			choices: Vec::new(),
			file: None,
		}
	}

	/// Header fields in display order
	pub fn bound_fields(&self, registry: &Registry) -> Vec<BoundField> {
		let full_name = registry
			.get("employee")
			.and_then(|model| model.computed_field("full_name"))
			.map(|computed| registry.compute(&self.employee, computed).to_string())
			.unwrap_or_default();
		let value = match self.data.as_ref().and_then(|data| data.get("date")) {
			Some(raw) => raw.to_string(),
			None => FieldValue::Date(self.date).to_input(),
		};
		vec![
			Self::readonly("full_name", "Employee", full_name),
			Self::readonly("tabel", "Personnel number", self.employee.get("tabel").to_string()),
			Self::readonly("norma", "Working hours norm", self.employee.get("norma").to_string()),
			BoundField {
				name: "date".to_string(),
				html_name: "date".to_string(),
				label: "Date".to_string(),
				help_text: String::new(),
				widget: Widget::DateInput,
				required: true,
				readonly: false,
				display: FieldValue::Date(self.date).to_string(),
				value,
				checked: false,
				errors: self.errors.get("date").cloned().unwrap_or_default(),
				choices: Vec::new(),
				file: None,
			},
		]
	}
}

/// Saved rows of the day and the extra rows for unbooked contracts
pub async fn load_rows(
	conn: &mut SqliteConnection,
	registry: &Registry,
	employee_id: i64,
	date: NaiveDate,
) -> DeskResult<(Vec<Record>, Vec<Record>)> {
	let timework = registry.model("timework")?;
	let member = registry.model("member")?;

	let rows = QuerySet::new(registry, timework)
		.filter(Filter::related(
			"member",
			vec![Filter::eq("employee", FieldValue::Ref(employee_id))],
		))
		.filter(Filter::eq("date", FieldValue::Date(date)))
		.select_related(&["contract"])
		.order_by(&["contract"])
		.fetch(conn)
		.await?;

	let memberships = QuerySet::new(registry, member)
		.filter(Filter::eq("employee", FieldValue::Ref(employee_id)))
		.filter(Filter::related(
			"contract",
			vec![Filter::eq("closed", FieldValue::Bool(false))],
		))
		.select_related(&["contract"])
		.order_by(&["contract"])
		.fetch(conn)
		.await?;

	let extra = memberships
		.into_iter()
		.filter(|m| !rows.iter().any(|row| row.ref_id("member") == Some(m.id)))
		.filter_map(|m| {
			let contract = m.related("contract")?.clone();
			Some(
				Record::new("timework", 0)
					.with_value("member", FieldValue::Ref(m.id))
					.with_value("contract", FieldValue::Ref(contract.id))
					.with_value("date", FieldValue::Date(date))
					.with_related("contract", contract)
					.with_related("member", m),
			)
		})
		.collect();
	Ok((rows, extra))
}

/// Formset editing the hours of the sheet rows
pub fn formset(registry: &Registry, rows: Vec<Record>, extra: Vec<Record>) -> DeskResult<FormSet> {
	let model = registry.model("timework")?;
	FormSet::new(model, None, EDITABLE, &[], TIMESHEET_PREFIX, rows, extra)
}

/// Write the changed rows; new rows are booked on `date`
///
/// Returns the number of rows written. Time sheet edits are not recorded in
/// the change log.
pub async fn save(
	conn: &mut SqliteConnection,
	registry: &Registry,
	formset: &FormSet,
	date: NaiveDate,
) -> DeskResult<usize> {
	let model = registry.model("timework")?;
	let mut written = 0;
	for form in formset.changed_forms() {
		let mut record = form.instance().clone();
		record.related.clear();
		form.apply(&mut record);
		if record.is_saved() {
			repo::update(conn, model, &record).await?;
		} else {
			record.set("date", FieldValue::Date(date));
			repo::insert(conn, model, &record).await?;
		}
		written += 1;
	}
	Ok(written)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::Catalog;
	use desk_db::Database;
	use rust_decimal::Decimal;

	fn day(d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
	}

	async fn insert(conn: &mut SqliteConnection, catalog: &Catalog, record: Record) -> i64 {
		let model = catalog.registry.model(&record.model).unwrap();
		repo::insert(conn, model, &record).await.unwrap()
	}

	fn contract(number: &str, closed: bool) -> Record {
		Record::new("contract", 0)
			.with_value("number", FieldValue::Text(number.into()))
			.with_value("closed", FieldValue::Bool(closed))
	}

	fn member(contract: i64, employee: i64) -> Record {
		Record::new("member", 0)
			.with_value("contract", FieldValue::Ref(contract))
			.with_value("employee", FieldValue::Ref(employee))
	}

	#[tokio::test]
	async fn test_rows_and_extras_for_open_contracts() {
		let catalog = site();
		let db = Database::memory().await.unwrap();
		db.migrate(&catalog.registry).await.unwrap();
		let mut conn = db.acquire().await.unwrap();

		let employee = insert(&mut conn, &catalog, Record::new("employee", 0)).await;
		let booked = insert(&mut conn, &catalog, contract("K-1", false)).await;
		let open = insert(&mut conn, &catalog, contract("K-2", false)).await;
		let closed = insert(&mut conn, &catalog, contract("K-3", true)).await;
		let booked_member = insert(&mut conn, &catalog, member(booked, employee)).await;
		insert(&mut conn, &catalog, member(open, employee)).await;
		insert(&mut conn, &catalog, member(closed, employee)).await;
		insert(
			&mut conn,
			&catalog,
			Record::new("timework", 0)
				.with_value("member", FieldValue::Ref(booked_member))
				.with_value("contract", FieldValue::Ref(booked))
				.with_value("date", FieldValue::Date(day(2)))
				.with_value("time", FieldValue::Decimal(Decimal::new(75, 1))),
		)
		.await;

		let (rows, extra) = load_rows(&mut conn, &catalog.registry, employee, day(2)).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(catalog.registry.display(&rows[0]), "K-1");
		let extra_contracts: Vec<i64> = extra.iter().filter_map(|r| r.ref_id("contract")).collect();
		assert_eq!(extra_contracts, vec![open]);

		let (rows, extra) = load_rows(&mut conn, &catalog.registry, employee, day(3)).await.unwrap();
		assert!(rows.is_empty());
		assert_eq!(extra.len(), 2);
	}

	#[tokio::test]
	async fn test_save_books_filled_extras_on_header_date() {
		let catalog = site();
		let db = Database::memory().await.unwrap();
		db.migrate(&catalog.registry).await.unwrap();
		let mut conn = db.acquire().await.unwrap();

		let employee = insert(&mut conn, &catalog, Record::new("employee", 0)).await;
		let first = insert(&mut conn, &catalog, contract("K-1", false)).await;
		let second = insert(&mut conn, &catalog, contract("K-2", false)).await;
		insert(&mut conn, &catalog, member(first, employee)).await;
		insert(&mut conn, &catalog, member(second, employee)).await;

		let (rows, extra) = load_rows(&mut conn, &catalog.registry, employee, day(5)).await.unwrap();
		let mut formset = formset(&catalog.registry, rows, extra).unwrap();
		let data = FormData::from_pairs([
			("table-0-form-TOTAL_FORMS", "2"),
			("table-0-form-INITIAL_FORMS", "0"),
			("table-0-form-0-time", "8"),
			("table-0-form-1-time", ""),
			("date", "05.04.2024"),
		]);
		formset.bind(&data);
		let mut header = TimeSheetForm::new(Record::new("employee", employee), day(5));
		header.bind(&data);

		assert!(formset.is_valid());
		assert!(header.is_valid());
		assert_eq!(save(&mut conn, &catalog.registry, &formset, header.date()).await.unwrap(), 1);

		let (rows, extra) = load_rows(&mut conn, &catalog.registry, employee, day(5)).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].get("time"), &FieldValue::Decimal(Decimal::new(8, 0)));
		assert_eq!(extra.len(), 1);
	}

	#[test]
	fn test_header_requires_date() {
		let mut header = TimeSheetForm::new(Record::new("employee", 1), day(1));
		header.bind(&FormData::from_pairs([("date", "")]));
		assert!(!header.is_valid());
		assert_eq!(header.errors()["date"], ["This field is required."]);
	}

	#[test]
	fn test_header_shows_employee_details() {
		let catalog = site();
		let employee = Record::new("employee", 1)
			.with_value("last_name", FieldValue::Text("Иванов".into()))
			.with_value("first_name", FieldValue::Text("Пётр".into()))
			.with_value("middle_name", FieldValue::Text("Ильич".into()))
			.with_value("tabel", FieldValue::Int(42));
		let header = TimeSheetForm::new(employee, day(9));
		let fields = header.bound_fields(&catalog.registry);

		assert_eq!(fields[0].value, "Иванов Пётр Ильич");
		assert_eq!(fields[1].value, "42");
		assert!(fields[2].readonly);
		assert_eq!(fields[3].value, "2024-04-09");
	}
}
