//! Conversion between typed field values and SQLite columns
//!
//! Decimals and dates are stored as text (`12.50`, `2024-03-05`), booleans
//! as integers and relations as the target's id.

use crate::schema::LAST_CHANGE;
use chrono::NaiveDate;
use desk_core::registry::{FieldDescriptor, FieldKind, ModelDescriptor};
use desk_core::value::DATE_ISO_FORMAT;
use desk_core::{DeskError, DeskResult, FieldValue, Record};
use rust_decimal::Decimal;
use sea_query::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;

/// Bind value for a field
pub fn to_db(field: Option<&FieldDescriptor>, value: &FieldValue) -> Value {
	match value {
		FieldValue::Null => match field.map(|f| &f.kind) {
			Some(
				FieldKind::Integer { .. }
				| FieldKind::Choice { .. }
				| FieldKind::ForeignKey { .. }
				| FieldKind::OneToOne { .. },
			) => Value::BigInt(None),
			Some(FieldKind::Boolean) => Value::Bool(Some(false)),
			_ => Value::String(None),
		},
		FieldValue::Text(s) | FieldValue::File(s) => Value::from(s.clone()),
		FieldValue::Int(i) | FieldValue::Ref(i) => Value::from(*i),
		FieldValue::Decimal(d) => Value::from(d.to_string()),
		FieldValue::Bool(b) => Value::from(*b),
		FieldValue::Date(d) => Value::from(d.format(DATE_ISO_FORMAT).to_string()),
	}
}

fn text(row: &SqliteRow, column: &str) -> DeskResult<Option<String>> {
	Ok(row.try_get::<Option<String>, _>(column)?)
}

fn integer(row: &SqliteRow, column: &str) -> DeskResult<Option<i64>> {
	Ok(row.try_get::<Option<i64>, _>(column)?)
}

/// Decode one field from its column
pub fn from_db(field: &FieldDescriptor, row: &SqliteRow) -> DeskResult<FieldValue> {
	let column = field.column();
	let value = match &field.kind {
		FieldKind::Char { .. } | FieldKind::Text { .. } => text(row, &column)?
			.map(FieldValue::Text)
			.unwrap_or(FieldValue::Null),
		FieldKind::File { .. } => text(row, &column)?
			.filter(|path| !path.is_empty())
			.map(FieldValue::File)
			.unwrap_or(FieldValue::Null),
		FieldKind::Integer { .. } | FieldKind::Choice { .. } => integer(row, &column)?
			.map(FieldValue::Int)
			.unwrap_or(FieldValue::Null),
		FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => integer(row, &column)?
			.map(FieldValue::Ref)
			.unwrap_or(FieldValue::Null),
		FieldKind::Boolean => {
			let flag = row.try_get::<Option<bool>, _>(column.as_str())?;
			FieldValue::Bool(flag.unwrap_or(false))
		}
		FieldKind::Decimal { .. } => match text(row, &column)? {
			Some(raw) if !raw.is_empty() => Decimal::from_str(&raw)
				.map(FieldValue::Decimal)
				.map_err(|e| DeskError::Database(format!("{}.{}: {}", field.name, raw, e)))?,
			_ => FieldValue::Null,
		},
		FieldKind::Date => match text(row, &column)? {
			Some(raw) if !raw.is_empty() => NaiveDate::parse_from_str(&raw, DATE_ISO_FORMAT)
				.map(FieldValue::Date)
				.map_err(|e| DeskError::Database(format!("{}.{}: {}", field.name, raw, e)))?,
			_ => FieldValue::Null,
		},
	};
	Ok(value)
}

/// Build a record from a `SELECT *` row of the model's table
pub fn record_from_row(model: &ModelDescriptor, row: &SqliteRow) -> DeskResult<Record> {
	let id: i64 = row.try_get("id")?;
	let mut record = Record::new(model.model_name, id);
	for field in &model.fields {
		record.set(field.name, from_db(field, row)?);
	}
	if let Some(last_change) = text(row, LAST_CHANGE)? {
		record.set(LAST_CHANGE, FieldValue::Text(last_change));
	}
	Ok(record)
}
