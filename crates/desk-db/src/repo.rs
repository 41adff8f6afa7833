//! Row writes

use crate::codec::to_db;
use crate::schema::LAST_CHANGE;
use desk_core::registry::ModelDescriptor;
use desk_core::{DeskError, DeskResult, FieldValue, Record};
use sea_query::{Alias, Expr, ExprTrait, Query, SqliteQueryBuilder};
use sqlx::SqliteConnection;

/// Model fields present in the record, with their bind values
fn assignments(model: &ModelDescriptor, record: &Record) -> Vec<(String, sea_query::Value)> {
	let mut values: Vec<(String, sea_query::Value)> = model
		.fields
		.iter()
		.filter_map(|field| {
			record
				.values
				.get(field.name)
				.map(|value| (field.column(), to_db(Some(field), value)))
		})
		.collect();
	if let Some(FieldValue::Text(message)) = record.values.get(LAST_CHANGE) {
		values.push((LAST_CHANGE.to_string(), message.clone().into()));
	}
	values
}

/// Insert a new row, returning its primary key
pub async fn insert(
	conn: &mut SqliteConnection,
	model: &ModelDescriptor,
	record: &Record,
) -> DeskResult<i64> {
	let values = assignments(model, record);
	let sql = if values.is_empty() {
		format!("INSERT INTO \"{}\" DEFAULT VALUES", model.table())
	} else {
		Query::insert()
			.into_table(Alias::new(model.table()))
			.columns(values.iter().map(|(column, _)| Alias::new(column)))
			.values(values.into_iter().map(|(_, value)| Expr::val(value)))
			.map_err(|e| DeskError::Database(e.to_string()))?
			.to_string(SqliteQueryBuilder)
	};
	tracing::debug!(%sql, "Inserting record");
	let result = sqlx::query(&sql).execute(&mut *conn).await?;
	Ok(result.last_insert_rowid())
}

/// Write every field present in the record to its row
pub async fn update(
	conn: &mut SqliteConnection,
	model: &ModelDescriptor,
	record: &Record,
) -> DeskResult<()> {
	let values = assignments(model, record);
	if values.is_empty() {
		return Ok(());
	}
	let mut stmt = Query::update();
	stmt.table(Alias::new(model.table()))
		.and_where(Expr::col(Alias::new("id")).eq(record.id));
	for (column, value) in values {
		stmt.value(Alias::new(column), value);
	}
	let sql = stmt.to_string(SqliteQueryBuilder);
	tracing::debug!(%sql, "Updating record");
	let result = sqlx::query(&sql).execute(&mut *conn).await?;
	if result.rows_affected() == 0 {
		return Err(DeskError::not_found());
	}
	Ok(())
}

/// Set one field on every listed row
pub async fn set_field(
	conn: &mut SqliteConnection,
	model: &ModelDescriptor,
	field: &str,
	value: &FieldValue,
	ids: &[i64],
) -> DeskResult<u64> {
	if ids.is_empty() {
		return Ok(0);
	}
	let descriptor = model.field(field).ok_or_else(|| {
		DeskError::ImproperlyConfigured(format!("'{}' has no field '{}'", model.model_name, field))
	})?;
	let sql = Query::update()
		.table(Alias::new(model.table()))
		.value(Alias::new(descriptor.column()), to_db(Some(descriptor), value))
		.and_where(Expr::col(Alias::new("id")).is_in(ids.iter().copied()))
		.to_string(SqliteQueryBuilder);
	Ok(sqlx::query(&sql).execute(&mut *conn).await?.rows_affected())
}

pub async fn delete(conn: &mut SqliteConnection, model: &ModelDescriptor, ids: &[i64]) -> DeskResult<u64> {
	if ids.is_empty() {
		return Ok(0);
	}
	let sql = Query::delete()
		.from_table(Alias::new(model.table()))
		.and_where(Expr::col(Alias::new("id")).is_in(ids.iter().copied()))
		.to_string(SqliteQueryBuilder);
	tracing::debug!(%sql, "Deleting records");
	Ok(sqlx::query(&sql).execute(&mut *conn).await?.rows_affected())
}
