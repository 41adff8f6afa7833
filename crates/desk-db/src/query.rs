//! Record queries
//!
//! A [`QuerySet`] selects rows of one registered model. Filters name fields,
//! not columns; relation lookups become `IN (SELECT ...)` subqueries, so a
//! predicate such as "the letter's contract is open" stays one statement.

use crate::codec::{record_from_row, to_db};
use crate::related::load_related;
use desk_core::registry::{FieldDescriptor, ModelDescriptor};
use desk_core::{DeskError, DeskResult, FieldValue, Record, Registry};
use sea_query::{
	Alias, Asterisk, Condition, Expr, ExprTrait, Func, Order, Query, SelectStatement,
	SqliteQueryBuilder,
};
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
	/// `field = value`, or `IS NULL` for a null value
	Exact(FieldValue),
	In(Vec<i64>),
	/// The related row matches every nested filter
	Related(Vec<Filter>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub lookup: Lookup,
	pub negated: bool,
}

impl Filter {
	fn new(field: impl Into<String>, lookup: Lookup) -> Self {
		Self {
			field: field.into(),
			lookup,
			negated: false,
		}
	}

	pub fn eq(field: impl Into<String>, value: FieldValue) -> Self {
		Self::new(field, Lookup::Exact(value))
	}

	pub fn is_in(field: impl Into<String>, ids: impl IntoIterator<Item = i64>) -> Self {
		Self::new(field, Lookup::In(ids.into_iter().collect()))
	}

	pub fn related(field: impl Into<String>, filters: Vec<Filter>) -> Self {
		Self::new(field, Lookup::Related(filters))
	}

	pub fn not(mut self) -> Self {
		self.negated = !self.negated;
		self
	}
}

/// Column and descriptor a filter or ordering field refers to
fn resolve_field<'m>(
	model: &'m ModelDescriptor,
	name: &str,
) -> DeskResult<(String, Option<&'m FieldDescriptor>)> {
	if name == "id" {
		return Ok(("id".to_string(), None));
	}
	model
		.field(name)
		.map(|field| (field.column(), Some(field)))
		.ok_or_else(|| {
			DeskError::ImproperlyConfigured(format!(
				"'{}' has no field named '{}'",
				model.model_name, name
			))
		})
}

fn filter_condition(
	registry: &Registry,
	model: &ModelDescriptor,
	filter: &Filter,
) -> DeskResult<Condition> {
	let (column, field) = resolve_field(model, &filter.field)?;
	let col = Expr::col((Alias::new(model.table()), Alias::new(column)));

	let condition = match &filter.lookup {
		Lookup::Exact(FieldValue::Null) => Condition::all().add(col.is_null()),
		Lookup::Exact(value) => Condition::all().add(col.eq(to_db(field, value))),
		Lookup::In(ids) => Condition::all().add(col.is_in(ids.iter().copied())),
		Lookup::Related(nested) => {
			let target = field
				.and_then(FieldDescriptor::related_model)
				.ok_or_else(|| {
					DeskError::ImproperlyConfigured(format!(
						"'{}.{}' is not a relation",
						model.model_name, filter.field
					))
				})?;
			let target = registry.model(target)?;
			let subquery = Query::select()
				.column((Alias::new(target.table()), Alias::new("id")))
				.from(Alias::new(target.table()))
				.cond_where(conditions(registry, target, nested)?)
				.to_owned();
			Condition::all().add(col.in_subquery(subquery))
		}
	};

	Ok(if filter.negated {
		condition.not()
	} else {
		condition
	})
}

fn conditions(registry: &Registry, model: &ModelDescriptor, filters: &[Filter]) -> DeskResult<Condition> {
	filters.iter().try_fold(Condition::all(), |acc, filter| {
		Ok(acc.add(filter_condition(registry, model, filter)?))
	})
}

/// Lazy selection of rows of one model
#[derive(Debug, Clone)]
pub struct QuerySet<'a> {
	registry: &'a Registry,
	model: &'a ModelDescriptor,
	filters: Vec<Filter>,
	ordering: Option<Vec<String>>,
	related: Vec<String>,
	limit: Option<u64>,
	offset: Option<u64>,
}

impl<'a> QuerySet<'a> {
	pub fn new(registry: &'a Registry, model: &'a ModelDescriptor) -> Self {
		Self {
			registry,
			model,
			filters: Vec::new(),
			ordering: None,
			related: Vec::new(),
			limit: None,
			offset: None,
		}
	}

	pub fn model(&self) -> &'a ModelDescriptor {
		self.model
	}

	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter);
		self
	}

	pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
		self.filters.extend(filters);
		self
	}

	/// Field names, `-` prefixed for descending order
	pub fn order_by<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
		self.ordering = Some(fields.iter().map(|f| f.as_ref().to_string()).collect());
		self
	}

	/// Relations to load with the rows, `a__b` for nested ones
	pub fn select_related<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
		for path in paths {
			let path = path.as_ref().to_string();
			if !self.related.contains(&path) {
				self.related.push(path);
			}
		}
		self
	}

	pub fn limit(mut self, limit: u64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: u64) -> Self {
		self.offset = Some(offset);
		self
	}

	fn select(&self) -> DeskResult<SelectStatement> {
		let table = Alias::new(self.model.table());
		let mut stmt = Query::select();
		stmt.column(Asterisk)
			.from(table.clone())
			.cond_where(conditions(self.registry, self.model, &self.filters)?);

		let ordering: Vec<String> = match &self.ordering {
			Some(ordering) => ordering.clone(),
			None => self.model.ordering.iter().map(|f| f.to_string()).collect(),
		};
		for field in &ordering {
			let (name, order) = match field.strip_prefix('-') {
				Some(name) => (name, Order::Desc),
				None => (field.as_str(), Order::Asc),
			};
			let (column, _) = resolve_field(self.model, name)?;
			stmt.order_by((table.clone(), Alias::new(column)), order);
		}
		stmt.order_by((table, Alias::new("id")), Order::Asc);

		if let Some(limit) = self.limit {
			stmt.limit(limit);
		}
		if let Some(offset) = self.offset {
			stmt.offset(offset);
		}
		Ok(stmt.to_owned())
	}

	/// Rows without any related loading
	pub(crate) async fn fetch_rows(&self, conn: &mut SqliteConnection) -> DeskResult<Vec<Record>> {
		let sql = self.select()?.to_string(SqliteQueryBuilder);
		tracing::debug!(%sql, "Fetching records");
		let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
		rows.iter()
			.map(|row| record_from_row(self.model, row))
			.collect()
	}

	/// Rows with the declared relations and whatever their display needs
	pub async fn fetch(&self, conn: &mut SqliteConnection) -> DeskResult<Vec<Record>> {
		let mut records = self.fetch_rows(conn).await?;
		let mut paths = self.related.clone();
		for path in self.registry.row_paths(self.model.model_name) {
			if !paths.contains(&path) {
				paths.push(path);
			}
		}
		load_related(conn, self.registry, &mut records, &paths).await?;
		Ok(records)
	}

	pub async fn first(&self, conn: &mut SqliteConnection) -> DeskResult<Option<Record>> {
		Ok(self.clone().limit(1).fetch(conn).await?.into_iter().next())
	}

	/// The row with primary key `id` among the selection, or `NotFound`
	pub async fn get(&self, conn: &mut SqliteConnection, id: i64) -> DeskResult<Record> {
		self.clone()
			.filter(Filter::eq("id", FieldValue::Int(id)))
			.first(conn)
			.await?
			.ok_or_else(DeskError::not_found)
	}

	pub async fn count(&self, conn: &mut SqliteConnection) -> DeskResult<i64> {
		let sql = Query::select()
			.expr(Func::count(Expr::col(Asterisk)))
			.from(Alias::new(self.model.table()))
			.cond_where(conditions(self.registry, self.model, &self.filters)?)
			.to_string(SqliteQueryBuilder);
		let row = sqlx::query(&sql).fetch_one(&mut *conn).await?;
		Ok(row.try_get::<i64, _>(0)?)
	}

	pub async fn exists(&self, conn: &mut SqliteConnection) -> DeskResult<bool> {
		Ok(self.count(conn).await? > 0)
	}

	/// Primary keys of the selection
	pub async fn ids(&self, conn: &mut SqliteConnection) -> DeskResult<Vec<i64>> {
		Ok(self.fetch_rows(conn).await?.into_iter().map(|r| r.id).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use rstest::rstest;

	#[rstest]
	fn test_related_filter_becomes_subquery() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let sql = QuerySet::new(&catalog.registry, letter)
			.filter(Filter::eq("contract", FieldValue::Ref(7)))
			.filter(Filter::related(
				"contract",
				vec![Filter::eq("closed", FieldValue::Bool(false))],
			))
			.select()
			.unwrap()
			.to_string(SqliteQueryBuilder);

		assert!(sql.contains("\"contract_letter\".\"contract_id\" = 7"));
		assert!(sql.contains("IN (SELECT \"contract_contract\".\"id\" FROM \"contract_contract\""));
		assert!(sql.contains("ORDER BY \"contract_letter\".\"date\" DESC"));
	}

	#[rstest]
	fn test_unknown_field_is_configuration_error() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let err = QuerySet::new(&catalog.registry, letter)
			.filter(Filter::eq("nope", FieldValue::Int(1)))
			.select()
			.unwrap_err();
		assert!(matches!(err, DeskError::ImproperlyConfigured(_)));
	}

	#[rstest]
	fn test_null_lookup_and_negation() {
		let catalog = site();
		let contract = catalog.registry.model("contract").unwrap();
		let sql = QuerySet::new(&catalog.registry, contract)
			.filter(Filter::eq("client", FieldValue::Null).not())
			.select()
			.unwrap()
			.to_string(SqliteQueryBuilder);
		assert!(sql.contains("NOT"));
		assert!(sql.contains("\"client_id\" IS NULL"));
	}
}
