//! Content types: one row per `(app_label, model)` pair
//!
//! Change log entries point at objects through a content type id plus the
//! object id.

use crate::schema::CONTENT_TYPE_TABLE;
use desk_core::DeskResult;
use sea_query::{Alias, Expr, ExprTrait, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType {
	pub id: i64,
	pub app_label: String,
	pub model: String,
}

impl ContentType {
	/// `app_label.model`
	pub fn qualified_name(&self) -> String {
		format!("{}.{}", self.app_label, self.model)
	}
}

/// Content type of a model, created on first use
pub async fn get_for_model(
	conn: &mut SqliteConnection,
	app_label: &str,
	model: &str,
) -> DeskResult<ContentType> {
	let insert = Query::insert()
		.into_table(Alias::new(CONTENT_TYPE_TABLE))
		.columns([Alias::new("app_label"), Alias::new("model")])
		.values([Expr::val(app_label), Expr::val(model)])
		.map_err(|e| desk_core::DeskError::Database(e.to_string()))?
		.on_conflict(
			OnConflict::columns([Alias::new("app_label"), Alias::new("model")])
				.do_nothing()
				.to_owned(),
		)
		.to_string(SqliteQueryBuilder);
	sqlx::query(&insert).execute(&mut *conn).await?;

	let select = Query::select()
		.column(Alias::new("id"))
		.from(Alias::new(CONTENT_TYPE_TABLE))
		.and_where(Expr::col(Alias::new("app_label")).eq(app_label))
		.and_where(Expr::col(Alias::new("model")).eq(model))
		.to_string(SqliteQueryBuilder);
	let row = sqlx::query(&select).fetch_one(&mut *conn).await?;

	Ok(ContentType {
		id: row.try_get("id")?,
		app_label: app_label.to_string(),
		model: model.to_string(),
	})
}
