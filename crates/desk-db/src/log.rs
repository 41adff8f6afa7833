//! Append-only change log
//!
//! Every add, change, delete and close done through the views writes one
//! entry keyed by user, content type and object id. Reading the history of
//! an object needs the `view` permission on [`logentry_model`].

use crate::contenttypes::ContentType;
use crate::schema::{LOG_TABLE, USER_TABLE};
use chrono::{DateTime, Utc};
use desk_core::registry::ModelDescriptor;
use desk_core::{DeskError, DeskResult};
use sea_query::{Alias, Expr, ExprTrait, Func, Order, Query, SqliteQueryBuilder};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};

/// Kind of logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ActionFlag {
	Addition = 1,
	Change = 2,
	Deletion = 3,
	Closing = 4,
}

impl ActionFlag {
	pub fn from_i16(value: i16) -> Option<Self> {
		match value {
			1 => Some(ActionFlag::Addition),
			2 => Some(ActionFlag::Change),
			3 => Some(ActionFlag::Deletion),
			4 => Some(ActionFlag::Closing),
			_ => None,
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			ActionFlag::Addition => "Added",
			ActionFlag::Change => "Changed",
			ActionFlag::Deletion => "Deleted",
			ActionFlag::Closing => "Closed",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
	pub id: i64,
	pub action_time: DateTime<Utc>,
	pub user_id: i64,
	pub username: String,
	pub content_type_id: Option<i64>,
	pub object_id: String,
	pub object_repr: String,
	pub action_flag: ActionFlag,
	pub change_message: String,
}

/// Descriptor used for permission checks on the change log
pub fn logentry_model() -> ModelDescriptor {
	ModelDescriptor::new("admin", "logentry", "log entry", "log entries")
}

/// Append an entry
pub async fn log_action(
	conn: &mut SqliteConnection,
	user_id: i64,
	content_type: &ContentType,
	object_id: i64,
	object_repr: &str,
	flag: ActionFlag,
	message: &str,
) -> DeskResult<()> {
	let sql = Query::insert()
		.into_table(Alias::new(LOG_TABLE))
		.columns([
			Alias::new("action_time"),
			Alias::new("user_id"),
			Alias::new("content_type_id"),
			Alias::new("object_id"),
			Alias::new("object_repr"),
			Alias::new("action_flag"),
			Alias::new("change_message"),
		])
		.values([
			Expr::val(Utc::now().to_rfc3339()),
			Expr::val(user_id),
			Expr::val(content_type.id),
			Expr::val(object_id.to_string()),
			// object_repr is capped at 200 characters
			Expr::val(object_repr.chars().take(200).collect::<String>()),
			Expr::val(flag as i16),
			Expr::val(message),
		])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.to_string(SqliteQueryBuilder);
	sqlx::query(&sql).execute(&mut *conn).await?;
	tracing::info!(
		user_id,
		object = %format!("{}#{}", content_type.qualified_name(), object_id),
		action = flag.label(),
		"Logged action"
	);
	Ok(())
}

/// One page of an object's history, oldest first, plus the total count
pub async fn history(
	conn: &mut SqliteConnection,
	content_type: &ContentType,
	object_id: i64,
	page: u64,
	per_page: u64,
) -> DeskResult<(Vec<LogEntry>, i64)> {
	let log = Alias::new(LOG_TABLE);
	let users = Alias::new(USER_TABLE);
	let object_id = object_id.to_string();

	let count_sql = Query::select()
		.expr(Func::count(Expr::col((log.clone(), Alias::new("id")))))
		.from(log.clone())
		.and_where(Expr::col(Alias::new("content_type_id")).eq(content_type.id))
		.and_where(Expr::col(Alias::new("object_id")).eq(object_id.clone()))
		.to_string(SqliteQueryBuilder);
	let total: i64 = sqlx::query(&count_sql).fetch_one(&mut *conn).await?.try_get(0)?;

	let sql = Query::select()
		.columns([
			(log.clone(), Alias::new("id")),
			(log.clone(), Alias::new("action_time")),
			(log.clone(), Alias::new("user_id")),
			(log.clone(), Alias::new("content_type_id")),
			(log.clone(), Alias::new("object_id")),
			(log.clone(), Alias::new("object_repr")),
			(log.clone(), Alias::new("action_flag")),
			(log.clone(), Alias::new("change_message")),
		])
		.column((users.clone(), Alias::new("username")))
		.from(log.clone())
		.inner_join(
			users.clone(),
			Expr::col((users.clone(), Alias::new("id"))).equals((log.clone(), Alias::new("user_id"))),
		)
		.and_where(Expr::col((log.clone(), Alias::new("content_type_id"))).eq(content_type.id))
		.and_where(Expr::col((log.clone(), Alias::new("object_id"))).eq(object_id))
		.order_by((log.clone(), Alias::new("action_time")), Order::Asc)
		.order_by((log, Alias::new("id")), Order::Asc)
		.limit(per_page)
		.offset(page.saturating_sub(1) * per_page)
		.to_string(SqliteQueryBuilder);

	let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
	let mut entries = Vec::with_capacity(rows.len());
	for row in rows {
		let raw_time: String = row.try_get("action_time")?;
		let action_time = DateTime::parse_from_rfc3339(&raw_time)
			.map(|t| t.with_timezone(&Utc))
			.map_err(|e| DeskError::Database(format!("action_time {}: {}", raw_time, e)))?;
		let flag: i16 = row.try_get("action_flag")?;
		entries.push(LogEntry {
			id: row.try_get("id")?,
			action_time,
			user_id: row.try_get("user_id")?,
			username: row.try_get("username")?,
			content_type_id: row.try_get("content_type_id")?,
			object_id: row.try_get::<Option<String>, _>("object_id")?.unwrap_or_default(),
			object_repr: row.try_get("object_repr")?,
			action_flag: ActionFlag::from_i16(flag)
				.ok_or_else(|| DeskError::Database(format!("Unknown action flag {}", flag)))?,
			change_message: row.try_get("change_message")?,
		});
	}
	Ok((entries, total))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contenttypes::get_for_model;
	use crate::users;
	use crate::Database;
	use desk_core::Registry;
	use rstest::rstest;

	#[rstest]
	#[case(1, Some(ActionFlag::Addition))]
	#[case(4, Some(ActionFlag::Closing))]
	#[case(9, None)]
	fn test_flag_from_i16(#[case] raw: i16, #[case] expected: Option<ActionFlag>) {
		assert_eq!(ActionFlag::from_i16(raw), expected);
	}

	#[tokio::test]
	async fn test_history_is_paged_in_order() {
		let db = Database::memory().await.unwrap();
		db.migrate(&Registry::new()).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		let user = users::create_user(&mut conn, "clerk", "secret", false).await.unwrap();
		let ct = get_for_model(&mut conn, "contract", "contract").await.unwrap();

		for (flag, message) in [
			(ActionFlag::Addition, "Added."),
			(ActionFlag::Change, "Number: was: 1 now: 2"),
			(ActionFlag::Closing, "Contract closed"),
		] {
			log_action(&mut conn, user.id, &ct, 7, "K-7", flag, message).await.unwrap();
		}
		log_action(&mut conn, user.id, &ct, 8, "K-8", ActionFlag::Addition, "Added.")
			.await
			.unwrap();

		let (page, total) = history(&mut conn, &ct, 7, 1, 2).await.unwrap();
		assert_eq!(total, 3);
		assert_eq!(page.len(), 2);
		assert_eq!(page[0].action_flag, ActionFlag::Addition);
		assert_eq!(page[1].change_message, "Number: was: 1 now: 2");
		assert_eq!(page[0].username, "clerk");

		let (page, _) = history(&mut conn, &ct, 7, 2, 2).await.unwrap();
		assert_eq!(page.len(), 1);
		assert_eq!(page[0].action_flag, ActionFlag::Closing);
	}
}
