//! Per-user UI settings
//!
//! One JSON object per user, stored as text. Decoding never fails: a blob
//! that is not a JSON object degrades to an empty mapping.

use crate::schema::USER_SETTINGS_TABLE;
use desk_core::{DeskError, DeskResult};
use sea_query::{Alias, Expr, ExprTrait, OnConflict, Query, SqliteQueryBuilder};
use serde_json::{Map, Value};
use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserSettings {
	values: Map<String, Value>,
}

impl UserSettings {
	/// Parse a stored blob
	///
	/// # Examples
	///
	/// ```
	/// use desk_db::settings::UserSettings;
	///
	/// let settings = UserSettings::decode(r#"{"contract_list": ["number", "date"]}"#);
	/// assert_eq!(settings.string_list("contract_list"), Some(vec!["number".into(), "date".into()]));
	///
	/// assert!(UserSettings::decode("{not valid json").is_empty());
	/// assert!(UserSettings::decode("[1, 2]").is_empty());
	/// ```
	pub fn decode(raw: &str) -> Self {
		match serde_json::from_str::<Value>(raw) {
			Ok(Value::Object(values)) => Self { values },
			Ok(_) => {
				tracing::warn!("User settings are not a JSON object, using defaults");
				Self::default()
			}
			Err(e) => {
				tracing::warn!(error = %e, "Corrupt user settings, using defaults");
				Self::default()
			}
		}
	}

	pub fn encode(&self) -> DeskResult<String> {
		serde_json::to_string(&self.values).map_err(|e| DeskError::Database(e.to_string()))
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.values.insert(key.into(), value);
	}

	/// A list of strings; `None` when absent or of another shape
	pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
		self.values.get(key)?.as_array().and_then(|items| {
			items
				.iter()
				.map(|item| item.as_str().map(str::to_string))
				.collect()
		})
	}
}

pub async fn load(conn: &mut SqliteConnection, user_id: i64) -> DeskResult<UserSettings> {
	let sql = Query::select()
		.column(Alias::new("settings"))
		.from(Alias::new(USER_SETTINGS_TABLE))
		.and_where(Expr::col(Alias::new("user_id")).eq(user_id))
		.to_string(SqliteQueryBuilder);
	let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
	Ok(match row {
		Some(row) => UserSettings::decode(&row.try_get::<String, _>("settings")?),
		None => UserSettings::default(),
	})
}

pub async fn save(conn: &mut SqliteConnection, user_id: i64, settings: &UserSettings) -> DeskResult<()> {
	let sql = Query::insert()
		.into_table(Alias::new(USER_SETTINGS_TABLE))
		.columns([Alias::new("user_id"), Alias::new("settings")])
		.values([Expr::val(user_id), Expr::val(settings.encode()?)])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.on_conflict(
			OnConflict::column(Alias::new("user_id"))
				.update_column(Alias::new("settings"))
				.to_owned(),
		)
		.to_string(SqliteQueryBuilder);
	sqlx::query(&sql).execute(&mut *conn).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Database, users};
	use desk_core::Registry;
	use serde_json::json;

	#[test]
	fn test_wrong_shapes_are_not_lists() {
		let settings = UserSettings::decode(r#"{"a": "x", "b": [1, 2], "c": ["x", 3]}"#);
		assert_eq!(settings.string_list("a"), None);
		assert_eq!(settings.string_list("b"), None);
		assert_eq!(settings.string_list("c"), None);
		assert_eq!(settings.string_list("missing"), None);
	}

	#[tokio::test]
	async fn test_save_then_load() {
		let db = Database::memory().await.unwrap();
		db.migrate(&Registry::new()).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		let user = users::create_user(&mut conn, "clerk", "pw", false).await.unwrap();

		assert!(load(&mut conn, user.id).await.unwrap().is_empty());

		let mut settings = UserSettings::default();
		settings.set("contract_list", json!(["number", "title"]));
		save(&mut conn, user.id, &settings).await.unwrap();
		settings.set("contract_list", json!(["number"]));
		save(&mut conn, user.id, &settings).await.unwrap();

		let loaded = load(&mut conn, user.id).await.unwrap();
		assert_eq!(loaded.string_list("contract_list"), Some(vec!["number".to_string()]));
	}

	#[tokio::test]
	async fn test_corrupt_blob_loads_empty() {
		let db = Database::memory().await.unwrap();
		db.migrate(&Registry::new()).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		let user = users::create_user(&mut conn, "clerk", "pw", false).await.unwrap();
		sqlx::query("INSERT INTO account_usersettings (user_id, settings) VALUES (?, ?)")
			.bind(user.id)
			.bind("{not valid json")
			.execute(&mut *conn)
			.await
			.unwrap();

		assert!(load(&mut conn, user.id).await.unwrap().is_empty());
	}
}
