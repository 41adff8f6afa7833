//! SQLite connection pool

use crate::schema;
use desk_core::{DeskResult, Registry};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;

/// Mask the password in a database URL for safe display
pub(crate) fn mask_url_password(url: &str) -> String {
	if let Some(scheme_end) = url.find("://") {
		let after_scheme = &url[scheme_end + 3..];
		if let Some(at_pos) = after_scheme.rfind('@') {
			let user_info = &after_scheme[..at_pos];
			if let Some(colon_pos) = user_info.find(':') {
				let scheme_and_user = &url[..scheme_end + 3 + colon_pos + 1];
				let rest = &url[scheme_end + 3 + at_pos..];
				return format!("{}***{}", scheme_and_user, rest);
			}
		}
	}
	url.to_string()
}

/// Handle to the desk database
///
/// Every query function of this crate takes a `&mut SqliteConnection`, so
/// the same code runs on a pooled connection or inside a transaction.
#[derive(Debug, Clone)]
pub struct Database {
	pool: SqlitePool,
}

impl Database {
	/// Open (creating if missing) the database at `url`
	pub async fn connect(url: &str, max_connections: u32) -> DeskResult<Self> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(max_connections.max(1))
			.connect_with(options)
			.await?;
		tracing::info!(url = %mask_url_password(url), "Connected to database");
		Ok(Self { pool })
	}

	/// Private in-memory database
	///
	/// An in-memory SQLite database lives as long as its connection, so the
	/// pool keeps exactly one connection open forever.
	///
	/// # Examples
	///
	/// ```
	/// use desk_db::Database;
	///
	/// # async fn example() {
	/// let db = Database::memory().await.unwrap();
	/// let mut conn = db.acquire().await.unwrap();
	/// let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&mut *conn).await.unwrap();
	/// assert_eq!(one, 1);
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
	/// ```
	pub async fn memory() -> DeskResult<Self> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.min_connections(1)
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await?;
		Ok(Self { pool })
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub async fn acquire(&self) -> DeskResult<PoolConnection<Sqlite>> {
		Ok(self.pool.acquire().await?)
	}

	pub async fn begin(&self) -> DeskResult<Transaction<'static, Sqlite>> {
		Ok(self.pool.begin().await?)
	}

	/// Create every missing table for the registry and the system tables
	pub async fn migrate(&self, registry: &Registry) -> DeskResult<()> {
		let mut conn = self.acquire().await?;
		schema::create_all(&mut conn, registry).await
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}
}
