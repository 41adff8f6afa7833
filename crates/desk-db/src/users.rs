//! Users, groups and permission grants
//!
//! Passwords are stored as Argon2id PHC strings. A loaded [`AuthUser`]
//! carries its direct permissions and those inherited from its groups.

use crate::schema::{
	GROUP_PERMISSIONS_TABLE, GROUP_TABLE, USER_GROUPS_TABLE, USER_PERMISSIONS_TABLE, USER_TABLE,
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use desk_core::{AuthUser, DeskError, DeskResult};
use sea_query::{Alias, Expr, ExprTrait, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};
use std::collections::HashSet;

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> DeskResult<String> {
	let salt = SaltString::generate(&mut OsRng);
	Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| DeskError::Database(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
	PasswordHash::new(hash)
		.map(|parsed| {
			Argon2::default()
				.verify_password(password.as_bytes(), &parsed)
				.is_ok()
		})
		.unwrap_or(false)
}

async fn execute(conn: &mut SqliteConnection, sql: String) -> DeskResult<u64> {
	Ok(sqlx::query(&sql).execute(&mut *conn).await?.rows_affected())
}

async fn user_id(conn: &mut SqliteConnection, username: &str) -> DeskResult<i64> {
	let sql = Query::select()
		.column(Alias::new("id"))
		.from(Alias::new(USER_TABLE))
		.and_where(Expr::col(Alias::new("username")).eq(username))
		.to_string(SqliteQueryBuilder);
	let row = sqlx::query(&sql)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| DeskError::NotFound(format!("User '{}' does not exist", username)))?;
	Ok(row.try_get("id")?)
}

async fn group_id(conn: &mut SqliteConnection, name: &str) -> DeskResult<i64> {
	let insert = Query::insert()
		.into_table(Alias::new(GROUP_TABLE))
		.columns([Alias::new("name")])
		.values([Expr::val(name)])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.on_conflict(OnConflict::column(Alias::new("name")).do_nothing().to_owned())
		.to_string(SqliteQueryBuilder);
	execute(conn, insert).await?;

	let sql = Query::select()
		.column(Alias::new("id"))
		.from(Alias::new(GROUP_TABLE))
		.and_where(Expr::col(Alias::new("name")).eq(name))
		.to_string(SqliteQueryBuilder);
	Ok(sqlx::query(&sql).fetch_one(&mut *conn).await?.try_get("id")?)
}

pub async fn create_user(
	conn: &mut SqliteConnection,
	username: &str,
	password: &str,
	is_superuser: bool,
) -> DeskResult<AuthUser> {
	if username.trim().is_empty() {
		return Err(DeskError::Validation("Username must not be empty.".to_string()));
	}
	let sql = Query::insert()
		.into_table(Alias::new(USER_TABLE))
		.columns([
			Alias::new("username"),
			Alias::new("password"),
			Alias::new("is_active"),
			Alias::new("is_superuser"),
			Alias::new("date_joined"),
		])
		.values([
			Expr::val(username),
			Expr::val(hash_password(password)?),
			Expr::val(true),
			Expr::val(is_superuser),
			Expr::val(Utc::now().to_rfc3339()),
		])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.to_string(SqliteQueryBuilder);
	let id = sqlx::query(&sql)
		.execute(&mut *conn)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(db) if db.is_unique_violation() => {
				DeskError::Validation(format!("User '{}' already exists.", username))
			}
			other => other.into(),
		})?
		.last_insert_rowid();
	tracing::info!(username, is_superuser, "Created user");

	let mut user = AuthUser::new(id, username);
	user.is_superuser = is_superuser;
	Ok(user)
}

pub async fn set_password(conn: &mut SqliteConnection, username: &str, password: &str) -> DeskResult<()> {
	let sql = Query::update()
		.table(Alias::new(USER_TABLE))
		.value(Alias::new("password"), hash_password(password)?)
		.and_where(Expr::col(Alias::new("username")).eq(username))
		.to_string(SqliteQueryBuilder);
	if execute(conn, sql).await? == 0 {
		return Err(DeskError::NotFound(format!("User '{}' does not exist", username)));
	}
	tracing::info!(username, "Password changed");
	Ok(())
}

pub async fn set_active(conn: &mut SqliteConnection, username: &str, active: bool) -> DeskResult<()> {
	let sql = Query::update()
		.table(Alias::new(USER_TABLE))
		.value(Alias::new("is_active"), active)
		.and_where(Expr::col(Alias::new("username")).eq(username))
		.to_string(SqliteQueryBuilder);
	if execute(conn, sql).await? == 0 {
		return Err(DeskError::NotFound(format!("User '{}' does not exist", username)));
	}
	Ok(())
}

async fn permissions(
	conn: &mut SqliteConnection,
	sql: String,
) -> DeskResult<HashSet<String>> {
	let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
	rows.iter()
		.map(|row| row.try_get::<String, _>("permission").map_err(DeskError::from))
		.collect()
}

/// Load a user with its permissions
pub async fn load_user(conn: &mut SqliteConnection, id: i64) -> DeskResult<Option<AuthUser>> {
	let sql = Query::select()
		.columns([
			Alias::new("id"),
			Alias::new("username"),
			Alias::new("is_active"),
			Alias::new("is_superuser"),
		])
		.from(Alias::new(USER_TABLE))
		.and_where(Expr::col(Alias::new("id")).eq(id))
		.to_string(SqliteQueryBuilder);
	let Some(row) = sqlx::query(&sql).fetch_optional(&mut *conn).await? else {
		return Ok(None);
	};

	let mut user = AuthUser::new(row.try_get("id")?, row.try_get::<String, _>("username")?);
	user.is_active = row.try_get("is_active")?;
	user.is_superuser = row.try_get("is_superuser")?;

	user.permissions = permissions(
		conn,
		Query::select()
			.column(Alias::new("permission"))
			.from(Alias::new(USER_PERMISSIONS_TABLE))
			.and_where(Expr::col(Alias::new("user_id")).eq(id))
			.to_string(SqliteQueryBuilder),
	)
	.await?;

	let groups = Query::select()
		.column(Alias::new("group_id"))
		.from(Alias::new(USER_GROUPS_TABLE))
		.and_where(Expr::col(Alias::new("user_id")).eq(id))
		.to_owned();
	user.group_permissions = permissions(
		conn,
		Query::select()
			.column(Alias::new("permission"))
			.from(Alias::new(GROUP_PERMISSIONS_TABLE))
			.and_where(Expr::col(Alias::new("group_id")).in_subquery(groups))
			.to_string(SqliteQueryBuilder),
	)
	.await?;

	Ok(Some(user))
}

/// Check credentials; `None` for an unknown user or a wrong password
pub async fn authenticate(
	conn: &mut SqliteConnection,
	username: &str,
	password: &str,
) -> DeskResult<Option<AuthUser>> {
	let sql = Query::select()
		.columns([Alias::new("id"), Alias::new("password")])
		.from(Alias::new(USER_TABLE))
		.and_where(Expr::col(Alias::new("username")).eq(username))
		.to_string(SqliteQueryBuilder);
	let Some(row) = sqlx::query(&sql).fetch_optional(&mut *conn).await? else {
		return Ok(None);
	};
	let hash: String = row.try_get("password")?;
	if !verify_password(password, &hash) {
		tracing::warn!(username, "Rejected credentials");
		return Ok(None);
	}
	load_user(conn, row.try_get("id")?).await
}

/// Grant `app_label.codename` to a user
pub async fn grant_user(conn: &mut SqliteConnection, username: &str, permission: &str) -> DeskResult<()> {
	let id = user_id(conn, username).await?;
	let sql = Query::insert()
		.into_table(Alias::new(USER_PERMISSIONS_TABLE))
		.columns([Alias::new("user_id"), Alias::new("permission")])
		.values([Expr::val(id), Expr::val(permission)])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.on_conflict(
			OnConflict::columns([Alias::new("user_id"), Alias::new("permission")])
				.do_nothing()
				.to_owned(),
		)
		.to_string(SqliteQueryBuilder);
	execute(conn, sql).await?;
	tracing::info!(username, permission, "Granted permission");
	Ok(())
}

/// Grant a permission to a group, creating the group when missing
pub async fn grant_group(conn: &mut SqliteConnection, group: &str, permission: &str) -> DeskResult<()> {
	let id = group_id(conn, group).await?;
	let sql = Query::insert()
		.into_table(Alias::new(GROUP_PERMISSIONS_TABLE))
		.columns([Alias::new("group_id"), Alias::new("permission")])
		.values([Expr::val(id), Expr::val(permission)])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.on_conflict(
			OnConflict::columns([Alias::new("group_id"), Alias::new("permission")])
				.do_nothing()
				.to_owned(),
		)
		.to_string(SqliteQueryBuilder);
	execute(conn, sql).await?;
	tracing::info!(group, permission, "Granted group permission");
	Ok(())
}

/// Put a user into a group, creating the group when missing
pub async fn add_to_group(conn: &mut SqliteConnection, username: &str, group: &str) -> DeskResult<()> {
	let user = user_id(conn, username).await?;
	let group = group_id(conn, group).await?;
	let sql = Query::insert()
		.into_table(Alias::new(USER_GROUPS_TABLE))
		.columns([Alias::new("user_id"), Alias::new("group_id")])
		.values([Expr::val(user), Expr::val(group)])
		.map_err(|e| DeskError::Database(e.to_string()))?
		.on_conflict(
			OnConflict::columns([Alias::new("user_id"), Alias::new("group_id")])
				.do_nothing()
				.to_owned(),
		)
		.to_string(SqliteQueryBuilder);
	execute(conn, sql).await?;
	Ok(())
}
