//! Table definitions
//!
//! Domain tables are derived from the model registry; the auth, content
//! type, change log and user settings tables are fixed.

use desk_core::registry::{FieldKind, ModelDescriptor, OnDelete};
use desk_core::{DeskResult, Registry};
use sea_query::{
	Alias, ColumnDef, ForeignKey, ForeignKeyAction, Index, SqliteQueryBuilder, Table,
	TableCreateStatement,
};
use sqlx::SqliteConnection;

pub const USER_TABLE: &str = "auth_user";
pub const GROUP_TABLE: &str = "auth_group";
pub const USER_GROUPS_TABLE: &str = "auth_user_groups";
pub const USER_PERMISSIONS_TABLE: &str = "auth_user_permissions";
pub const GROUP_PERMISSIONS_TABLE: &str = "auth_group_permissions";
pub const CONTENT_TYPE_TABLE: &str = "django_content_type";
pub const LOG_TABLE: &str = "admin_logentry";
pub const USER_SETTINGS_TABLE: &str = "account_usersettings";

/// Column holding the message of the latest change of a row
pub const LAST_CHANGE: &str = "last_change";

fn id_column() -> ColumnDef {
	ColumnDef::new(Alias::new("id"))
		.integer()
		.not_null()
		.auto_increment()
		.primary_key()
		.to_owned()
}

/// Cascades are carried out by the deletion collector; the database only
/// refuses to orphan a row the collector did not see
fn referential_action(on_delete: OnDelete) -> ForeignKeyAction {
	match on_delete {
		OnDelete::Cascade | OnDelete::Protect => ForeignKeyAction::Restrict,
		OnDelete::SetNull => ForeignKeyAction::SetNull,
	}
}

/// `CREATE TABLE` for a registered model
pub fn model_table(registry: &Registry, model: &ModelDescriptor) -> TableCreateStatement {
	let table = model.table();
	let mut stmt = Table::create();
	stmt.table(Alias::new(&table)).if_not_exists().col(id_column());

	for field in &model.fields {
		let mut column = ColumnDef::new(Alias::new(field.column()));
		match &field.kind {
			FieldKind::Char { .. }
			| FieldKind::Text { .. }
			| FieldKind::Decimal { .. }
			| FieldKind::Date
			| FieldKind::File { .. } => {
				column.text();
			}
			FieldKind::Integer { .. }
			| FieldKind::Choice { .. }
			| FieldKind::ForeignKey { .. }
			| FieldKind::OneToOne { .. } => {
				column.big_integer();
			}
			FieldKind::Boolean => {
				column.boolean().not_null().default(field.default.as_bool());
			}
		}
		if field.unique || matches!(field.kind, FieldKind::OneToOne { .. }) {
			column.unique_key();
		}
		stmt.col(column);

		if let (Some(target), Some(on_delete)) = (field.related_model(), field.on_delete())
			&& let Some(target) = registry.get(target)
		{
			stmt.foreign_key(
				ForeignKey::create()
					.from(Alias::new(&table), Alias::new(field.column()))
					.to(Alias::new(target.table()), Alias::new("id"))
					.on_delete(referential_action(on_delete)),
			);
		}
	}

	stmt.col(
		ColumnDef::new(Alias::new(LAST_CHANGE))
			.text()
			.not_null()
			.default(""),
	);
	stmt.to_owned()
}

fn system_tables() -> Vec<TableCreateStatement> {
	vec![
		Table::create()
			.table(Alias::new(USER_TABLE))
			.if_not_exists()
			.col(id_column())
			.col(ColumnDef::new(Alias::new("username")).text().not_null().unique_key())
			.col(ColumnDef::new(Alias::new("password")).text().not_null())
			.col(ColumnDef::new(Alias::new("first_name")).text().not_null().default(""))
			.col(ColumnDef::new(Alias::new("last_name")).text().not_null().default(""))
			.col(ColumnDef::new(Alias::new("email")).text().not_null().default(""))
			.col(ColumnDef::new(Alias::new("is_active")).boolean().not_null().default(true))
			.col(ColumnDef::new(Alias::new("is_superuser")).boolean().not_null().default(false))
			.col(ColumnDef::new(Alias::new("date_joined")).text().not_null())
			.to_owned(),
		Table::create()
			.table(Alias::new(GROUP_TABLE))
			.if_not_exists()
			.col(id_column())
			.col(ColumnDef::new(Alias::new("name")).text().not_null().unique_key())
			.to_owned(),
		Table::create()
			.table(Alias::new(USER_GROUPS_TABLE))
			.if_not_exists()
			.col(ColumnDef::new(Alias::new("user_id")).big_integer().not_null())
			.col(ColumnDef::new(Alias::new("group_id")).big_integer().not_null())
			.primary_key(
				Index::create()
					.col(Alias::new("user_id"))
					.col(Alias::new("group_id")),
			)
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(USER_GROUPS_TABLE), Alias::new("user_id"))
					.to(Alias::new(USER_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(USER_GROUPS_TABLE), Alias::new("group_id"))
					.to(Alias::new(GROUP_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.to_owned(),
		Table::create()
			.table(Alias::new(USER_PERMISSIONS_TABLE))
			.if_not_exists()
			.col(ColumnDef::new(Alias::new("user_id")).big_integer().not_null())
			.col(ColumnDef::new(Alias::new("permission")).text().not_null())
			.primary_key(
				Index::create()
					.col(Alias::new("user_id"))
					.col(Alias::new("permission")),
			)
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(USER_PERMISSIONS_TABLE), Alias::new("user_id"))
					.to(Alias::new(USER_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.to_owned(),
		Table::create()
			.table(Alias::new(GROUP_PERMISSIONS_TABLE))
			.if_not_exists()
			.col(ColumnDef::new(Alias::new("group_id")).big_integer().not_null())
			.col(ColumnDef::new(Alias::new("permission")).text().not_null())
			.primary_key(
				Index::create()
					.col(Alias::new("group_id"))
					.col(Alias::new("permission")),
			)
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(GROUP_PERMISSIONS_TABLE), Alias::new("group_id"))
					.to(Alias::new(GROUP_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.to_owned(),
		Table::create()
			.table(Alias::new(CONTENT_TYPE_TABLE))
			.if_not_exists()
			.col(id_column())
			.col(ColumnDef::new(Alias::new("app_label")).text().not_null())
			.col(ColumnDef::new(Alias::new("model")).text().not_null())
			.index(
				Index::create()
					.unique()
					.col(Alias::new("app_label"))
					.col(Alias::new("model")),
			)
			.to_owned(),
		Table::create()
			.table(Alias::new(LOG_TABLE))
			.if_not_exists()
			.col(id_column())
			.col(ColumnDef::new(Alias::new("action_time")).text().not_null())
			.col(ColumnDef::new(Alias::new("user_id")).big_integer().not_null())
			.col(ColumnDef::new(Alias::new("content_type_id")).big_integer())
			.col(ColumnDef::new(Alias::new("object_id")).text())
			.col(ColumnDef::new(Alias::new("object_repr")).text().not_null())
			.col(ColumnDef::new(Alias::new("action_flag")).small_integer().not_null())
			.col(ColumnDef::new(Alias::new("change_message")).text().not_null())
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(LOG_TABLE), Alias::new("user_id"))
					.to(Alias::new(USER_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(LOG_TABLE), Alias::new("content_type_id"))
					.to(Alias::new(CONTENT_TYPE_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::SetNull),
			)
			.to_owned(),
		Table::create()
			.table(Alias::new(USER_SETTINGS_TABLE))
			.if_not_exists()
			.col(
				ColumnDef::new(Alias::new("user_id"))
					.big_integer()
					.not_null()
					.primary_key(),
			)
			.col(ColumnDef::new(Alias::new("settings")).text().not_null().default("{}"))
			.foreign_key(
				ForeignKey::create()
					.from(Alias::new(USER_SETTINGS_TABLE), Alias::new("user_id"))
					.to(Alias::new(USER_TABLE), Alias::new("id"))
					.on_delete(ForeignKeyAction::Cascade),
			)
			.to_owned(),
	]
}

/// Create every missing table
pub async fn create_all(conn: &mut SqliteConnection, registry: &Registry) -> DeskResult<()> {
	let statements = system_tables()
		.into_iter()
		.chain(registry.models().map(|model| model_table(registry, model)));

	for stmt in statements {
		let sql = stmt.to_string(SqliteQueryBuilder);
		tracing::debug!(%sql, "Creating table");
		sqlx::query(&sql).execute(&mut *conn).await?;
	}
	tracing::info!(models = registry.models().count(), "Schema is up to date");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use rstest::rstest;

	#[rstest]
	fn test_relation_columns_reference_targets() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let sql = model_table(&catalog.registry, letter).to_string(SqliteQueryBuilder);

		assert!(sql.contains("\"contract_letter\""));
		assert!(sql.contains("\"ispolnitel_id\""));
		assert!(sql.contains("REFERENCES \"contract_member\" (\"id\") ON DELETE SET NULL"));
		assert!(sql.contains("REFERENCES \"contract_contract\" (\"id\") ON DELETE RESTRICT"));
		assert!(!sql.contains("CASCADE"));
		assert!(sql.contains("\"last_change\""));
	}

	#[rstest]
	fn test_protected_relation_restricts() {
		let catalog = site();
		let member = catalog.registry.model("member").unwrap();
		let sql = model_table(&catalog.registry, member).to_string(SqliteQueryBuilder);

		assert!(sql.contains("REFERENCES \"database_employee\" (\"id\") ON DELETE RESTRICT"));
	}
}
