use anyhow::{Context, bail};
use desk_admin::{AdminRouter, AdminSite, SiteOptions};
use desk_core::catalog::site;
use desk_core::{Action, Registry};
use desk_conf::Settings;
use desk_db::{Database, LocalStorage, users};
use desk_server::{
	BasicAuthMiddleware, CsrfMiddleware, HttpServer, LoggingMiddleware, ShutdownCoordinator, shutdown_signal,
};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const ACTIONS: [Action; 5] = [Action::Add, Action::Change, Action::Delete, Action::View, Action::Close];

async fn open(settings: &Settings) -> anyhow::Result<Database> {
	Database::connect(&settings.database_url, settings.max_connections)
		.await
		.with_context(|| format!("Cannot open database {}", settings.database_url))
}

/// Every `app_label.codename` the catalog defines
fn known_permissions(registry: &Registry) -> BTreeSet<String> {
	registry
		.models()
		.flat_map(|model| {
			ACTIONS
				.iter()
				.map(move |action| format!("{}.{}", model.app_label, action.codename(model.model_name)))
		})
		.collect()
}

pub fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
	if let Some(password) = password {
		return Ok(password);
	}
	print!("Password: ");
	io::stdout().flush()?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	let password = line.trim_end_matches(['\r', '\n']).to_string();
	if password.is_empty() {
		bail!("Password must not be empty");
	}
	Ok(password)
}

pub async fn runserver(settings: &Settings) -> anyhow::Result<()> {
	let catalog = site();
	let db = open(settings).await?;
	db.migrate(&catalog.registry).await?;

	let options = SiteOptions {
		title: settings.site_title.clone(),
		list_per_page: settings.list_per_page,
		history_per_page: settings.history_per_page,
	};
	let storage = Arc::new(LocalStorage::new(&settings.media_root));
	let admin = AdminSite::new(catalog, db.clone(), storage)?.with_options(options);
	let server = HttpServer::new(Arc::new(AdminRouter::new(Arc::new(admin))))
		.with_middleware(Arc::new(LoggingMiddleware::new()))
		.with_middleware(Arc::new(BasicAuthMiddleware::new(db.clone())))
		.with_middleware(Arc::new(
			CsrfMiddleware::new().with_trusted_origins(settings.csrf_trusted_origins.iter().cloned()),
		))
		.with_realm(settings.realm.clone());

	let coordinator = ShutdownCoordinator::new(settings.shutdown_timeout());
	let trigger = coordinator.clone();
	tokio::spawn(async move {
		shutdown_signal().await;
		trigger.shutdown();
	});

	println!("Serving Contract Desk on http://{}", settings.bind);
	server.listen_with_shutdown(settings.bind_addr()?, coordinator.clone()).await?;
	if !coordinator.wait_for_completion().await {
		tracing::warn!("Server did not report completion before the timeout");
	}
	db.close().await;
	Ok(())
}

pub async fn migrate(settings: &Settings) -> anyhow::Result<()> {
	let db = open(settings).await?;
	db.migrate(&site().registry).await?;
	db.close().await;
	println!("Tables are up to date.");
	Ok(())
}

pub async fn createuser(settings: &Settings, username: &str, password: &str, superuser: bool) -> anyhow::Result<()> {
	let db = open(settings).await?;
	db.migrate(&site().registry).await?;
	let mut conn = db.acquire().await?;
	let user = users::create_user(&mut conn, username, password, superuser).await?;
	println!("Created user '{}' (id {}).", user.username, user.id);
	Ok(())
}

pub async fn changepassword(settings: &Settings, username: &str, password: &str) -> anyhow::Result<()> {
	let db = open(settings).await?;
	let mut conn = db.acquire().await?;
	users::set_password(&mut conn, username, password).await?;
	println!("Password of '{}' changed.", username);
	Ok(())
}

pub async fn grant(settings: &Settings, name: &str, permissions: &[String], group: bool) -> anyhow::Result<()> {
	let known = known_permissions(&site().registry);
	if let Some(unknown) = permissions.iter().find(|perm| !known.contains(perm.as_str())) {
		bail!("Unknown permission '{}'", unknown);
	}

	let db = open(settings).await?;
	let mut conn = db.acquire().await?;
	for permission in permissions {
		if group {
			users::grant_group(&mut conn, name, permission).await?;
		} else {
			users::grant_user(&mut conn, name, permission).await?;
		}
	}
	println!("Granted {} permission(s) to '{}'.", permissions.len(), name);
	Ok(())
}

pub async fn addtogroup(settings: &Settings, username: &str, group: &str) -> anyhow::Result<()> {
	let db = open(settings).await?;
	let mut conn = db.acquire().await?;
	users::add_to_group(&mut conn, username, group).await?;
	println!("Added '{}' to group '{}'.", username, group);
	Ok(())
}

pub async fn set_active(settings: &Settings, username: &str, active: bool) -> anyhow::Result<()> {
	let db = open(settings).await?;
	let mut conn = db.acquire().await?;
	users::set_active(&mut conn, username, active).await?;
	println!("User '{}' is now {}.", username, if active { "active" } else { "inactive" });
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use tempfile::TempDir;

	struct Workspace {
		settings: Settings,
		_dir: TempDir,
	}

	#[fixture]
	fn workspace() -> Workspace {
		let dir = TempDir::new().unwrap();
		let settings = Settings {
			database_url: format!("sqlite://{}", dir.path().join("desk.db").display()),
			media_root: dir.path().join("media"),
			..Settings::default()
		};
		Workspace { settings, _dir: dir }
	}

	#[rstest]
	#[case("contract.close_contract", true)]
	#[case("contract.view_letter", true)]
	#[case("contract.fly_letter", false)]
	#[case("view_letter", false)]
	fn test_known_permissions(#[case] permission: &str, #[case] known: bool) {
		assert_eq!(known_permissions(&site().registry).contains(permission), known);
	}

	#[test]
	fn test_given_password_skips_prompt() {
		assert_eq!(password_or_prompt(Some("s3cret".into())).unwrap(), "s3cret");
	}

	#[rstest]
	#[tokio::test]
	async fn test_created_user_signs_in_with_grants(workspace: Workspace) {
		let settings = &workspace.settings;
		createuser(settings, "boris", "s3cret", false).await.unwrap();
		grant(settings, "boris", &["contract.view_contract".to_string()], false).await.unwrap();
		grant(settings, "clerks", &["contract.change_letter".to_string()], true).await.unwrap();
		addtogroup(settings, "boris", "clerks").await.unwrap();
		changepassword(settings, "boris", "n3w").await.unwrap();

		let db = open(settings).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		assert!(users::authenticate(&mut conn, "boris", "s3cret").await.unwrap().is_none());
		let user = users::authenticate(&mut conn, "boris", "n3w").await.unwrap().unwrap();
		assert!(user.permissions.contains("contract.view_contract"));
		assert!(user.group_permissions.contains("contract.change_letter"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_deactivated_user_is_inactive(workspace: Workspace) {
		let settings = &workspace.settings;
		createuser(settings, "anna", "s3cret", true).await.unwrap();
		set_active(settings, "anna", false).await.unwrap();

		let db = open(settings).await.unwrap();
		let mut conn = db.acquire().await.unwrap();
		let user = users::authenticate(&mut conn, "anna", "s3cret").await.unwrap().unwrap();
		assert!(!user.is_active);
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_permission_is_refused(workspace: Workspace) {
		let result = grant(&workspace.settings, "anna", &["contract.fly_letter".to_string()], false).await;
		assert!(result.unwrap_err().to_string().contains("fly_letter"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_user_is_an_error(workspace: Workspace) {
		migrate(&workspace.settings).await.unwrap();
		assert!(set_active(&workspace.settings, "nobody", true).await.is_err());
	}
}
