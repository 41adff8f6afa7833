//! Main menu and the contract sidebar

use crate::helpers::{contract_relations, relation_label};
use crate::urls::{self, ARCHIVE, CONTRACT, EMPLOYEE};
use desk_core::registry::capitalize;
use desk_core::{Catalog, ModelDescriptor, PermissionSet, PermissionsMixin, RequestContext, Slug};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
	pub title: String,
	pub url: String,
	pub active: bool,
}

fn can_view(catalog: &Catalog, ctx: &RequestContext, model: &str) -> bool {
	catalog
		.registry
		.get(model)
		.is_some_and(|model| PermissionSet::for_model(&ctx.user, model).view)
}

/// Top menu entries the user can reach; the entry owning the current path is active
pub fn main_menu(catalog: &Catalog, ctx: &RequestContext) -> Vec<MenuItem> {
	let contracts = Slug::new("contract");
	// (title, address, path prefix the entry owns)
	let mut entries: Vec<(&str, Option<String>, &str)> =
		vec![("Projects", Some(urls::HOME.to_string()), "")];
	if can_view(catalog, ctx, "contract") {
		entries.push(("Contracts", urls::list_url(CONTRACT, &contracts), "/contract/"));
	}
	if can_view(catalog, ctx, "employee") {
		entries.push((
			"Time sheet",
			urls::list_url(EMPLOYEE, &Slug::new("employee")),
			"/employee/",
		));
	}
	if can_view(catalog, ctx, "contract") {
		entries.push(("Archive", urls::list_url(ARCHIVE, &contracts), "/archive/"));
	}
	if ctx.user.has_module_perms("database") {
		entries.push(("Settings", Some(urls::SETTINGS_INDEX.to_string()), "/settings/"));
	}
	entries.push(("Account", Some(urls::ACCOUNT_SETTINGS.to_string()), "/account/"));

	let path = ctx.full_path.as_str();
	entries
		.into_iter()
		.filter_map(|(title, url, section)| {
			let active = if section.is_empty() {
				path == urls::HOME
			} else {
				path.starts_with(section)
			};
			Some(MenuItem {
				title: title.to_string(),
				url: url?,
				active,
			})
		})
		.collect()
}

/// A related list of the current contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarLink {
	pub name: String,
	pub title: String,
	pub url: Option<String>,
	pub add_url: Option<String>,
	pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sidebar {
	pub contract: String,
	pub contract_url: Option<String>,
	pub links: Vec<SidebarLink>,
}

fn sidebar_link(
	ctx: &RequestContext,
	contract_id: i64,
	name: &str,
	title: String,
	models: &[&ModelDescriptor],
) -> Option<SidebarLink> {
	let perms = PermissionSet::for_models(&ctx.user, models);
	if !perms.view {
		return None;
	}
	let is_sheet = models.len() == 1 && models[0].one_to_one_field().is_some();
	let url = if is_sheet {
		let slug = Slug::new(name).with_obj_id(contract_id).with_related_id(contract_id);
		urls::change_url(&ctx.app, &slug)
	} else {
		urls::list_url(&ctx.app, &Slug::new(name).with_related_id(contract_id))
	};
	let add_url = (!is_sheet && perms.add && !ctx.is_read_only())
		.then(|| urls::add_url(&ctx.app, &Slug::new(name).with_related_id(contract_id)))
		.flatten();
	Some(SidebarLink {
		name: name.to_string(),
		title,
		url,
		add_url,
		active: ctx.slug.model == name,
	})
}

/// Related lists of a contract the user may view, sorted by title
pub fn contract_sidebar(catalog: &Catalog, ctx: &RequestContext, contract_id: i64, contract_repr: &str) -> Sidebar {
	let mut links: Vec<SidebarLink> = contract_relations(catalog)
		.into_iter()
		.filter_map(|model| {
			let title = if model.one_to_one_field().is_some() {
				capitalize(model.verbose_name)
			} else {
				relation_label(model)
			};
			sidebar_link(ctx, contract_id, model.model_name, title, &[model])
		})
		.collect();

	for group in catalog.groups() {
		let Ok(models) = catalog.models_for(group.name) else {
			continue;
		};
		if let Some(link) = sidebar_link(
			ctx,
			contract_id,
			group.name,
			capitalize(group.verbose_name_plural),
			&models,
		) {
			links.push(link);
		}
	}
	links.sort_by_key(|link| link.title.to_lowercase());

	Sidebar {
		contract: contract_repr.to_string(),
		contract_url: urls::change_url(&ctx.app, &Slug::new("contract").with_obj_id(contract_id)),
		links,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{AuthUser, PageAction};
	use rstest::rstest;

	fn context(user: AuthUser, app: &str, path: &str) -> RequestContext {
		RequestContext::new(user, app, Slug::new("letter").with_related_id(3), PageAction::List)
			.with_full_path(path)
	}

	#[rstest]
	fn test_menu_for_superuser() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "archive", "/archive/contract/contract-0-0/");
		let menu = main_menu(&catalog, &ctx);
		let titles: Vec<&str> = menu.iter().map(|item| item.title.as_str()).collect();
		assert_eq!(titles, vec!["Projects", "Contracts", "Time sheet", "Archive", "Settings", "Account"]);
		let active: Vec<&str> = menu.iter().filter(|i| i.active).map(|i| i.title.as_str()).collect();
		assert_eq!(active, vec!["Archive"]);
	}

	#[rstest]
	fn test_menu_hides_unreachable_entries() {
		let catalog = site();
		let ctx = context(AuthUser::new(2, "boris"), "contract", "/");
		let menu = main_menu(&catalog, &ctx);
		let titles: Vec<&str> = menu.iter().map(|item| item.title.as_str()).collect();
		assert_eq!(titles, vec!["Projects", "Account"]);
		assert!(menu[0].active);
	}

	#[rstest]
	fn test_sidebar_links() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "contract", "/contract/letter-0-3/");
		let sidebar = contract_sidebar(&catalog, &ctx, 3, "K-3");

		let letters = sidebar.links.iter().find(|l| l.name == "letter").unwrap();
		assert_eq!(letters.url.as_deref(), Some("/contract/letter-0-3/"));
		assert_eq!(letters.add_url.as_deref(), Some("/contract/letter-0-3/add/"));
		assert!(letters.active);

		let sheet = sidebar.links.iter().find(|l| l.name == "calculation").unwrap();
		assert_eq!(sheet.url.as_deref(), Some("/contract/calculation-3-3/change/"));
		assert_eq!(sheet.add_url, None);

		assert!(sidebar.links.iter().any(|l| l.name == "stage"));
		let titles: Vec<String> = sidebar.links.iter().map(|l| l.title.to_lowercase()).collect();
		let mut sorted = titles.clone();
		sorted.sort();
		assert_eq!(titles, sorted);
	}

	#[rstest]
	fn test_sidebar_group_needs_every_model() {
		let catalog = site();
		let user = AuthUser::new(2, "boris")
			.with_perm("contract.view_stagebeginlist")
			.with_perm("contract.view_stagemiddlelist");
		let ctx = context(user, "contract", "/contract/contract-3-0/change/");
		let sidebar = contract_sidebar(&catalog, &ctx, 3, "K-3");
		assert!(sidebar.links.is_empty());
	}

	#[rstest]
	fn test_archive_sidebar_is_read_only() {
		let catalog = site();
		let ctx = context(AuthUser::new(1, "anna").superuser(), "archive", "/archive/contract/letter-0-3/");
		let sidebar = contract_sidebar(&catalog, &ctx, 3, "K-3");
		assert!(sidebar.links.iter().all(|l| l.add_url.is_none()));
		assert_eq!(sidebar.contract_url.as_deref(), Some("/archive/contract/contract-3-0/view/"));
	}
}
