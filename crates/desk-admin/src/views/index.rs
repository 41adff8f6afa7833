//! Home, settings index and app index pages

use super::{page_context, require};
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT, DATABASE, EMPLOYEE};
use desk_core::registry::capitalize;
use desk_core::{
	Catalog, DeskError, DeskResult, PermissionSet, PermissionsMixin, RequestContext, Slug,
};
use desk_http::{Request, Response};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct IndexLink {
	title: String,
	url: String,
	add_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AppSection {
	title: String,
	url: Option<String>,
	models: Vec<IndexLink>,
}

/// Models of `app_label` reachable without a contract, with the user's links
fn app_section(catalog: &Catalog, ctx: &RequestContext, app_label: &str) -> Option<AppSection> {
	let app = catalog.app(app_label)?;
	let mut models: Vec<IndexLink> = catalog
		.registry
		.app_models(app_label)
		.filter(|model| model.field("contract").is_none() && model.one_to_one_field().is_none())
		.filter_map(|model| {
			let perms = PermissionSet::for_model(&ctx.user, model);
			if !perms.any() {
				return None;
			}
			let slug = Slug::new(model.model_name);
			Some(IndexLink {
				title: capitalize(model.verbose_name_plural),
				url: urls::list_url(app_label, &slug)?,
				add_url: perms.add.then(|| urls::add_url(app_label, &slug)).flatten(),
			})
		})
		.collect();
	if models.is_empty() {
		return None;
	}
	models.sort_by_key(|link| link.title.to_lowercase());
	Some(AppSection {
		title: app.verbose_name.to_string(),
		url: urls::app_index(app_label),
		models,
	})
}

pub(crate) fn home(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let mut projects = Vec::new();
	let registry = site.registry();
	let can_view = |name: &str| {
		registry
			.get(name)
			.is_some_and(|model| PermissionSet::for_model(&ctx.user, model).view)
	};
	if can_view("contract")
		&& let Some(url) = urls::list_url(CONTRACT, &Slug::new("contract"))
	{
		projects.push(IndexLink {
			title: "Contracts".to_string(),
			url,
			add_url: None,
		});
	}
	if can_view("employee")
		&& let Some(url) = urls::list_url(EMPLOYEE, &Slug::new("employee"))
	{
		projects.push(IndexLink {
			title: "Employees".to_string(),
			url,
			add_url: None,
		});
	}

	let mut context = page_context(site, ctx, "Projects");
	context.insert("links", &projects);
	site.render(request, "index.html", context)
}

pub(crate) fn settings_index(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	require(ctx.user.has_module_perms(DATABASE))?;
	let sections: Vec<AppSection> = app_section(&site.catalog, ctx, DATABASE).into_iter().collect();
	let mut context = page_context(site, ctx, "Settings");
	context.insert("sections", &sections);
	site.render(request, "app_index.html", context)
}

pub(crate) fn app_index(
	site: &AdminSite,
	request: &Request,
	ctx: &RequestContext,
	app: &str,
) -> DeskResult<Response> {
	require(ctx.user.has_module_perms(app))?;
	let section = app_section(&site.catalog, ctx, app).ok_or_else(DeskError::not_found)?;
	let mut context = page_context(site, ctx, &section.title);
	context.insert("sections", &[section]);
	site.render(request, "app_index.html", context)
}
