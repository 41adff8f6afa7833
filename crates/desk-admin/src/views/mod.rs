//! Page handlers
//!
//! Every handler receives the site, the raw request and an immutable
//! [`RequestContext`]. Permission failures are reported as 404.

pub(crate) mod account;
pub(crate) mod close;
pub(crate) mod delete;
pub(crate) mod form;
pub(crate) mod history;
pub(crate) mod index;
pub(crate) mod list;
pub(crate) mod media;
pub(crate) mod stage;
pub(crate) mod timesheet;
pub(crate) mod valuechange;

use crate::changelist::RecordScope;
use crate::nav;
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT, DATABASE};
use desk_core::registry::capitalize;
use desk_core::{
	DeskError, DeskResult, FieldValue, ModelDescriptor, PermissionSet, Record, Registry,
	RequestContext, Slug,
};
use desk_db::contenttypes::get_for_model;
use desk_db::log::log_action;
use desk_db::{ActionFlag, Filter, QuerySet, SqliteConnection};

/// Frame every page template expects
pub(crate) fn page_context(site: &AdminSite, ctx: &RequestContext, title: &str) -> tera::Context {
	let mut context = tera::Context::new();
	context.insert("title", title);
	context.insert("username", &ctx.user.username);
	context.insert("menu", &nav::main_menu(&site.catalog, ctx));
	context.insert("read_only", &ctx.is_read_only());
	context
}

pub(crate) fn require(allowed: bool) -> DeskResult<()> {
	if allowed {
		Ok(())
	} else {
		Err(DeskError::not_found())
	}
}

/// App whose list settings and models a page works on
pub(crate) fn config_app(ctx: &RequestContext) -> &'static str {
	if ctx.app == DATABASE { DATABASE } else { CONTRACT }
}

fn check_app(ctx: &RequestContext, model: &ModelDescriptor) -> DeskResult<()> {
	require(model.app_label == config_app(ctx))
}

/// Models a list slug stands for: a group's members or one model
pub(crate) fn slug_models<'s>(site: &'s AdminSite, ctx: &RequestContext) -> DeskResult<Vec<&'s ModelDescriptor>> {
	let models = site.catalog.models_for(&ctx.slug.model).map_err(|_| DeskError::not_found())?;
	for model in &models {
		check_app(ctx, model)?;
	}
	Ok(models)
}

/// The model of an object page; groups have none
pub(crate) fn slug_model<'s>(site: &'s AdminSite, ctx: &RequestContext) -> DeskResult<&'s ModelDescriptor> {
	let model = site
		.registry()
		.get(&ctx.slug.model)
		.ok_or_else(DeskError::not_found)?;
	check_app(ctx, model)?;
	Ok(model)
}

/// What the user may do here; archive pages only ever view
pub(crate) fn permissions(ctx: &RequestContext, models: &[&ModelDescriptor]) -> PermissionSet {
	let perms = PermissionSet::for_models(&ctx.user, models);
	if ctx.is_archive() { perms.read_only() } else { perms }
}

/// Contract a sub-record page belongs to, `None` on contract and dictionary pages
///
/// Fails with 404 when the contract is not open (closed on archive pages).
pub(crate) async fn scoped_contract(
	conn: &mut SqliteConnection,
	site: &AdminSite,
	ctx: &RequestContext,
	model: &ModelDescriptor,
) -> DeskResult<Option<Record>> {
	if config_app(ctx) != CONTRACT || model.model_name == "contract" {
		return Ok(None);
	}
	let contract_model = site.registry().model("contract")?;
	let contract = QuerySet::new(site.registry(), contract_model)
		.filters(
			RecordScope::Contracts {
				closed: ctx.is_archive(),
			}
			.filters(),
		)
		.get(conn, ctx.slug.contract_id())
		.await?;
	Ok(Some(contract))
}

/// Relations an object page loads: every relation field and what its text needs
pub(crate) fn relation_paths(registry: &Registry, model: &ModelDescriptor) -> Vec<String> {
	let mut paths = Vec::new();
	for field in model.fields.iter().filter(|f| f.is_relation()) {
		paths.push(field.name.to_string());
		if let Some(target) = field.related_model()
			&& target != model.model_name
		{
			paths.extend(
				registry
					.display_paths(target)
					.into_iter()
					.map(|nested| format!("{}__{}", field.name, nested)),
			);
		}
	}
	paths
}

/// The object a page addresses, within the page's scope
///
/// A one-to-one sheet is found through its owner (the slug's related id).
pub(crate) async fn load_object(
	conn: &mut SqliteConnection,
	site: &AdminSite,
	ctx: &RequestContext,
	model: &ModelDescriptor,
) -> DeskResult<Record> {
	let query = QuerySet::new(site.registry(), model)
		.filters(RecordScope::for_model(ctx, model).filters())
		.select_related(&relation_paths(site.registry(), model));
	match model.one_to_one_field() {
		Some(field) => query
			.filter(Filter::eq(field.name, FieldValue::Ref(ctx.slug.related_id)))
			.first(conn)
			.await?
			.ok_or_else(DeskError::not_found),
		None => query.get(conn, ctx.slug.obj_id).await,
	}
}

/// Flash text after a save or delete
pub(crate) fn done_message(model: &ModelDescriptor, repr: &str, verb: &str, continuing: bool) -> String {
	let mut text = format!("{} {} was successfully {}.", capitalize(model.verbose_name), repr, verb);
	if continuing {
		text.push_str(" You may continue editing.");
	}
	text
}

/// List page to return to after saving or deleting an object of `model`
pub(crate) fn success_url(site: &AdminSite, ctx: &RequestContext, model: &ModelDescriptor) -> String {
	let related_id = ctx.slug.related_id;
	let slug = if let Some(group) = site.catalog.group_of(model.model_name) {
		Slug::new(group.name).with_related_id(related_id)
	} else if model.model_name == "contract" || model.one_to_one_field().is_some() {
		Slug::new("contract")
	} else {
		Slug::new(model.model_name).with_related_id(related_id)
	};
	urls::list_url(&ctx.app, &slug).unwrap_or_else(|| urls::HOME.to_string())
}

/// Append a change log entry for `record`
pub(crate) async fn log(
	conn: &mut SqliteConnection,
	ctx: &RequestContext,
	model: &ModelDescriptor,
	record_id: i64,
	repr: &str,
	flag: ActionFlag,
	message: &str,
) -> DeskResult<()> {
	let content_type = get_for_model(conn, model.app_label, model.model_name).await?;
	log_action(conn, ctx.user.id, &content_type, record_id, repr, flag, message).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{AuthUser, PageAction};
	use rstest::rstest;

	#[rstest]
	fn test_done_message() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		assert_eq!(
			done_message(letter, "L-5", "changed", true),
			"Letter L-5 was successfully changed. You may continue editing."
		);
		assert_eq!(done_message(letter, "L-5", "added", false), "Letter L-5 was successfully added.");
	}

	#[rstest]
	fn test_relation_paths_follow_display() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let paths = relation_paths(&catalog.registry, letter);
		assert!(paths.contains(&"contract".to_string()));
		assert!(paths.contains(&"ispolnitel__employee".to_string()));
	}

	#[rstest]
	fn test_archive_permissions_are_read_only() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let ctx = RequestContext::new(
			AuthUser::new(1, "anna").superuser(),
			"archive",
			Slug::new("letter"),
			PageAction::List,
		);
		let perms = permissions(&ctx, &[letter]);
		assert!(perms.view);
		assert!(!perms.add && !perms.change && !perms.delete);
	}
}
