//! Change history of one object

use super::{load_object, page_context, permissions, require, scoped_contract, slug_model};
use crate::changelist::{PAGE_VAR, Pagination};
use crate::nav;
use crate::site::AdminSite;
use crate::urls;
use desk_core::{DeskResult, PermissionSet, RequestContext};
use desk_db::contenttypes::get_for_model;
use desk_db::log::{self, LogEntry, logentry_model};
use desk_http::{Request, Response};
use serde::Serialize;

pub const ACTION_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, Serialize)]
struct HistoryRow {
	action_time: String,
	username: String,
	action: &'static str,
	change_message: String,
}

impl From<&LogEntry> for HistoryRow {
	fn from(entry: &LogEntry) -> Self {
		Self {
			action_time: entry.action_time.format(ACTION_TIME_FORMAT).to_string(),
			username: entry.username.clone(),
			action: entry.action_flag.label(),
			change_message: entry.change_message.clone(),
		}
	}
}

pub(crate) async fn history(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let model = slug_model(site, ctx)?;
	require(permissions(ctx, &[model]).view)?;
	require(PermissionSet::for_model(&ctx.user, &logentry_model()).view)?;

	let registry = site.registry();
	let mut conn = site.db.acquire().await?;
	let contract = scoped_contract(&mut conn, site, ctx, model).await?;
	let object = load_object(&mut conn, site, ctx, model).await?;
	let content_type = get_for_model(&mut conn, model.app_label, model.model_name).await?;

	let per_page = site.options.history_per_page;
	let requested = ctx.query_param(PAGE_VAR);
	let first_guess = requested
		.and_then(|raw| raw.trim().parse::<u64>().ok())
		.unwrap_or(1)
		.max(1);
	let (mut entries, total) = log::history(&mut conn, &content_type, object.id, first_guess, per_page).await?;
	let pagination = Pagination::new(total, per_page, requested, request.path());
	if pagination.page != first_guess {
		entries = log::history(&mut conn, &content_type, object.id, pagination.page, per_page).await?.0;
	}
	drop(conn);

	let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
	let repr = registry.display(&object);
	let mut context = page_context(site, ctx, &format!("Change history: {}", repr));
	context.insert("object_repr", &repr);
	context.insert("rows", &rows);
	context.insert("pagination", &pagination);
	context.insert("object_url", &urls::change_url(&ctx.app, &ctx.slug));
	let sidebar_contract = match (&contract, model.model_name) {
		(Some(contract), _) => Some(contract),
		(None, "contract") => Some(&object),
		_ => None,
	};
	if let Some(contract) = sidebar_contract {
		let contract_repr = registry.display(contract);
		context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &contract_repr));
	}
	site.render(request, "object_history.html", context)
}
