//! Per-user account pages

use super::page_context;
use crate::helpers::{contract_relations, relation_label};
use crate::messages::{self, Message};
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT_LIST_COLUMNS};
use desk_core::registry::capitalize;
use desk_core::{Catalog, DeskResult, PermissionSet, RequestContext};
use desk_db::schema::LAST_CHANGE;
use desk_db::settings;
use desk_forms::ColumnSettingsForm;
use desk_http::{Request, Response};
use serde::Serialize;
use serde_json::Value;

/// Settings key of the contract list columns
pub(crate) const CONTRACT_LIST_KEY: &str = "contract_list";
pub const CONTRACT_LIST_COLUMN_COUNT: usize = 9;
pub const SETTINGS_SAVED: &str = "Settings successfully changed.";

const HIDDEN_FIELDS: &[&str] = &["id", LAST_CHANGE, "closed"];

#[derive(Debug, Clone, Serialize)]
struct AccountLink {
	title: &'static str,
	url: &'static str,
}

/// Columns a user may put on the contract list, sorted by label
fn column_choices(catalog: &Catalog, ctx: &RequestContext) -> Vec<(String, String)> {
	let mut choices: Vec<(String, String)> = Vec::new();
	if let Some(contract) = catalog.registry.get("contract") {
		choices.extend(
			contract
				.fields
				.iter()
				.filter(|field| !HIDDEN_FIELDS.contains(&field.name))
				.map(|field| (field.name.to_string(), capitalize(field.label))),
		);
	}
	for model in contract_relations(catalog) {
		if !PermissionSet::for_model(&ctx.user, model).view {
			continue;
		}
		let label = if model.one_to_one_field().is_some() {
			capitalize(model.verbose_name)
		} else {
			relation_label(model)
		};
		choices.push((model.model_name.to_string(), label));
	}
	choices.sort_by_key(|(_, label)| label.to_lowercase());
	choices
}

pub(crate) fn settings_index(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let links = [AccountLink {
		title: "Contract list columns",
		url: CONTRACT_LIST_COLUMNS,
	}];
	let mut context = page_context(site, ctx, "Account settings");
	context.insert("links", &links);
	site.render(request, "account_settings.html", context)
}

pub(crate) async fn contract_columns(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let mut conn = site.db.acquire().await?;
	let mut stored = settings::load(&mut conn, ctx.user.id).await?;
	drop(conn);
	let current = stored.string_list(CONTRACT_LIST_KEY).unwrap_or_default();
	let mut form = ColumnSettingsForm::new(
		column_choices(&site.catalog, ctx),
		&current,
		CONTRACT_LIST_COLUMN_COUNT,
		Some("number"),
	)?;

	if request.is_post() {
		let data = request.form_data().await?;
		form.bind(&data);
		if form.is_valid() {
			if !form.has_changed() {
				return messages::redirect_with(&request.full_path(), &[Message::no_changes()]);
			}
			let picks: Vec<Value> = form.selected().into_iter().map(Value::String).collect();
			stored.set(CONTRACT_LIST_KEY, Value::Array(picks));
			let mut conn = site.db.acquire().await?;
			settings::save(&mut conn, ctx.user.id, &stored).await?;
			tracing::info!(user = %ctx.user.username, "Contract list columns saved");
			return messages::redirect_with(urls::ACCOUNT_SETTINGS, &[Message::success(SETTINGS_SAVED)]);
		}
	}

	let mut context = page_context(site, ctx, "Contract list columns");
	context.insert("fields", &form.fields());
	context.insert("error_count", &form.errors().values().map(Vec::len).sum::<usize>());
	context.insert("cancel_url", urls::ACCOUNT_SETTINGS);
	site.render(request, "column_settings.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{AuthUser, PageAction, Slug};

	fn context(user: AuthUser) -> RequestContext {
		RequestContext::new(user, "", Slug::new("contract"), PageAction::List)
	}

	#[test]
	fn test_column_choices_hide_bookkeeping_fields() {
		let catalog = site();
		let choices = column_choices(&catalog, &context(AuthUser::new(1, "anna").superuser()));
		let names: Vec<&str> = choices.iter().map(|(name, _)| name.as_str()).collect();
		assert!(names.contains(&"number"));
		assert!(names.contains(&"letter"));
		assert!(!names.contains(&"closed"));
		assert!(!names.contains(&LAST_CHANGE));
		let labels: Vec<String> = choices.iter().map(|(_, label)| label.to_lowercase()).collect();
		let mut sorted = labels.clone();
		sorted.sort();
		assert_eq!(labels, sorted);
	}

	#[test]
	fn test_column_choices_skip_lists_without_view() {
		let catalog = site();
		let choices = column_choices(&catalog, &context(AuthUser::new(2, "boris")));
		assert!(choices.iter().all(|(name, _)| catalog.registry.get("contract").unwrap().field(name).is_some()));
	}
}
