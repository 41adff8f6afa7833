//! List pages with inline editing

use super::account::CONTRACT_LIST_KEY;
use super::{config_app, log, page_context, permissions, require, scoped_contract, slug_models};
use crate::changelist::{ChangeList, PAGE_VAR, Pagination, RecordScope};
use crate::helpers::{
	ContractColumn, Header, RelatedPresence, ResultRow, contract_columns, contract_headers,
	contract_rows, result_headers, result_rows,
};
use crate::messages::{self, Message};
use crate::nav;
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT_LIST_COLUMNS};
use desk_core::registry::capitalize;
use desk_core::{
	DeskError, DeskResult, FieldValue, ModelDescriptor, PermissionSet, Registry, RequestContext,
	Slug,
};
use desk_db::schema::LAST_CHANGE;
use desk_db::{ActionFlag, Filter, QuerySet, SqliteConnection, repo, settings};
use desk_forms::{FormSet, ManagementForm, scope};
use desk_http::{Request, Response};
use serde::Serialize;

/// One table of a list page
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ListTable {
	pub title: String,
	pub headers: Vec<Header>,
	pub rows: Vec<ResultRow>,
	pub pagination: Pagination,
	pub management: Option<ManagementForm>,
	pub non_form_errors: Vec<String>,
}

fn formset_prefix(index: usize) -> String {
	format!("table-{}-form", index)
}

/// Flash text after an inline save of `count` rows
fn changed_message(model: &ModelDescriptor, count: usize) -> String {
	if count == 1 {
		format!("1 {} was successfully changed.", model.verbose_name)
	} else {
		format!("{} {} were successfully changed.", count, model.verbose_name_plural)
	}
}

async fn load_formset_choices(
	conn: &mut SqliteConnection,
	registry: &Registry,
	formset: &mut FormSet,
	contract_id: i64,
) -> DeskResult<()> {
	for form in formset.forms_mut() {
		scope::load_choices(conn, registry, form, contract_id).await?;
	}
	Ok(())
}

/// Write the changed rows of one formset in one transaction
async fn save_formset(
	site: &AdminSite,
	ctx: &RequestContext,
	model: &ModelDescriptor,
	formset: &FormSet,
) -> DeskResult<usize> {
	let registry = site.registry();
	let mut tx = site.db.begin().await?;
	let mut count = 0;
	for form in formset.changed_forms() {
		let mut record = form.instance().clone();
		record.related.clear();
		form.apply(&mut record);
		let message = form.change_message(registry);
		record.set(LAST_CHANGE, FieldValue::Text(message.clone()));
		repo::update(&mut *tx, model, &record).await?;
		let repr = registry.display(form.instance());
		log(&mut *tx, ctx, model, record.id, &repr, ActionFlag::Change, &message).await?;
		count += 1;
	}
	tx.commit().await?;
	if count > 0 {
		tracing::info!(model = model.model_name, count, "Rows changed from list");
	}
	Ok(count)
}

fn list_title(site: &AdminSite, ctx: &RequestContext, models: &[&ModelDescriptor]) -> String {
	match site.catalog.group(&ctx.slug.model) {
		Some(group) => capitalize(group.verbose_name_plural),
		None => models
			.first()
			.map(|model| capitalize(model.verbose_name_plural))
			.unwrap_or_default(),
	}
}

fn add_link(site: &AdminSite, ctx: &RequestContext, perms: PermissionSet) -> Option<(String, String)> {
	if !perms.add || ctx.is_read_only() {
		return None;
	}
	let slug = Slug::new(ctx.slug.model.clone()).with_related_id(ctx.slug.related_id);
	let verbose = match site.catalog.group(&ctx.slug.model) {
		Some(group) => group.verbose_name,
		None => site.registry().get(&ctx.slug.model)?.verbose_name,
	};
	Some((urls::add_url(&ctx.app, &slug)?, format!("Add {}", verbose)))
}

pub(crate) async fn changelist(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let models = slug_models(site, ctx)?;
	let first = *models.first().ok_or_else(DeskError::not_found)?;
	// One-to-one sheets are only reachable through their owner
	require(models.iter().all(|model| model.one_to_one_field().is_none()))?;
	let perms = permissions(ctx, &models);
	require(perms.view)?;

	let mut conn = site.db.acquire().await?;
	let contract = scoped_contract(&mut conn, site, ctx, first).await?;
	if models.len() == 1 && first.model_name == "contract" {
		return contract_list(site, request, ctx, &mut conn, perms).await;
	}

	let app = config_app(ctx);
	let editable = perms.change && !ctx.is_read_only();
	let mut lists = Vec::with_capacity(models.len());
	for (index, model) in models.iter().copied().enumerate() {
		let cl = ChangeList::new(
			&mut conn,
			&site.catalog,
			app,
			model,
			RecordScope::for_model(ctx, model),
			ctx.query_param(PAGE_VAR),
			site.options.list_per_page,
			request.path(),
		)
		.await?;
		let formset = if editable {
			cl.formset(&site.catalog, app, &formset_prefix(index))?
		} else {
			None
		};
		let cl = match formset {
			Some(mut formset) => {
				load_formset_choices(&mut conn, site.registry(), &mut formset, ctx.slug.contract_id()).await?;
				cl.with_formset(formset)
			}
			None => cl,
		};
		lists.push(cl);
	}
	drop(conn);

	if request.is_post() {
		require(lists.iter().any(|cl| cl.formset.is_some()))?;
		let data = request.form_data().await?;
		let mut valid = true;
		for formset in lists.iter_mut().filter_map(|cl| cl.formset.as_mut()) {
			formset.bind(&data);
			valid &= formset.is_valid();
		}
		if valid {
			let mut shown = Vec::new();
			for cl in &lists {
				let Some(formset) = &cl.formset else {
					continue;
				};
				let count = save_formset(site, ctx, cl.model, formset).await?;
				if count > 0 {
					shown.push(Message::success(changed_message(cl.model, count)));
				}
			}
			if shown.is_empty() {
				shown.push(Message::no_changes());
			}
			return messages::redirect_with(&request.full_path(), &shown);
		}
		tracing::debug!(model = %ctx.slug.model, "Inline edit rejected");
	}

	let error_count: usize = lists
		.iter()
		.filter_map(|cl| cl.formset.as_ref())
		.map(FormSet::total_error_count)
		.sum();
	let tables: Vec<ListTable> = lists
		.iter()
		.map(|cl| ListTable {
			title: capitalize(cl.model.verbose_name_plural),
			headers: result_headers(cl),
			rows: result_rows(&site.catalog, ctx, cl),
			pagination: cl.pagination.clone(),
			management: cl.formset.as_ref().map(FormSet::management_form),
			non_form_errors: cl
				.formset
				.as_ref()
				.map(|formset| formset.non_form_errors().to_vec())
				.unwrap_or_default(),
		})
		.collect();

	let mut context = page_context(site, ctx, &list_title(site, ctx, &models));
	context.insert("tables", &tables);
	context.insert("editable", &lists.iter().any(|cl| cl.formset.is_some()));
	context.insert("error_count", &error_count);
	if let Some((url, title)) = add_link(site, ctx, perms) {
		context.insert("add_url", &url);
		context.insert("add_title", &title);
	}
	if let Some(contract) = &contract {
		let repr = site.registry().display(contract);
		context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &repr));
	}
	site.render(request, "change_list.html", context)
}

/// Contract list with the columns the user picked
async fn contract_list(
	site: &AdminSite,
	request: &Request,
	ctx: &RequestContext,
	conn: &mut SqliteConnection,
	perms: PermissionSet,
) -> DeskResult<Response> {
	let registry = site.registry();
	let contract = registry.model("contract")?;
	let stored = settings::load(conn, ctx.user.id).await?;
	let names = stored
		.string_list(CONTRACT_LIST_KEY)
		.unwrap_or_else(|| vec!["number".to_string()]);
	let columns = contract_columns(&site.catalog, ctx, &names);

	let cl = ChangeList::new(
		conn,
		&site.catalog,
		config_app(ctx),
		contract,
		RecordScope::for_model(ctx, contract),
		ctx.query_param(PAGE_VAR),
		site.options.list_per_page,
		request.path(),
	)
	.await?;

	let ids: Vec<i64> = cl.rows.iter().map(|row| row.id).collect();
	let mut present = RelatedPresence::new();
	for (name, column) in &columns {
		let ContractColumn::Related(model) = column else {
			continue;
		};
		let rows = QuerySet::new(registry, model)
			.filter(Filter::is_in("contract", ids.iter().copied()))
			.fetch(conn)
			.await?;
		present.insert(name.clone(), rows.iter().filter_map(|row| row.ref_id("contract")).collect());
	}

	let title = if ctx.is_archive() { "Archive" } else { "Contracts" };
	let mut context = page_context(site, ctx, title);
	context.insert("headers", &contract_headers(&columns));
	context.insert("rows", &contract_rows(&site.catalog, ctx, &columns, &cl.rows, &present));
	context.insert("pagination", &cl.pagination);
	context.insert("columns_url", CONTRACT_LIST_COLUMNS);
	if let Some((url, title)) = add_link(site, ctx, perms) {
		context.insert("add_url", &url);
		context.insert("add_title", &title);
	}
	site.render(request, "contract_list.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use rstest::rstest;

	#[rstest]
	#[case(1, "1 letter was successfully changed.")]
	#[case(3, "3 letters were successfully changed.")]
	fn test_changed_message(#[case] count: usize, #[case] expected: &str) {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		assert_eq!(changed_message(letter, count), expected);
	}

	#[rstest]
	fn test_formset_prefix() {
		assert_eq!(formset_prefix(2), "table-2-form");
	}
}
