//! Bulk add page of contract stages

use super::{log, page_context, permissions, relation_paths, require, scoped_contract, slug_models, success_url};
use crate::messages::{self, Message};
use crate::nav;
use crate::site::AdminSite;
use desk_core::{DeskError, DeskResult, RequestContext};
use desk_db::{ActionFlag, QuerySet};
use desk_forms::StageAddForm;
use desk_forms::stage::added_message;
use desk_http::{Request, Response};

pub(crate) async fn add(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let models = slug_models(site, ctx)?;
	let first = *models.first().ok_or_else(DeskError::not_found)?;
	require(permissions(ctx, &models).add && !ctx.is_read_only())?;

	let registry = site.registry();
	let mut conn = site.db.acquire().await?;
	let contract = scoped_contract(&mut conn, site, ctx, first)
		.await?
		.ok_or_else(DeskError::not_found)?;
	let mut form = StageAddForm::load(&mut conn, registry, contract.id).await?;
	drop(conn);

	let list_url = success_url(site, ctx, first);
	if request.is_post() {
		let data = request.form_data().await?;
		form.bind(&data);
		if form.is_valid() {
			if !form.has_changed() {
				return messages::redirect_with(&list_url, &[Message::no_changes()]);
			}
			let mut tx = site.db.begin().await?;
			let saved = form.save(&mut *tx, registry).await?;
			for record in &saved {
				let model = registry.model(&record.model)?;
				let row = QuerySet::new(registry, model)
					.select_related(&relation_paths(registry, model))
					.get(&mut *tx, record.id)
					.await?;
				let repr = registry.display(&row);
				log(&mut *tx, ctx, model, row.id, &repr, ActionFlag::Addition, "").await?;
			}
			tx.commit().await?;
			return messages::redirect_with(&list_url, &[Message::success(added_message(saved.len()))]);
		}
		tracing::debug!(contract_id = contract.id, "Stage form rejected");
	}

	let repr = registry.display(&contract);
	let mut context = page_context(site, ctx, "Add stages");
	context.insert("fields", &form.fields());
	context.insert("error_count", &form.errors().values().map(Vec::len).sum::<usize>());
	context.insert("list_url", &list_url);
	context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &repr));
	site.render(request, "stage_form.html", context)
}
