//! Closing a contract moves it to the archive

use super::{load_object, log, page_context, permissions, require, slug_model};
use crate::messages::{self, Message};
use crate::nav;
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT};
use desk_core::{DeskResult, FieldValue, RequestContext, Slug};
use desk_db::{ActionFlag, repo};
use desk_http::{Request, Response};

pub const CLOSE_LOG_MESSAGE: &str = "Contract closed";

fn closed_message(repr: &str) -> String {
	format!("Contract {} successfully closed. You can view it in the archive", repr)
}

pub(crate) async fn close(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let model = slug_model(site, ctx)?;
	require(model.model_name == "contract")?;
	require(permissions(ctx, &[model]).close)?;

	let registry = site.registry();
	let mut conn = site.db.acquire().await?;
	let contract = load_object(&mut conn, site, ctx, model).await?;
	let repr = registry.display(&contract);
	drop(conn);

	if request.is_post() {
		let mut tx = site.db.begin().await?;
		repo::set_field(&mut *tx, model, "closed", &FieldValue::Bool(true), &[contract.id]).await?;
		log(&mut *tx, ctx, model, contract.id, &repr, ActionFlag::Closing, CLOSE_LOG_MESSAGE).await?;
		tx.commit().await?;
		tracing::info!(contract_id = contract.id, user = %ctx.user.username, "Contract closed");
		let location = urls::list_url(CONTRACT, &Slug::new("contract")).unwrap_or_else(|| urls::HOME.to_string());
		return messages::redirect_with(&location, &[Message::success(closed_message(&repr))]);
	}

	let mut context = page_context(site, ctx, "Close contract");
	context.insert("object_repr", &repr);
	context.insert("cancel_url", &urls::change_url(&ctx.app, &ctx.slug));
	context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &repr));
	site.render(request, "close_confirmation.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_closed_message() {
		assert_eq!(
			closed_message("K-12"),
			"Contract K-12 successfully closed. You can view it in the archive"
		);
	}
}
