//! Delete confirmation

use super::{
	done_message, load_object, log, page_context, permissions, require, scoped_contract, slug_model,
	success_url,
};
use crate::messages::{self, Message};
use crate::nav;
use crate::site::AdminSite;
use crate::urls;
use desk_core::registry::capitalize;
use desk_core::{DeskResult, Record, Registry, RequestContext};
use desk_db::{ActionFlag, Collector};
use desk_http::{Request, Response};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct SummaryLine {
	name: String,
	count: usize,
}

/// Stored files of the rows about to be deleted
fn stored_files(registry: &Registry, rows: &[Record]) -> Vec<String> {
	rows.iter()
		.filter_map(|row| registry.get(&row.model).map(|model| (row, model)))
		.flat_map(|(row, model)| {
			model
				.file_fields()
				.filter_map(|field| row.get(field.name).as_text().map(str::to_string))
				.filter(|path| !path.is_empty())
				.collect::<Vec<_>>()
		})
		.collect()
}

fn describe(registry: &Registry, row: &Record) -> String {
	let name = registry
		.get(&row.model)
		.map(|model| capitalize(model.verbose_name))
		.unwrap_or_else(|| row.model.clone());
	format!("{}: {}", name, registry.display(row))
}

pub(crate) async fn delete(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let model = slug_model(site, ctx)?;
	let perms = permissions(ctx, &[model]);
	require(perms.delete && site.catalog.is_deletable(model.model_name))?;

	let registry = site.registry();
	// Collect and delete on one transaction; dropping it rolls back
	let mut tx = site.db.begin().await?;
	let contract = scoped_contract(&mut *tx, site, ctx, model).await?;
	let object = load_object(&mut *tx, site, ctx, model).await?;
	let repr = registry.display(&object);
	let mut collector = Collector::new(&site.catalog);
	collector.collect(&mut *tx, object.clone()).await?;

	if request.is_post() && collector.can_delete() {
		let files = stored_files(registry, collector.deletions());
		let deleted = collector.delete(&mut *tx).await?;
		log(&mut *tx, ctx, model, object.id, &repr, ActionFlag::Deletion, "").await?;
		tx.commit().await?;
		for file in files {
			if let Err(e) = site.storage.delete(&file).await {
				tracing::warn!(file = %file, error = %e, "Failed to remove file of deleted row");
			}
		}
		tracing::info!(model = model.model_name, id = object.id, rows = deleted.len(), "Record deleted");
		let text = done_message(model, &repr, "deleted", false);
		return messages::redirect_with(&success_url(site, ctx, model), &[Message::success(text)]);
	}
	drop(tx);

	let summary: Vec<SummaryLine> = collector
		.summary()
		.into_iter()
		.map(|(name, count)| SummaryLine { name, count })
		.collect();
	let protected: Vec<String> = collector
		.protected()
		.iter()
		.map(|row| describe(registry, row))
		.collect();

	let mut context = page_context(site, ctx, &format!("Delete {}", model.verbose_name));
	context.insert("object_repr", &repr);
	context.insert("verbose_name", model.verbose_name);
	context.insert("summary", &summary);
	context.insert("protected", &protected);
	context.insert("cancel_url", &urls::change_url(&ctx.app, &ctx.slug));
	if let Some(contract) = &contract {
		let contract_repr = registry.display(contract);
		context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &contract_repr));
	}
	site.render(request, "delete_confirmation.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::FieldValue;
	use desk_core::catalog::site;

	#[test]
	fn test_stored_files_skip_empty_paths() {
		let catalog = site();
		let rows = vec![
			Record::new("letter", 1).with_value("file", FieldValue::File("document/a.pdf".into())),
			Record::new("letter", 2).with_value("file", FieldValue::File(String::new())),
			Record::new("member", 3),
		];
		assert_eq!(stored_files(&catalog.registry, &rows), vec!["document/a.pdf".to_string()]);
	}
}
