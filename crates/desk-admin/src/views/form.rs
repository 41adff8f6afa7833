//! Add, change and view pages of a single record

use super::{
	config_app, done_message, load_object, log, page_context, permissions, relation_paths, require,
	scoped_contract, slug_model, success_url,
};
use crate::messages::{self, Message};
use crate::nav;
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT};
use desk_core::layout::Fieldset;
use desk_core::{
	DeskResult, FieldKind, FieldValue, FormData, ModelDescriptor, PageAction, PermissionSet,
	Record, Registry, RequestContext, Slug,
};
use desk_db::log::logentry_model;
use desk_db::schema::LAST_CHANGE;
use desk_db::{ActionFlag, QuerySet, SqliteConnection, repo};
use desk_forms::{BoundField, ModelForm, scope};
use desk_http::{Request, Response};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct FieldsetView {
	title: String,
	collapsed: bool,
	rows: Vec<Vec<BoundField>>,
}

fn fieldsets(registry: &Registry, form: &ModelForm, declared: Vec<Fieldset>) -> Vec<FieldsetView> {
	declared
		.into_iter()
		.map(|fieldset| FieldsetView {
			title: fieldset.title.to_string(),
			collapsed: fieldset.collapsed,
			rows: fieldset
				.rows
				.iter()
				.map(|row| {
					row.iter()
						.filter_map(|name| form.field(name))
						.map(|field| form.bound_field(registry, field))
						.collect::<Vec<_>>()
				})
				.filter(|row| !row.is_empty())
				.collect(),
		})
		.filter(|fieldset| !fieldset.rows.is_empty())
		.collect()
}

fn page_title(model: &ModelDescriptor, ctx: &RequestContext, editable: bool) -> String {
	let verb = match ctx.action {
		PageAction::Add => "Add",
		_ if editable => "Change",
		_ => "View",
	};
	format!("{} {}", verb, model.verbose_name)
}

/// Rows created together with a new record of `model`
///
/// A new contract gets its calculation sheet.
async fn create_owned(conn: &mut SqliteConnection, registry: &Registry, model: &ModelDescriptor, id: i64) -> DeskResult<()> {
	let owned: Vec<(&ModelDescriptor, &'static str)> = registry
		.models()
		.filter_map(|other| {
			let field = other.one_to_one_field()?;
			(field.related_model() == Some(model.model_name)).then_some((other, field.name))
		})
		.collect();
	for (other, field) in owned {
		let record = Record::new(other.model_name, 0).with_value(field, FieldValue::Ref(id));
		repo::insert(conn, other, &record).await?;
		tracing::debug!(model = other.model_name, owner = id, "Created owned row");
	}
	Ok(())
}

/// Store new uploads of `form` into `record`, removing the files they replace
async fn store_files(site: &AdminSite, form: &ModelForm, record: &mut Record) -> DeskResult<()> {
	for field in form.fields().iter().filter(|f| !f.readonly) {
		let FieldKind::File { upload_to } = &field.descriptor.kind else {
			continue;
		};
		let upload = form.upload(field.name());
		let cleared = form.cleaned(field.name()).is_some_and(FieldValue::is_empty);
		if upload.is_none() && !cleared {
			continue;
		}
		if let FieldValue::File(old) = form.initial(field)
			&& !old.is_empty()
			&& let Err(e) = site.storage.delete(&old).await
		{
			tracing::warn!(file = %old, error = %e, "Failed to remove replaced file");
		}
		match upload {
			Some(upload) => {
				let path = site.storage.save(upload_to, &upload.filename, &upload.bytes).await?;
				record.set(field.name(), FieldValue::File(path));
			}
			None => record.set(field.name(), FieldValue::Null),
		}
	}
	Ok(())
}

async fn save(
	site: &AdminSite,
	request: &Request,
	ctx: &RequestContext,
	model: &ModelDescriptor,
	form: &ModelForm,
	data: &FormData,
) -> DeskResult<Response> {
	let registry = site.registry();
	let adding = form.is_adding();
	let continuing = data.contains("_continue");
	if !adding && !form.has_changed() {
		let location = if continuing {
			request.full_path()
		} else {
			success_url(site, ctx, model)
		};
		return messages::redirect_with(&location, &[Message::no_changes()]);
	}

	let mut record = form.instance().clone();
	record.related.clear();
	form.apply(&mut record);
	if adding && ctx.app == CONTRACT && model.model_name != "contract" && model.field("contract").is_some() {
		record.set("contract", FieldValue::Ref(ctx.slug.contract_id()));
	}
	store_files(site, form, &mut record).await?;
	let message = form.change_message(registry);
	record.set(LAST_CHANGE, FieldValue::Text(message.clone()));

	let mut tx = site.db.begin().await?;
	scope::fill_from_related(&mut *tx, registry, form, &mut record).await?;
	let flag = if adding {
		record.id = repo::insert(&mut *tx, model, &record).await?;
		create_owned(&mut *tx, registry, model, record.id).await?;
		ActionFlag::Addition
	} else {
		repo::update(&mut *tx, model, &record).await?;
		ActionFlag::Change
	};
	let saved = QuerySet::new(registry, model)
		.select_related(&relation_paths(registry, model))
		.get(&mut *tx, record.id)
		.await?;
	let repr = registry.display(&saved);
	log(&mut *tx, ctx, model, saved.id, &repr, flag, &message).await?;
	tx.commit().await?;
	tracing::info!(model = model.model_name, id = saved.id, action = flag.label(), "Record saved");

	let verb = if adding { "added" } else { "changed" };
	let text = done_message(model, &repr, verb, continuing);
	let location = match (continuing, adding) {
		(true, true) => {
			let slug = Slug::new(model.model_name)
				.with_obj_id(saved.id)
				.with_related_id(ctx.slug.related_id);
			urls::change_url(&ctx.app, &slug).unwrap_or_else(|| request.full_path())
		}
		(true, false) => request.full_path(),
		(false, _) => success_url(site, ctx, model),
	};
	messages::redirect_with(&location, &[Message::success(text)])
}

fn object_links(site: &AdminSite, ctx: &RequestContext, model: &ModelDescriptor, perms: PermissionSet) -> tera::Context {
	let mut links = tera::Context::new();
	if PermissionSet::for_model(&ctx.user, &logentry_model()).view
		&& let Some(url) = urls::page_url(&ctx.app, PageAction::History, &ctx.slug)
	{
		links.insert("history_url", &url);
	}
	if perms.delete
		&& site.catalog.is_deletable(model.model_name)
		&& let Some(url) = urls::page_url(&ctx.app, PageAction::Delete, &ctx.slug)
	{
		links.insert("delete_url", &url);
	}
	if model.model_name == "contract"
		&& perms.close
		&& let Some(url) = urls::page_url(&ctx.app, PageAction::Close, &ctx.slug)
	{
		links.insert("close_url", &url);
	}
	links
}

pub(crate) async fn change_form(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let model = slug_model(site, ctx)?;
	let adding = ctx.action == PageAction::Add;
	let perms = permissions(ctx, &[model]);
	if adding {
		// One-to-one sheets are created with their owner
		require(perms.add && model.one_to_one_field().is_none())?;
	} else {
		require(perms.view)?;
	}
	let editable = !ctx.is_read_only() && (adding || perms.change);
	if request.is_post() {
		require(editable)?;
	}

	let registry = site.registry();
	let layout = site.catalog.layout(config_app(ctx), model)?;
	let contract_id = ctx.slug.contract_id();
	let mut conn = site.db.acquire().await?;
	let contract = scoped_contract(&mut conn, site, ctx, model).await?;
	let instance = if adding {
		Record::new(model.model_name, 0)
	} else {
		load_object(&mut conn, site, ctx, model).await?
	};
	let mut form = ModelForm::new(model, &layout, adding)?.with_instance(instance);
	if !editable {
		form = form.all_readonly();
	}
	scope::load_choices(&mut conn, registry, &mut form, contract_id).await?;

	let submitted = if request.is_post() {
		let data = request.form_data().await?;
		form.bind(&data);
		let valid = form.is_valid() && scope::validate(&mut conn, registry, &mut form, contract_id).await?;
		Some((data, valid))
	} else {
		None
	};
	drop(conn);
	if let Some((data, true)) = &submitted {
		return save(site, request, ctx, model, &form, data).await;
	}

	let mut context = page_context(site, ctx, &page_title(model, ctx, editable));
	context.insert("fieldsets", &fieldsets(registry, &form, layout.fieldsets_for(adding)));
	context.insert("non_field_errors", form.non_field_errors());
	context.insert("error_count", &form.errors().values().map(Vec::len).sum::<usize>());
	context.insert("editable", &editable);
	context.insert("adding", &adding);
	context.insert(
		"multipart",
		&form.fields().iter().any(|field| field.descriptor.is_file()),
	);
	context.insert("list_url", &success_url(site, ctx, model));
	if !adding {
		context.insert("object_repr", &registry.display(form.instance()));
		context.extend(object_links(site, ctx, model, perms));
	}
	let sidebar_contract = match (&contract, model.model_name) {
		(Some(contract), _) => Some(contract),
		(None, "contract") if !adding => Some(form.instance()),
		_ => None,
	};
	if let Some(contract) = sidebar_contract {
		let repr = registry.display(contract);
		context.insert("sidebar", &nav::contract_sidebar(&site.catalog, ctx, contract.id, &repr));
	}
	site.render(request, "change_form.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::AuthUser;
	use rstest::rstest;

	#[rstest]
	fn test_fieldsets_skip_fields_the_form_lacks() {
		let catalog = site();
		let contract = catalog.registry.model("contract").unwrap();
		let layout = catalog.layout("contract", contract).unwrap();
		let form = ModelForm::new(contract, &layout, true).unwrap();
		let views = fieldsets(&catalog.registry, &form, layout.fieldsets_for(true));
		assert_eq!(views.len(), 1);
		let names: Vec<&str> = views[0].rows.iter().flatten().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["number", "date", "eosdo", "num_ng", "igk"]);
	}

	#[rstest]
	#[case(PageAction::Add, true, "Add letter")]
	#[case(PageAction::Change, true, "Change letter")]
	#[case(PageAction::Change, false, "View letter")]
	fn test_page_title(#[case] action: PageAction, #[case] editable: bool, #[case] expected: &str) {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let ctx = RequestContext::new(AuthUser::new(1, "anna"), "contract", Slug::new("letter"), action);
		assert_eq!(page_title(letter, &ctx, editable), expected);
	}
}
