//! Employee list and per-day time sheet

use super::list::ListTable;
use super::{page_context, require};
use crate::changelist::{ChangeList, PAGE_VAR, RecordScope, result_url};
use crate::helpers::{result_headers, result_rows};
use crate::messages::{self, Message};
use crate::site::AdminSite;
use crate::urls::{self, CONTRACT, EMPLOYEE};
use chrono::Local;
use desk_core::registry::capitalize;
use desk_core::{DeskResult, PermissionSet, Record, Registry, RequestContext, Slug};
use desk_db::QuerySet;
use desk_forms::timesheet::{self, not_involved_message, sheet_date};
use desk_forms::{BoundField, FormSet, TimeSheetForm};
use desk_http::{Request, Response};
use serde::Serialize;

/// One contract line of the sheet
#[derive(Debug, Clone, Serialize)]
struct SheetRow {
	contract: String,
	contract_url: Option<String>,
	pk_name: Option<String>,
	pk_value: i64,
	fields: Vec<BoundField>,
}

fn sheet_rows(registry: &Registry, ctx: &RequestContext, formset: &FormSet) -> DeskResult<Vec<SheetRow>> {
	let timework = registry.model("timework")?;
	Ok(formset
		.forms()
		.iter()
		.map(|form| {
			let row = form.instance();
			SheetRow {
				contract: row
					.related("contract")
					.map(|contract| registry.display(contract))
					.unwrap_or_default(),
				contract_url: result_url(ctx, timework, row),
				pk_name: row.is_saved().then(|| form.add_prefix("id")),
				pk_value: row.id,
				fields: form.bound_fields(registry),
			}
		})
		.collect())
}

fn employees_list_url() -> String {
	urls::list_url(EMPLOYEE, &Slug::new("employee")).unwrap_or_else(|| urls::HOME.to_string())
}

pub(crate) async fn employees(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	require(ctx.slug.model == "employee")?;
	let employee = site.registry().model("employee")?;
	require(PermissionSet::for_model(&ctx.user, employee).view)?;

	let mut conn = site.db.acquire().await?;
	let cl = ChangeList::new(
		&mut conn,
		&site.catalog,
		CONTRACT,
		employee,
		RecordScope::for_model(ctx, employee),
		ctx.query_param(PAGE_VAR),
		site.options.list_per_page,
		request.path(),
	)
	.await?;
	drop(conn);

	let mut context = page_context(site, ctx, "Time sheet");
	let table = ListTable {
		title: capitalize(employee.verbose_name_plural),
		headers: result_headers(&cl),
		rows: result_rows(&site.catalog, ctx, &cl),
		pagination: cl.pagination.clone(),
		management: None,
		non_form_errors: Vec::new(),
	};
	context.insert("tables", &[table]);
	context.insert("editable", &false);
	context.insert("error_count", &0);
	site.render(request, "change_list.html", context)
}

pub(crate) async fn sheet(site: &AdminSite, request: &Request, ctx: &RequestContext) -> DeskResult<Response> {
	let registry = site.registry();
	let employee_model = registry.model("employee")?;
	let timework = registry.model("timework")?;
	require(ctx.slug.model == "timework")?;
	require(PermissionSet::for_model(&ctx.user, employee_model).view)?;
	let perms = PermissionSet::for_model(&ctx.user, timework);
	require(perms.view)?;
	if request.is_post() {
		require(perms.change)?;
	}

	let today = Local::now().date_naive();
	let date = sheet_date(ctx.query_param("date"), today)?;
	let mut conn = site.db.acquire().await?;
	let employee: Record = QuerySet::new(registry, employee_model)
		.filters(RecordScope::Visible.filters())
		.select_related(&["post", "division"])
		.get(&mut conn, ctx.slug.obj_id)
		.await?;
	let (rows, extra) = timesheet::load_rows(&mut conn, registry, employee.id, date).await?;
	drop(conn);

	let employee_repr = registry.display(&employee);
	let involved = !rows.is_empty() || !extra.is_empty();
	let mut header = TimeSheetForm::new(employee, date);
	let mut formset = timesheet::formset(registry, rows, extra)?;

	if request.is_post() {
		require(involved)?;
		let data = request.form_data().await?;
		header.bind(&data);
		formset.bind(&data);
		let header_valid = header.is_valid();
		if formset.is_valid() && header_valid {
			let location = if data.contains("_continue") {
				request.full_path()
			} else {
				employees_list_url()
			};
			if !formset.has_changed() {
				return messages::redirect_with(&location, &[Message::no_changes()]);
			}
			let mut tx = site.db.begin().await?;
			let written = timesheet::save(&mut *tx, registry, &formset, header.date()).await?;
			tx.commit().await?;
			tracing::info!(employee = %employee_repr, date = %header.date(), rows = written, "Time sheet saved");
			let text = format!("Time sheet of {} was successfully changed.", employee_repr);
			return messages::redirect_with(&location, &[Message::success(text)]);
		}
		tracing::debug!(employee = %employee_repr, "Time sheet rejected");
	}

	let mut context = page_context(site, ctx, &format!("Time sheet: {}", employee_repr));
	context.insert("header", &header.bound_fields(registry));
	context.insert("list_url", &employees_list_url());
	if involved {
		context.insert("rows", &sheet_rows(registry, ctx, &formset)?);
		context.insert("management", &formset.management_form());
		context.insert("non_form_errors", formset.non_form_errors());
		context.insert(
			"error_count",
			&(formset.total_error_count() + header.errors().values().map(Vec::len).sum::<usize>()),
		);
		context.insert("editable", &perms.change);
	} else {
		context.insert("not_involved", &not_involved_message(&employee_repr));
	}
	site.render(request, "timesheet.html", context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::catalog::site;
	use desk_core::{AuthUser, FieldValue, PageAction};

	#[test]
	fn test_sheet_rows_link_contracts_and_mark_saved_rows() {
		let catalog = site();
		let contract = Record::new("contract", 4).with_value("number", FieldValue::Text("K-4".into()));
		let saved = Record::new("timework", 9)
			.with_value("contract", FieldValue::Ref(4))
			.with_related("contract", contract.clone());
		let extra = Record::new("timework", 0)
			.with_value("contract", FieldValue::Ref(4))
			.with_related("contract", contract);
		let formset = timesheet::formset(&catalog.registry, vec![saved], vec![extra]).unwrap();
		let ctx = RequestContext::new(
			AuthUser::new(1, "anna").superuser(),
			EMPLOYEE,
			Slug::new("timework").with_obj_id(2),
			PageAction::Change,
		);
		let rows = sheet_rows(&catalog.registry, &ctx, &formset).unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0].contract_url.as_deref(), Some("/contract/contract-4-0/change/"));
		assert_eq!(rows[0].pk_name.as_deref(), Some("table-0-form-0-id"));
		assert_eq!(rows[1].pk_name, None);
		assert_eq!(rows[1].fields.len(), 1);
	}
}
