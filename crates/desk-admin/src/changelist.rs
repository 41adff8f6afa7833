//! Changelist assembly
//!
//! A [`ChangeList`] is built per list render: it resolves the model's list
//! configuration for the app, selects one page of rows under a
//! [`RecordScope`] with the declared relations loaded, and can attach a
//! formset over the editable columns.

use crate::urls::{self, CONTRACT, EMPLOYEE};
use desk_core::registry::capitalize;
use desk_core::{
	Catalog, DeskResult, FieldValue, ListConfig, ModelDescriptor, PageAction, Record,
	RequestContext, ResolvedFields, Slug,
};
use desk_db::{Filter, QuerySet, SqliteConnection};
use desk_forms::FormSet;
use serde::Serialize;

/// Query parameter holding the page number
pub const PAGE_VAR: &str = "p";

/// Which rows of a model a page may show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
	All,
	/// Rows whose `view` flag is set
	Visible,
	/// Contracts with the given `closed` flag
	Contracts { closed: bool },
	/// Rows of one contract, provided the contract has the given `closed` flag
	ContractRows { contract_id: i64, closed: bool },
}

impl RecordScope {
	/// Scope of `model` on the page described by `ctx`
	///
	/// # Examples
	///
	/// ```
	/// use desk_admin::RecordScope;
	/// use desk_core::catalog::site;
	/// use desk_core::{AuthUser, PageAction, RequestContext, Slug};
	///
	/// let catalog = site();
	/// let letter = catalog.registry.model("letter").unwrap();
	/// let slug = Slug::new("letter").with_related_id(7);
	/// let ctx = RequestContext::new(AuthUser::new(1, "anna"), "archive", slug, PageAction::List);
	/// assert_eq!(
	///     RecordScope::for_model(&ctx, letter),
	///     RecordScope::ContractRows { contract_id: 7, closed: true }
	/// );
	/// ```
	pub fn for_model(ctx: &RequestContext, model: &ModelDescriptor) -> Self {
		let closed = ctx.is_archive();
		if ctx.app == EMPLOYEE && model.model_name == "employee" {
			return RecordScope::Visible;
		}
		if model.app_label != CONTRACT {
			return RecordScope::All;
		}
		if model.model_name == "contract" {
			return RecordScope::Contracts { closed };
		}
		if model.field("contract").is_some() {
			return RecordScope::ContractRows {
				contract_id: ctx.slug.contract_id(),
				closed,
			};
		}
		RecordScope::All
	}

	pub fn filters(&self) -> Vec<Filter> {
		match *self {
			RecordScope::All => Vec::new(),
			RecordScope::Visible => vec![Filter::eq("view", FieldValue::Bool(true))],
			RecordScope::Contracts { closed } => {
				vec![Filter::eq("closed", FieldValue::Bool(closed))]
			}
			RecordScope::ContractRows {
				contract_id,
				closed,
			} => vec![
				Filter::eq("contract", FieldValue::Ref(contract_id)),
				Filter::related("contract", vec![Filter::eq("closed", FieldValue::Bool(closed))]),
			],
		}
	}
}

/// Page position of a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
	pub page: u64,
	pub num_pages: u64,
	pub count: i64,
	pub per_page: u64,
	pub previous_url: Option<String>,
	pub next_url: Option<String>,
}

impl Pagination {
	/// Clamp the requested page into range; unreadable numbers mean page 1
	///
	/// # Examples
	///
	/// ```
	/// use desk_admin::Pagination;
	///
	/// let pagination = Pagination::new(250, 100, Some("9"), "/contract/letter-0-3/");
	/// assert_eq!(pagination.page, 3);
	/// assert_eq!(pagination.offset(), 200);
	/// assert_eq!(pagination.previous_url.as_deref(), Some("/contract/letter-0-3/?p=2"));
	/// assert_eq!(pagination.next_url, None);
	///
	/// assert_eq!(Pagination::new(0, 100, Some("x"), "/").num_pages, 1);
	/// ```
	pub fn new(count: i64, per_page: u64, requested: Option<&str>, path: &str) -> Self {
		let per_page = per_page.max(1);
		let count_pages = (count.max(0) as u64).div_ceil(per_page);
		let num_pages = count_pages.max(1);
		let page = requested
			.and_then(|raw| raw.trim().parse::<u64>().ok())
			.unwrap_or(1)
			.clamp(1, num_pages);
		let link = |page: u64| format!("{}?{}={}", path, PAGE_VAR, page);
		Self {
			page,
			num_pages,
			count,
			per_page,
			previous_url: (page > 1).then(|| link(page - 1)),
			next_url: (page < num_pages).then(|| link(page + 1)),
		}
	}

	pub fn offset(&self) -> u64 {
		(self.page - 1) * self.per_page
	}
}

/// Names of `model` fields as the form layer wants them
fn static_names(model: &ModelDescriptor, names: &[String]) -> Vec<&'static str> {
	names
		.iter()
		.filter_map(|name| model.field(name).map(|field| field.name))
		.collect()
}

/// Relation paths a list must load: the declared ones plus what relation
/// columns need to render as text
fn related_paths(catalog: &Catalog, model: &ModelDescriptor, config: &ListConfig, columns: &[String]) -> Vec<String> {
	let mut paths = config.fields_related.clone();
	for column in columns {
		let Some(target) = model.field(column).and_then(|f| f.related_model()) else {
			continue;
		};
		let nested = catalog
			.registry
			.display_paths(target)
			.into_iter()
			.map(|path| format!("{}__{}", column, path));
		for path in std::iter::once(column.clone()).chain(nested) {
			if !paths.contains(&path) {
				paths.push(path);
			}
		}
	}
	paths
}

/// One page of a model's rows under a scope
#[derive(Debug, Clone)]
pub struct ChangeList<'a> {
	pub model: &'a ModelDescriptor,
	pub config: ListConfig,
	pub fields: ResolvedFields,
	pub scope: RecordScope,
	pub rows: Vec<Record>,
	pub pagination: Pagination,
	pub formset: Option<FormSet>,
}

impl<'a> ChangeList<'a> {
	/// Select the page `page` of `model`'s rows as listed in `config_app`
	///
	/// Fails with a configuration error when the list settings do not
	/// resolve.
	#[allow(clippy::too_many_arguments)]
	pub async fn new(
		conn: &mut SqliteConnection,
		catalog: &'a Catalog,
		config_app: &str,
		model: &'a ModelDescriptor,
		scope: RecordScope,
		page: Option<&str>,
		per_page: u64,
		path: &str,
	) -> DeskResult<Self> {
		let config = catalog.list_config(config_app, model.model_name);
		let fields = config.resolve(&capitalize(model.verbose_name))?;
		let query = QuerySet::new(&catalog.registry, model)
			.filters(scope.filters())
			.select_related(&related_paths(catalog, model, &config, &fields.display));

		let count = query.count(conn).await?;
		let pagination = Pagination::new(count, per_page, page, path);
		let rows = query
			.limit(pagination.per_page)
			.offset(pagination.offset())
			.fetch(conn)
			.await?;
		tracing::debug!(model = model.model_name, count, page = pagination.page, "Built changelist");

		Ok(Self {
			model,
			config,
			fields,
			scope,
			rows,
			pagination,
			formset: None,
		})
	}

	pub fn result_count(&self) -> i64 {
		self.pagination.count
	}

	pub fn is_editable(&self) -> bool {
		!self.fields.editable.is_empty()
	}

	/// Unbound formset over the editable columns of the shown rows
	pub fn formset(&self, catalog: &Catalog, config_app: &str, prefix: &str) -> DeskResult<Option<FormSet>> {
		if !self.is_editable() {
			return Ok(None);
		}
		let editable = static_names(self.model, &self.fields.editable);
		let readonly = static_names(self.model, &self.config.readonly_fields);
		let layout = catalog.layout(config_app, self.model).ok();
		FormSet::new(
			self.model,
			layout.as_ref(),
			&editable,
			&readonly,
			prefix,
			self.rows.clone(),
			Vec::new(),
		)
		.map(Some)
	}

	pub fn with_formset(mut self, formset: FormSet) -> Self {
		self.formset = Some(formset);
		self
	}

	/// Detail address of a row on the page described by `ctx`
	pub fn url_for_result(&self, ctx: &RequestContext, row: &Record) -> Option<String> {
		result_url(ctx, self.model, row)
	}
}

/// Detail address of a row of `model` on the page described by `ctx`
///
/// Employees lead to their time sheet; time entries lead to their contract.
pub fn result_url(ctx: &RequestContext, model: &ModelDescriptor, row: &Record) -> Option<String> {
	if ctx.app == EMPLOYEE {
		return match model.model_name {
			"employee" => urls::page_url(
				EMPLOYEE,
				PageAction::Change,
				&Slug::new("timework").with_obj_id(row.id),
			),
			_ => urls::change_url(
				CONTRACT,
				&Slug::new("contract").with_obj_id(row.ref_id("contract")?),
			),
		};
	}
	let slug = Slug::new(model.model_name)
		.with_obj_id(row.id)
		.with_related_id(ctx.slug.related_id);
	urls::change_url(&ctx.app, &slug)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::AuthUser;
	use desk_core::catalog::site;
	use rstest::rstest;

	fn context(app: &str, slug: Slug) -> RequestContext {
		RequestContext::new(AuthUser::new(1, "anna").superuser(), app, slug, PageAction::List)
	}

	#[rstest]
	#[case("contract", "contract", RecordScope::Contracts { closed: false })]
	#[case("archive", "contract", RecordScope::Contracts { closed: true })]
	#[case("database", "post", RecordScope::All)]
	#[case("employee", "employee", RecordScope::Visible)]
	#[case("contract", "member", RecordScope::ContractRows { contract_id: 5, closed: false })]
	fn test_scope_for_model(#[case] app: &str, #[case] model: &str, #[case] expected: RecordScope) {
		let catalog = site();
		let descriptor = catalog.registry.model(model).unwrap();
		let ctx = context(app, Slug::new(model).with_related_id(5));
		assert_eq!(RecordScope::for_model(&ctx, descriptor), expected);
	}

	#[rstest]
	fn test_contract_rows_filter_on_open_contract() {
		let filters = RecordScope::ContractRows {
			contract_id: 3,
			closed: false,
		}
		.filters();
		assert_eq!(filters.len(), 2);
		assert_eq!(filters[0], Filter::eq("contract", FieldValue::Ref(3)));
	}

	#[rstest]
	#[case(Some("2"), 2)]
	#[case(Some("0"), 1)]
	#[case(Some("-4"), 1)]
	#[case(None, 1)]
	fn test_requested_page(#[case] requested: Option<&str>, #[case] expected: u64) {
		assert_eq!(Pagination::new(150, 100, requested, "/").page, expected);
	}

	#[rstest]
	fn test_result_urls() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let row = Record::new("letter", 4);
		let ctx = context("contract", Slug::new("letter").with_related_id(9));
		assert_eq!(
			result_url(&ctx, letter, &row).as_deref(),
			Some("/contract/letter-4-9/change/")
		);

		let employee = catalog.registry.model("employee").unwrap();
		let ctx = context("employee", Slug::new("employee"));
		assert_eq!(
			result_url(&ctx, employee, &Record::new("employee", 2)).as_deref(),
			Some("/employee/timework-2-0/change/")
		);
	}

	#[rstest]
	fn test_related_paths_cover_relation_columns() {
		let catalog = site();
		let letter = catalog.registry.model("letter").unwrap();
		let config = catalog.list_config("contract", "letter");
		let paths = related_paths(&catalog, letter, &config, &["ispolnitel".to_string()]);
		assert!(paths.contains(&"ispolnitel".to_string()));
		assert!(paths.contains(&"ispolnitel__employee".to_string()));
	}
}
