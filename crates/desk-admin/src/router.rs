//! Route table
//!
//! Paths resolve to a [`Route`] through a fixed set of patterns; the slug
//! segment of object pages is decoded with [`Slug::parse`]. Anything else
//! is a 404.

use crate::site::AdminSite;
use crate::urls::{self, ARCHIVE, CONTRACT, DATABASE, EMPLOYEE};
use crate::views;
use async_trait::async_trait;
use desk_core::{AuthUser, DeskError, DeskResult, PageAction, RequestContext, Slug};
use desk_http::{Handler, Request, Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static PAGE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r"^/(contract|settings/database|archive/contract|employee)/([^/]+)/(?:(add|change|view|delete|history|close)/)?$",
	)
	.expect("page route pattern is valid")
});

static MEDIA: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^/media/(.+)$").expect("media route pattern is valid"));

/// Where a request path leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
	Home,
	SettingsIndex,
	AppIndex(&'static str),
	Page {
		app: &'static str,
		slug: Slug,
		action: PageAction,
	},
	AccountSettings,
	ContractListColumns,
	ValueChange,
	Media(String),
}

fn app_for_prefix(prefix: &str) -> Option<&'static str> {
	match prefix {
		"contract" => Some(CONTRACT),
		"settings/database" => Some(DATABASE),
		"archive/contract" => Some(ARCHIVE),
		"employee" => Some(EMPLOYEE),
		_ => None,
	}
}

fn action_for(segment: Option<&str>) -> Option<PageAction> {
	Some(match segment {
		None => PageAction::List,
		Some("add") => PageAction::Add,
		Some("change") => PageAction::Change,
		Some("view") => PageAction::View,
		Some("delete") => PageAction::Delete,
		Some("history") => PageAction::History,
		Some("close") => PageAction::Close,
		Some(_) => return None,
	})
}

impl Route {
	/// Resolve a request path
	///
	/// # Examples
	///
	/// ```
	/// use desk_admin::Route;
	/// use desk_core::{PageAction, Slug};
	///
	/// let route = Route::resolve("/contract/letter-4-9/history/").unwrap();
	/// assert_eq!(
	///     route,
	///     Route::Page {
	///         app: "contract",
	///         slug: Slug::new("letter").with_obj_id(4).with_related_id(9),
	///         action: PageAction::History,
	///     }
	/// );
	/// assert!(Route::resolve("/archive/contract/contract-1-0/delete/").is_err());
	/// assert!(Route::resolve("/nowhere/").is_err());
	/// ```
	pub fn resolve(path: &str) -> DeskResult<Route> {
		let route = match path {
			urls::HOME => Some(Route::Home),
			urls::SETTINGS_INDEX => Some(Route::SettingsIndex),
			"/settings/database/" => Some(Route::AppIndex(DATABASE)),
			"/contract/" => Some(Route::AppIndex(CONTRACT)),
			urls::ACCOUNT_SETTINGS => Some(Route::AccountSettings),
			urls::CONTRACT_LIST_COLUMNS => Some(Route::ContractListColumns),
			urls::VALUE_CHANGE => Some(Route::ValueChange),
			_ => None,
		};
		if let Some(route) = route {
			return Ok(route);
		}

		if let Some(captures) = MEDIA.captures(path) {
			return Ok(Route::Media(captures[1].to_string()));
		}

		let captures = PAGE
			.captures(path)
			.ok_or_else(|| DeskError::NotFound(format!("No route for {}", path)))?;
		let app = app_for_prefix(&captures[1]).ok_or_else(DeskError::not_found)?;
		let slug = Slug::parse(&captures[2])?;
		let action = action_for(captures.get(3).map(|m| m.as_str())).ok_or_else(DeskError::not_found)?;
		// Pages an app does not expose are missing, not forbidden
		if urls::page_url(app, action, &slug).is_none() {
			return Err(DeskError::NotFound(format!("No route for {}", path)));
		}
		Ok(Route::Page { app, slug, action })
	}
}

/// Handler serving every desk page
///
/// Expects the authenticated [`AuthUser`] in the request extensions.
#[derive(Debug, Clone)]
pub struct AdminRouter {
	site: Arc<AdminSite>,
}

impl AdminRouter {
	pub fn new(site: Arc<AdminSite>) -> Self {
		Self { site }
	}

	pub fn site(&self) -> &AdminSite {
		&self.site
	}
}

#[async_trait]
impl Handler for AdminRouter {
	async fn handle(&self, request: Request) -> DeskResult<Response> {
		let user = request
			.extensions
			.get::<AuthUser>()
			.ok_or(DeskError::Unauthenticated)?;
		let route = Route::resolve(request.path())?;
		tracing::debug!(?route, user = %user.username, "Resolved route");

		let site = self.site.as_ref();
		let (app, slug, action) = match route {
			Route::Page { app, slug, action } => (app, slug, action),
			Route::Media(path) => return views::media::serve(site, &user, &path).await,
			other => {
				let ctx = RequestContext::new(user, "", Slug::new("contract"), PageAction::List)
					.with_query(request.query_params())
					.with_full_path(request.full_path());
				return match other {
					Route::Home => views::index::home(site, &request, &ctx),
					Route::SettingsIndex => views::index::settings_index(site, &request, &ctx),
					Route::AppIndex(app) => views::index::app_index(site, &request, &ctx, app),
					Route::AccountSettings => views::account::settings_index(site, &request, &ctx),
					Route::ContractListColumns => views::account::contract_columns(site, &request, &ctx).await,
					Route::ValueChange => views::valuechange::value_change(site, &ctx).await,
					Route::Page { .. } | Route::Media(_) => Err(DeskError::not_found()),
				};
			}
		};

		let ctx = RequestContext::new(user, app, slug, action)
			.with_query(request.query_params())
			.with_full_path(request.full_path());
		match (app, action) {
			(EMPLOYEE, PageAction::List) => views::timesheet::employees(site, &request, &ctx).await,
			(EMPLOYEE, _) => views::timesheet::sheet(site, &request, &ctx).await,
			(_, PageAction::List) => views::list::changelist(site, &request, &ctx).await,
			(_, PageAction::Add) if site.catalog.group(&ctx.slug.model).is_some() => {
				views::stage::add(site, &request, &ctx).await
			}
			(_, PageAction::Add | PageAction::Change | PageAction::View) => {
				views::form::change_form(site, &request, &ctx).await
			}
			(_, PageAction::Delete) => views::delete::delete(site, &request, &ctx).await,
			(_, PageAction::History) => views::history::history(site, &request, &ctx).await,
			(_, PageAction::Close) => views::close::close(site, &request, &ctx).await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("/", Route::Home)]
	#[case("/settings/", Route::SettingsIndex)]
	#[case("/settings/database/", Route::AppIndex("database"))]
	#[case("/account/contract_list_change/", Route::ContractListColumns)]
	#[case("/media/document/act.pdf", Route::Media("document/act.pdf".into()))]
	fn test_fixed_routes(#[case] path: &str, #[case] expected: Route) {
		assert_eq!(Route::resolve(path).unwrap(), expected);
	}

	#[rstest]
	#[case("/settings/database/post-0-0/", "database", PageAction::List)]
	#[case("/archive/contract/contract-3-0/view/", "archive", PageAction::View)]
	#[case("/employee/timework-2-0/change/", "employee", PageAction::Change)]
	#[case("/contract/contract-3-0/close/", "contract", PageAction::Close)]
	fn test_page_routes(#[case] path: &str, #[case] app: &str, #[case] action: PageAction) {
		let Route::Page { app: resolved, action: resolved_action, .. } = Route::resolve(path).unwrap() else {
			panic!("{} is not a page", path);
		};
		assert_eq!((resolved, resolved_action), (app, action));
	}

	#[rstest]
	#[case("/contract/letter-x-1/")]
	#[case("/contract/letter-1-2/rename/")]
	#[case("/settings/database/post-1-0/close/")]
	#[case("/contract/letter-1-2")]
	fn test_unknown_paths_are_missing(#[case] path: &str) {
		let err = Route::resolve(path).unwrap_err();
		assert_eq!(err.status_code(), 404);
	}
}
