//! Addresses of desk pages
//!
//! Every object page is addressed as `/{prefix}/{slug}/{action}/`, the list
//! page drops the action segment. The archive and the employee pages only
//! expose some actions; asking for another one yields `None`.

use desk_core::{PageAction, Slug};

pub const CONTRACT: &str = "contract";
pub const DATABASE: &str = "database";
pub const ARCHIVE: &str = "archive";
pub const EMPLOYEE: &str = "employee";

pub const HOME: &str = "/";
pub const SETTINGS_INDEX: &str = "/settings/";
pub const ACCOUNT_SETTINGS: &str = "/account/settings/";
pub const CONTRACT_LIST_COLUMNS: &str = "/account/contract_list_change/";
pub const VALUE_CHANGE: &str = "/valuechange/";
pub const MEDIA_PREFIX: &str = "/media/";

fn prefix(app: &str) -> Option<&'static str> {
	match app {
		CONTRACT => Some("/contract"),
		DATABASE => Some("/settings/database"),
		ARCHIVE => Some("/archive/contract"),
		EMPLOYEE => Some("/employee"),
		_ => None,
	}
}

fn exposes(app: &str, action: PageAction) -> bool {
	use PageAction::*;
	match app {
		ARCHIVE => matches!(action, List | View | History),
		EMPLOYEE => matches!(action, List | Change),
		CONTRACT => action != View,
		_ => !matches!(action, View | Close),
	}
}

/// URL of `action` on `slug` within `app`
///
/// # Examples
///
/// ```
/// use desk_admin::urls::page_url;
/// use desk_core::{PageAction, Slug};
///
/// let slug = Slug::new("letter").with_obj_id(3).with_related_id(7);
/// assert_eq!(
///     page_url("contract", PageAction::Change, &slug).as_deref(),
///     Some("/contract/letter-3-7/change/")
/// );
/// assert_eq!(
///     page_url("database", PageAction::List, &Slug::new("post")).as_deref(),
///     Some("/settings/database/post-0-0/")
/// );
/// assert_eq!(page_url("archive", PageAction::Delete, &slug), None);
/// ```
pub fn page_url(app: &str, action: PageAction, slug: &Slug) -> Option<String> {
	let prefix = prefix(app)?;
	if !exposes(app, action) {
		return None;
	}
	Some(match action {
		PageAction::List => format!("{}/{}/", prefix, slug),
		action => format!("{}/{}/{}/", prefix, slug, action.as_str()),
	})
}

pub fn list_url(app: &str, slug: &Slug) -> Option<String> {
	page_url(app, PageAction::List, slug)
}

pub fn add_url(app: &str, slug: &Slug) -> Option<String> {
	page_url(app, PageAction::Add, slug)
}

/// Detail page of an object: the read-only view in the archive
pub fn change_url(app: &str, slug: &Slug) -> Option<String> {
	let action = if app == ARCHIVE {
		PageAction::View
	} else {
		PageAction::Change
	};
	page_url(app, action, slug)
}

/// Index page of an app namespace
pub fn app_index(app: &str) -> Option<String> {
	prefix(app).map(|prefix| format!("{}/", prefix))
}

pub fn media_url(path: &str) -> String {
	format!("{}{}", MEDIA_PREFIX, path.trim_start_matches('/'))
}
