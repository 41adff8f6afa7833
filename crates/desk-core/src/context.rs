//! Per-request context
//!
//! Built once by the router and passed by reference to every handler. It is
//! never mutated after construction; derived contexts are produced with the
//! `with_*` builders.

use crate::permissions::AuthUser;
use crate::slug::Slug;
use std::collections::BTreeMap;

/// Page kind a route resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageAction {
	List,
	Add,
	Change,
	/// Read-only change page (archive)
	View,
	Delete,
	History,
	Close,
}

impl PageAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			PageAction::List => "list",
			PageAction::Add => "add",
			PageAction::Change => "change",
			PageAction::View => "view",
			PageAction::Delete => "delete",
			PageAction::History => "history",
			PageAction::Close => "close",
		}
	}
}

#[derive(Debug, Clone)]
pub struct RequestContext {
	pub user: AuthUser,
	/// Route namespace, e.g. `contract`, `archive`, `database`
	pub app: String,
	pub slug: Slug,
	pub action: PageAction,
	pub query: BTreeMap<String, String>,
	/// Path plus query string, used for "save and continue" redirects
	pub full_path: String,
}

impl RequestContext {
	pub fn new(user: AuthUser, app: impl Into<String>, slug: Slug, action: PageAction) -> Self {
		let app = app.into();
		Self {
			full_path: String::from("/"),
			user,
			app,
			slug,
			action,
			query: BTreeMap::new(),
		}
	}

	pub fn with_slug(&self, slug: Slug) -> Self {
		Self {
			slug,
			..self.clone()
		}
	}

	pub fn with_action(&self, action: PageAction) -> Self {
		Self {
			action,
			..self.clone()
		}
	}

	pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
		self.query = query;
		self
	}

	pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
		self.full_path = full_path.into();
		self
	}

	pub fn query_param(&self, key: &str) -> Option<&str> {
		self.query.get(key).map(String::as_str)
	}

	/// Archive pages only show closed contracts and never edit
	pub fn is_archive(&self) -> bool {
		self.app == "archive"
	}

	/// Whether forms on this page are read-only regardless of permissions
	pub fn is_read_only(&self) -> bool {
		self.action == PageAction::View || self.is_archive()
	}
}
