use crate::messages;
use crate::templates::Templates;
use desk_core::{Catalog, DeskResult, Registry};
use desk_db::{Database, Storage};
use desk_http::{CsrfToken, Request, Response};
use std::fmt;
use std::sync::Arc;

/// Tunables of the admin pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOptions {
	pub title: String,
	pub list_per_page: u64,
	pub history_per_page: u64,
}

impl Default for SiteOptions {
	fn default() -> Self {
		Self {
			title: "Contract Desk".to_string(),
			list_per_page: 100,
			history_per_page: 50,
		}
	}
}

/// Everything a view needs: the catalog, the database, file storage and templates
pub struct AdminSite {
	pub catalog: Catalog,
	pub db: Database,
	pub storage: Arc<dyn Storage>,
	pub options: SiteOptions,
	templates: Templates,
}

impl AdminSite {
	pub fn new(catalog: Catalog, db: Database, storage: Arc<dyn Storage>) -> DeskResult<Self> {
		Ok(Self {
			catalog,
			db,
			storage,
			options: SiteOptions::default(),
			templates: Templates::new()?,
		})
	}

	pub fn with_options(mut self, options: SiteOptions) -> Self {
		self.options = options;
		self
	}

	pub fn registry(&self) -> &Registry {
		&self.catalog.registry
	}

	/// Render `template` as the response page, showing pending flash messages
	///
	/// Post forms embed the request's [`CsrfToken`] when one was issued.
	pub fn render(
		&self,
		request: &Request,
		template: &str,
		mut context: tera::Context,
	) -> DeskResult<Response> {
		let pending = messages::from_request(request);
		context.insert("site_title", &self.options.title);
		context.insert("messages", &pending);
		if let Some(token) = request.extensions.get::<CsrfToken>() {
			context.insert("csrf_token", token.as_str());
		}
		let body = self.templates.render(template, &context)?;
		Ok(messages::consumed(Response::html(body), &pending))
	}
}

impl fmt::Debug for AdminSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AdminSite")
			.field("models", &self.catalog.registry.models().count())
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}
