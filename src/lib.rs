//! # Contract Desk
//!
//! A desk for contracts and the business records hanging off them:
//! calculations, letters, acts, payments, members and more, all edited
//! through one declarative CRUD admin.
//!
//! The member crates, re-exported here:
//!
//! - [`core`]: errors, slugs, the model registry, field configuration and
//!   permissions, plus the built-in catalog of models
//! - [`db`]: SQLite persistence, the change log, users and file storage
//! - [`forms`]: model forms, formsets and the special-purpose forms
//! - [`http`]: request and response types, handler and middleware traits
//! - [`admin`]: changelists, views, templates and the route table
//! - [`server`] and [`conf`] (feature `server`): the HTTP server with Basic
//!   authentication, layered settings and logging setup
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use desk::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> DeskResult<()> {
//! let catalog = site();
//! let db = Database::connect("sqlite://desk.db", 5).await?;
//! db.migrate(&catalog.registry).await?;
//! let admin = AdminSite::new(catalog, db, Arc::new(LocalStorage::new("media")))?;
//! let router = AdminRouter::new(Arc::new(admin));
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub use desk_admin as admin;
pub use desk_core as core;
pub use desk_db as db;
pub use desk_forms as forms;
pub use desk_http as http;

#[cfg(feature = "server")]
pub use desk_conf as conf;
#[cfg(feature = "server")]
pub use desk_server as server;

pub mod prelude {
	pub use desk_admin::{AdminRouter, AdminSite, SiteOptions};
	pub use desk_core::catalog::site;
	pub use desk_core::{AuthUser, Catalog, DeskError, DeskResult, FieldValue, Record, Registry, Slug};
	pub use desk_db::{Database, LocalStorage, QuerySet, Storage};
	pub use desk_http::{Handler, Request, Response};

	#[cfg(feature = "server")]
	pub use desk_conf::Settings;
	#[cfg(feature = "server")]
	pub use desk_server::{BasicAuthMiddleware, HttpServer, LoggingMiddleware, ShutdownCoordinator};
}
