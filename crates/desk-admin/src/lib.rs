//! # Contract Desk admin
//!
//! The page layer of the desk: changelists over the catalog's models, the
//! add/change/delete/close/history views, the contract sidebar and main
//! menu, flash messages and the route table.
//!
//! [`AdminRouter`] is a [`desk_http::Handler`]; the server wraps it in its
//! middleware chain, which must put the authenticated
//! [`desk_core::AuthUser`] into the request extensions.
//!
//! ```rust,no_run
//! use desk_admin::{AdminRouter, AdminSite};
//! use desk_core::catalog::site;
//! use desk_db::{Database, LocalStorage};
//! use std::sync::Arc;
//!
//! # async fn run() -> desk_core::DeskResult<()> {
//! let catalog = site();
//! let db = Database::connect("sqlite://desk.db", 5).await?;
//! db.migrate(&catalog.registry).await?;
//! let admin = AdminSite::new(catalog, db, Arc::new(LocalStorage::new("media")))?;
//! let router = AdminRouter::new(Arc::new(admin));
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod changelist;
pub mod helpers;
pub mod messages;
pub mod nav;
pub mod router;
pub mod site;
pub mod templates;
pub mod urls;
mod views;

pub use changelist::{ChangeList, Pagination, RecordScope};
pub use messages::{Level, Message};
pub use router::{AdminRouter, Route};
pub use site::{AdminSite, SiteOptions};
pub use templates::Templates;
