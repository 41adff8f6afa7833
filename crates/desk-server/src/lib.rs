//! # Contract Desk server
//!
//! Serves any [`desk_http::Handler`] over HTTP/1.1 with hyper, in front of
//! a middleware chain:
//!
//! - [`LoggingMiddleware`]: one log line per request with status and timing
//! - [`BasicAuthMiddleware`]: resolves the user from HTTP Basic credentials
//! - [`CsrfMiddleware`]: refuses unsafe requests from foreign pages
//!
//! Handler errors become plain error pages; an authentication failure
//! answers 401 with a `WWW-Authenticate` challenge for the configured realm.
//!
//! ```rust,no_run
//! use desk_server::{BasicAuthMiddleware, CsrfMiddleware, HttpServer, LoggingMiddleware, ShutdownCoordinator};
//! use desk_http::{Handler, Request, Response};
//! use desk_core::DeskResult;
//! use desk_db::Database;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _request: Request) -> DeskResult<Response> {
//!         Ok(Response::html("Hello"))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite://desk.db", 5).await?;
//! let coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
//! HttpServer::new(Arc::new(Hello))
//!     .with_middleware(Arc::new(LoggingMiddleware::new()))
//!     .with_middleware(Arc::new(BasicAuthMiddleware::new(db)))
//!     .with_middleware(Arc::new(CsrfMiddleware::new()))
//!     .listen_with_shutdown("127.0.0.1:8000".parse()?, coordinator)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod csrf;
pub mod http;
pub mod logging;
pub mod shutdown;

pub use auth::{BasicAuthMiddleware, parse_basic_auth};
pub use csrf::CsrfMiddleware;
pub use http::{HttpServer, ServerError, serve_with_shutdown};
pub use logging::LoggingMiddleware;
pub use shutdown::{ShutdownCoordinator, shutdown_signal};

/// Realm announced in Basic authentication challenges unless configured
pub const DEFAULT_REALM: &str = "desk";
