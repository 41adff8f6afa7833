//! HTTP Basic authentication against the desk user table

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use desk_core::{DeskError, DeskResult};
use desk_db::{Database, users};
use desk_http::{Handler, Middleware, Request, Response};
use hyper::header::AUTHORIZATION;
use std::sync::Arc;

/// Split a `Basic` authorization header into username and password
///
/// # Examples
///
/// ```
/// use desk_server::parse_basic_auth;
///
/// // "anna:s3cret:x"
/// let header = "Basic YW5uYTpzM2NyZXQ6eA==";
/// assert_eq!(
///     parse_basic_auth(header),
///     Some(("anna".to_string(), "s3cret:x".to_string()))
/// );
/// assert_eq!(parse_basic_auth("Bearer token"), None);
/// ```
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
	let encoded = header.strip_prefix("Basic ")?;
	let decoded = STANDARD.decode(encoded.trim()).ok()?;
	let decoded = String::from_utf8(decoded).ok()?;
	let (username, password) = decoded.split_once(':')?;
	Some((username.to_string(), password.to_string()))
}

/// Puts the authenticated [`desk_core::AuthUser`] into the request extensions
///
/// Requests without valid credentials of an active user fail with
/// [`DeskError::Unauthenticated`], which the server answers with a 401
/// challenge.
#[derive(Debug, Clone)]
pub struct BasicAuthMiddleware {
	db: Database,
}

impl BasicAuthMiddleware {
	pub fn new(db: Database) -> Self {
		Self { db }
	}
}

#[async_trait]
impl Middleware for BasicAuthMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response> {
		let Some((username, password)) = request
			.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(parse_basic_auth)
		else {
			return Err(DeskError::Unauthenticated);
		};

		let mut conn = self.db.acquire().await?;
		let user = users::authenticate(&mut conn, &username, &password).await?;
		drop(conn);

		match user {
			Some(user) if user.is_active => {
				request.extensions.insert(user);
				next.handle(request).await
			}
			Some(_) => {
				tracing::warn!(%username, "Inactive user refused");
				Err(DeskError::Unauthenticated)
			}
			None => Err(DeskError::Unauthenticated),
		}
	}
}
