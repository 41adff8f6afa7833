//! CSRF protection for state-changing requests
//!
//! Browsers replay Basic credentials on every request, so a form posted
//! from a foreign page would otherwise act as the signed-in user. Unsafe
//! methods must come from the desk's own origin and carry the token from
//! the [`CSRF_COOKIE_NAME`] cookie.

use async_trait::async_trait;
use desk_core::{DeskError, DeskResult};
use desk_http::csrf::{
	CSRF_COOKIE_NAME, CSRF_FIELD_NAME, CSRF_HEADER_NAME, CsrfToken, REASON_BAD_ORIGIN, REASON_BAD_REFERER,
	REASON_CSRF_TOKEN_INCORRECT, REASON_CSRF_TOKEN_MISSING, REASON_NO_CSRF_COOKIE, is_safe_method,
	is_same_origin,
};
use desk_http::{Handler, Middleware, Request, Response, SetCookie};
use hyper::header::{HOST, ORIGIN, REFERER};
use std::sync::Arc;

/// Issues the token cookie and rejects forged unsafe requests with 403
///
/// The token of the current request is stored as a [`CsrfToken`] in the
/// request extensions so pages can embed it in their forms.
#[derive(Debug, Clone, Default)]
pub struct CsrfMiddleware {
	trusted_origins: Vec<String>,
}

impl CsrfMiddleware {
	pub fn new() -> Self {
		Self::default()
	}

	/// Accept unsafe requests from `origin` (`scheme://host[:port]`) as well
	///
	/// # Examples
	///
	/// ```
	/// use desk_server::CsrfMiddleware;
	///
	/// let middleware = CsrfMiddleware::new().with_trusted_origins(["https://portal.example"]);
	/// assert_eq!(middleware.trusted_origins(), ["https://portal.example"]);
	/// ```
	pub fn with_trusted_origins<I, S>(mut self, origins: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.trusted_origins.extend(origins.into_iter().map(Into::into));
		self
	}

	pub fn trusted_origins(&self) -> &[String] {
		&self.trusted_origins
	}

	fn check_source(&self, request: &Request) -> DeskResult<()> {
		let host = request.header(HOST.as_str()).unwrap_or_default();
		if let Some(origin) = request.header(ORIGIN.as_str()) {
			if !is_same_origin(origin, host, &self.trusted_origins) {
				return Err(forbidden(REASON_BAD_ORIGIN, origin));
			}
		} else if let Some(referer) = request.header(REFERER.as_str())
			&& !is_same_origin(referer, host, &self.trusted_origins)
		{
			return Err(forbidden(REASON_BAD_REFERER, referer));
		}
		Ok(())
	}

	async fn check_token(&self, request: &Request, cookie: Option<&CsrfToken>) -> DeskResult<()> {
		let cookie = cookie.ok_or_else(|| forbidden(REASON_NO_CSRF_COOKIE, request.path()))?;
		let submitted = match request.header(CSRF_HEADER_NAME) {
			Some(header) => Some(header.to_string()),
			None => request.form_data().await?.get(CSRF_FIELD_NAME).map(str::to_string),
		};
		let submitted = submitted.ok_or_else(|| forbidden(REASON_CSRF_TOKEN_MISSING, request.path()))?;
		if !cookie.matches(&submitted) {
			return Err(forbidden(REASON_CSRF_TOKEN_INCORRECT, request.path()));
		}
		Ok(())
	}
}

fn forbidden(reason: &str, detail: &str) -> DeskError {
	tracing::warn!(reason, detail, "CSRF check failed");
	DeskError::Forbidden(format!("{}.", reason))
}

#[async_trait]
impl Middleware for CsrfMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response> {
		let existing = request.cookie(CSRF_COOKIE_NAME).as_deref().and_then(CsrfToken::parse);

		if !is_safe_method(&request.method) {
			self.check_source(&request)?;
			self.check_token(&request, existing.as_ref()).await?;
		}

		let token = existing.clone().unwrap_or_else(CsrfToken::generate);
		request.extensions.insert(token.clone());
		let response = next.handle(request).await?;
		if existing.is_some() {
			return Ok(response);
		}
		Ok(response.with_cookie(&SetCookie::new(CSRF_COOKIE_NAME, token.as_str()).with_same_site("Lax")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_http::Method;
	use desk_http::cookie::parse_cookies;
	use rstest::rstest;

	const HOST_NAME: &str = "desk.local:8000";

	/// Echoes the token the page would embed
	struct FormPage;

	#[async_trait]
	impl Handler for FormPage {
		async fn handle(&self, request: Request) -> DeskResult<Response> {
			let token = request.extensions.get::<CsrfToken>().ok_or_else(DeskError::not_found)?;
			Ok(Response::html(token.as_str().to_string()))
		}
	}

	fn post(token: &CsrfToken, submitted: Option<&str>, origin: Option<&str>) -> Request {
		let mut builder = Request::builder()
			.method(Method::POST)
			.uri("/contract/letter-1-1/delete/")
			.header("host", HOST_NAME)
			.header("cookie", &format!("{}={}", CSRF_COOKIE_NAME, token.as_str()));
		if let Some(origin) = origin {
			builder = builder.header("origin", origin);
		}
		let mut form = vec![("post", "yes")];
		if let Some(submitted) = submitted {
			form.push((CSRF_FIELD_NAME, submitted));
		}
		builder.form(&form).build().unwrap()
	}

	async fn run(request: Request) -> DeskResult<Response> {
		CsrfMiddleware::new().process(request, Arc::new(FormPage)).await
	}

	fn assert_forbidden(result: DeskResult<Response>) {
		match result {
			Err(err) => assert_eq!(err.status_code(), 403, "unexpected error {err:?}"),
			Ok(response) => panic!("expected 403, got {}", response.status),
		}
	}

	#[tokio::test]
	async fn test_first_visit_issues_cookie() {
		let request = Request::builder().uri("/").header("host", HOST_NAME).build().unwrap();
		let response = run(request).await.unwrap();

		let header = response.headers.get("set-cookie").unwrap().to_str().unwrap();
		assert!(header.contains("SameSite=Lax"));
		let pair = header.split(';').next().unwrap();
		assert_eq!(parse_cookies(pair)[CSRF_COOKIE_NAME], response.text());
	}

	#[tokio::test]
	async fn test_known_cookie_is_reused() {
		let token = CsrfToken::generate();
		let request = Request::builder()
			.uri("/")
			.header("cookie", &format!("{}={}", CSRF_COOKIE_NAME, token.as_str()))
			.build()
			.unwrap();
		let response = run(request).await.unwrap();
		assert_eq!(response.text(), token.as_str());
		assert!(response.headers.get("set-cookie").is_none());
	}

	#[rstest]
	#[case(None)]
	#[case(Some("http://desk.local:8000"))]
	#[tokio::test]
	async fn test_same_site_post_with_token_passes(#[case] origin: Option<&str>) {
		let token = CsrfToken::generate();
		let response = run(post(&token, Some(token.as_str()), origin)).await.unwrap();
		assert_eq!(response.text(), token.as_str());
	}

	#[tokio::test]
	async fn test_header_token_is_accepted() {
		let token = CsrfToken::generate();
		let request = Request::builder()
			.method(Method::POST)
			.uri("/valuechange/")
			.header("cookie", &format!("{}={}", CSRF_COOKIE_NAME, token.as_str()))
			.header(CSRF_HEADER_NAME, token.as_str())
			.build()
			.unwrap();
		assert!(run(request).await.is_ok());
	}

	#[tokio::test]
	async fn test_foreign_origin_is_forbidden_even_with_token() {
		let token = CsrfToken::generate();
		assert_forbidden(run(post(&token, Some(token.as_str()), Some("https://evil.example"))).await);
	}

	#[tokio::test]
	async fn test_foreign_referer_is_forbidden() {
		let token = CsrfToken::generate();
		let request = Request::builder()
			.method(Method::POST)
			.uri("/contract/contract-1-0/close/")
			.header("host", HOST_NAME)
			.header("referer", "https://evil.example/attack.html")
			.header("cookie", &format!("{}={}", CSRF_COOKIE_NAME, token.as_str()))
			.form(&[("post", "yes"), (CSRF_FIELD_NAME, token.as_str())])
			.build()
			.unwrap();
		assert_forbidden(run(request).await);
	}

	#[rstest]
	#[case(None)]
	#[case(Some(""))]
	#[case(Some("0123"))]
	#[tokio::test]
	async fn test_missing_or_wrong_token_is_forbidden(#[case] submitted: Option<&str>) {
		let token = CsrfToken::generate();
		assert_forbidden(run(post(&token, submitted, None)).await);
	}

	#[tokio::test]
	async fn test_post_without_cookie_is_forbidden() {
		let token = CsrfToken::generate();
		let request = Request::builder()
			.method(Method::POST)
			.uri("/contract/letter-1-1/delete/")
			.form(&[(CSRF_FIELD_NAME, token.as_str())])
			.build()
			.unwrap();
		assert_forbidden(run(request).await);
	}

	#[tokio::test]
	async fn test_trusted_origin_passes() {
		let token = CsrfToken::generate();
		let middleware = CsrfMiddleware::new().with_trusted_origins(["https://portal.example"]);
		let request = post(&token, Some(token.as_str()), Some("https://portal.example"));
		assert!(middleware.process(request, Arc::new(FormPage)).await.is_ok());
	}
}
