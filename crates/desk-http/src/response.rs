use crate::cookie::SetCookie;
use bytes::Bytes;
use desk_core::{DeskError, DeskResult};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue, LOCATION, SET_COOKIE};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;

const HTML: &str = "text/html; charset=utf-8";

/// HTTP response produced by desk handlers
#[derive(Debug)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	/// # Examples
	///
	/// ```
	/// use desk_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	/// A rendered HTML page
	pub fn html(body: impl Into<Bytes>) -> Self {
		Self::ok().with_content_type(HTML).with_body(body)
	}

	/// `302 Found` pointing at `location`
	///
	/// # Examples
	///
	/// ```
	/// use desk_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::redirect("/contract/contract-0-0/");
	/// assert_eq!(response.status, StatusCode::FOUND);
	/// assert_eq!(response.location(), Some("/contract/contract-0-0/"));
	/// ```
	pub fn redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::FOUND).with_location(location.as_ref())
	}

	/// JSON body serialized from `data`
	pub fn json<T: Serialize>(data: &T) -> DeskResult<Self> {
		let body = serde_json::to_vec(data)?;
		Ok(Self::ok().with_content_type("application/json").with_body(body))
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	/// Add a header; invalid names or values are dropped with a warning
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
			(Ok(name), Ok(value)) => {
				self.headers.append(name, value);
			}
			_ => tracing::warn!(header = name, "Dropping invalid response header"),
		}
		self
	}

	pub fn with_content_type(mut self, content_type: &str) -> Self {
		if let Ok(value) = HeaderValue::try_from(content_type) {
			self.headers.insert(CONTENT_TYPE, value);
		}
		self
	}

	pub fn with_location(self, location: &str) -> Self {
		self.with_header(LOCATION.as_str(), location)
	}

	pub fn with_cookie(self, cookie: &SetCookie) -> Self {
		self.with_header(SET_COOKIE.as_str(), &cookie.header_value())
	}

	pub fn location(&self) -> Option<&str> {
		self.headers.get(LOCATION).and_then(|value| value.to_str().ok())
	}

	/// Body as text, for tests and logging
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Plain error page for `err`; server-side details are not rendered
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::DeskError;
	/// use desk_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::from_error(&DeskError::Unauthenticated, "desk");
	/// assert_eq!(response.status, StatusCode::UNAUTHORIZED);
	/// assert_eq!(
	///     response.headers.get("www-authenticate").unwrap(),
	///     "Basic realm=\"desk\""
	/// );
	///
	/// let response = Response::from_error(&DeskError::Database("disk I/O".into()), "desk");
	/// assert!(!response.text().contains("disk"));
	/// ```
	pub fn from_error(err: &DeskError, realm: &str) -> Self {
		let status =
			StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let message = match status {
			StatusCode::NOT_FOUND => "Not Found".to_string(),
			StatusCode::UNAUTHORIZED => "Authentication required".to_string(),
			s if s.is_client_error() => err.to_string(),
			_ => "Server Error".to_string(),
		};
		let body = format!(
			"<!DOCTYPE html><html><head><title>{}</title></head><body><h1>{}</h1></body></html>",
			status.as_u16(),
			message
		);
		let response = Self::new(status).with_content_type(HTML).with_body(body);
		if status == StatusCode::UNAUTHORIZED {
			response.with_header("www-authenticate", &format!("Basic realm=\"{}\"", realm))
		} else {
			response
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(DeskError::not_found(), StatusCode::NOT_FOUND)]
	#[case(DeskError::InvalidSlug("a-b".into()), StatusCode::NOT_FOUND)]
	#[case(DeskError::BadRequest("bad date".into()), StatusCode::BAD_REQUEST)]
	#[case(DeskError::ImproperlyConfigured("missing".into()), StatusCode::INTERNAL_SERVER_ERROR)]
	fn test_error_status(#[case] err: DeskError, #[case] expected: StatusCode) {
		assert_eq!(Response::from_error(&err, "desk").status, expected);
	}

	#[rstest]
	fn test_cookies_are_appended() {
		let response = Response::redirect("/")
			.with_cookie(&SetCookie::new("messages", "x"))
			.with_cookie(&SetCookie::removal("old"));
		assert_eq!(response.headers.get_all(SET_COOKIE).iter().count(), 2);
	}

	#[rstest]
	fn test_json_body() {
		let response = Response::json(&serde_json::json!({"abbr": "ГИП"})).unwrap();
		assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
		assert_eq!(response.text(), r#"{"abbr":"ГИП"}"#);
	}
}
