use crate::body;
use crate::cookie::parse_cookies;
use crate::extensions::Extensions;
use bytes::Bytes;
use desk_core::{DeskError, DeskResult, FormData};
use hyper::header::{CONTENT_TYPE, COOKIE, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri, Version};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

/// HTTP request as seen by desk handlers
#[derive(Debug)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	pub remote_addr: Option<SocketAddr>,
	pub extensions: Extensions,
}

impl Request {
	pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
		Self {
			method,
			uri,
			version,
			headers,
			body,
			remote_addr: None,
			extensions: Extensions::new(),
		}
	}

	/// Start building a request, mostly for tests
	///
	/// # Examples
	///
	/// ```
	/// use desk_http::Request;
	/// use hyper::Method;
	///
	/// let request = Request::builder()
	///     .method(Method::POST)
	///     .uri("/contract/contract-0-0/add/?_popup=1")
	///     .form(&[("number", "K-1")])
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(request.path(), "/contract/contract-0-0/add/");
	/// assert_eq!(request.query("_popup"), Some("1".to_string()));
	/// assert!(request.is_post());
	/// ```
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// Path plus query string, as used for `next` links
	pub fn full_path(&self) -> String {
		match self.uri.query() {
			Some(query) if !query.is_empty() => format!("{}?{}", self.uri.path(), query),
			_ => self.uri.path().to_string(),
		}
	}

	pub fn is_post(&self) -> bool {
		self.method == Method::POST
	}

	/// Decoded query parameters; the last value wins for repeated keys
	pub fn query_params(&self) -> BTreeMap<String, String> {
		self.uri
			.query()
			.and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
			.map(|pairs| pairs.into_iter().collect())
			.unwrap_or_default()
	}

	pub fn query(&self, name: &str) -> Option<String> {
		self.query_params().remove(name)
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	pub fn cookies(&self) -> HashMap<String, String> {
		self.headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.flat_map(parse_cookies)
			.collect()
	}

	pub fn cookie(&self, name: &str) -> Option<String> {
		self.cookies().remove(name)
	}

	/// Submitted form fields and uploaded files
	pub async fn form_data(&self) -> DeskResult<FormData> {
		body::parse_form(self.content_type(), self.body.clone()).await
	}
}

/// Builder returned by [`Request::builder`]
#[derive(Debug, Default)]
pub struct RequestBuilder {
	method: Option<Method>,
	uri: Option<String>,
	headers: HeaderMap,
	body: Bytes,
	error: Option<String>,
}

impl RequestBuilder {
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);
		self
	}

	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = Some(uri.into());
		self
	}

	pub fn header(mut self, name: &str, value: &str) -> Self {
		match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
			(Ok(name), Ok(value)) => {
				self.headers.append(name, value);
			}
			_ => self.error = Some(format!("Invalid header {}", name)),
		}
		self
	}

	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Urlencoded body with its content type
	pub fn form(self, pairs: &[(&str, &str)]) -> Self {
		match serde_urlencoded::to_string(pairs) {
			Ok(encoded) => self
				.header("content-type", "application/x-www-form-urlencoded")
				.body(encoded),
			Err(e) => Self {
				error: Some(e.to_string()),
				..self
			},
		}
	}

	pub fn build(self) -> DeskResult<Request> {
		if let Some(error) = self.error {
			return Err(DeskError::BadRequest(error));
		}
		let uri: Uri = self
			.uri
			.as_deref()
			.unwrap_or("/")
			.parse()
			.map_err(|e| DeskError::BadRequest(format!("Invalid URI: {}", e)))?;
		Ok(Request::new(
			self.method.unwrap_or(Method::GET),
			uri,
			Version::HTTP_11,
			self.headers,
			self.body,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("/employee/employee-0-0/change/?date=01.02.2024", "01.02.2024")]
	#[case("/employee/employee-0-0/change/?date=2024-02-01&date=02.02.2024", "02.02.2024")]
	#[case("/x/?date=1%2E2", "1.2")]
	fn test_query_decoding(#[case] uri: &str, #[case] expected: &str) {
		let request = Request::builder().uri(uri).build().unwrap();
		assert_eq!(request.query("date").as_deref(), Some(expected));
	}

	#[rstest]
	fn test_full_path_keeps_query() {
		let request = Request::builder().uri("/contract/letter-0-4/?p=2").build().unwrap();
		assert_eq!(request.full_path(), "/contract/letter-0-4/?p=2");
		let request = Request::builder().uri("/contract/").build().unwrap();
		assert_eq!(request.full_path(), "/contract/");
	}

	#[rstest]
	fn test_cookies_across_headers() {
		let request = Request::builder()
			.header("cookie", "a=1")
			.header("cookie", "messages=W10%3D")
			.build()
			.unwrap();
		assert_eq!(request.cookie("a").as_deref(), Some("1"));
		assert_eq!(request.cookie("messages").as_deref(), Some("W10="));
	}

	#[rstest]
	fn test_invalid_header_fails_build() {
		let built = Request::builder().header("bad header", "x").build();
		assert!(matches!(built, Err(DeskError::BadRequest(_))));
	}

	#[tokio::test]
	async fn test_form_data_from_urlencoded_body() {
		let request = Request::builder()
			.method(Method::POST)
			.form(&[("title", "Поставка"), ("_save", "")])
			.build()
			.unwrap();
		let data = request.form_data().await.unwrap();
		assert_eq!(data.get("title"), Some("Поставка"));
		assert!(data.contains("_save"));
	}
}
