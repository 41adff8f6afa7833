//! Cross-site request forgery tokens
//!
//! A random token lives in the [`CSRF_COOKIE_NAME`] cookie. Every unsafe
//! request must echo it back in the [`CSRF_FIELD_NAME`] form field or the
//! [`CSRF_HEADER_NAME`] header, and must not come from a foreign origin.
//! The middleware enforcing this lives in the server crate; pages read the
//! current token from the request extensions.

use hyper::{Method, Uri};
use rand::RngCore;

pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_FIELD_NAME: &str = "csrfmiddlewaretoken";
pub const CSRF_HEADER_NAME: &str = "x-csrftoken";

/// Random bytes behind a token; tokens are their hex form
pub const CSRF_SECRET_LENGTH: usize = 32;
pub const CSRF_TOKEN_LENGTH: usize = CSRF_SECRET_LENGTH * 2;

pub const REASON_BAD_ORIGIN: &str = "Origin checking failed";
pub const REASON_BAD_REFERER: &str = "Referer checking failed";
pub const REASON_NO_CSRF_COOKIE: &str = "CSRF cookie not set";
pub const REASON_CSRF_TOKEN_MISSING: &str = "CSRF token missing";
pub const REASON_CSRF_TOKEN_INCORRECT: &str = "CSRF token incorrect";

/// Token of the current browser, stored in the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
	pub fn generate() -> Self {
		let mut secret = [0u8; CSRF_SECRET_LENGTH];
		rand::thread_rng().fill_bytes(&mut secret);
		Self(hex::encode(secret))
	}

	/// Accept a cookie value only if it has the shape of a generated token
	///
	/// # Examples
	///
	/// ```
	/// use desk_http::csrf::CsrfToken;
	///
	/// let token = CsrfToken::generate();
	/// assert_eq!(CsrfToken::parse(token.as_str()), Some(token));
	/// assert_eq!(CsrfToken::parse("short"), None);
	/// assert_eq!(CsrfToken::parse(&"z".repeat(64)), None);
	/// ```
	pub fn parse(value: &str) -> Option<Self> {
		let valid = value.len() == CSRF_TOKEN_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit());
		valid.then(|| Self(value.to_ascii_lowercase()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Compare against a submitted value without short-circuiting
	pub fn matches(&self, submitted: &str) -> bool {
		let expected = self.0.as_bytes();
		let submitted = submitted.trim().to_ascii_lowercase();
		let submitted = submitted.as_bytes();
		if expected.len() != submitted.len() {
			return false;
		}
		expected
			.iter()
			.zip(submitted)
			.fold(0u8, |diff, (a, b)| diff | (a ^ b))
			== 0
	}
}

/// GET, HEAD, OPTIONS and TRACE change nothing and are never checked
pub fn is_safe_method(method: &Method) -> bool {
	matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

/// Whether the `Origin` or `Referer` value `source` points at `host`
/// or at one of the `trusted` origins
///
/// # Examples
///
/// ```
/// use desk_http::csrf::is_same_origin;
///
/// assert!(is_same_origin("http://desk.local:8000", "desk.local:8000", &[]));
/// assert!(is_same_origin("http://DESK.local:8000/contract/", "desk.local:8000", &[]));
/// assert!(!is_same_origin("https://evil.example", "desk.local:8000", &[]));
/// assert!(is_same_origin("https://portal.example/x", "desk.local", &["https://portal.example".into()]));
/// assert!(!is_same_origin("null", "desk.local", &[]));
/// ```
pub fn is_same_origin(source: &str, host: &str, trusted: &[String]) -> bool {
	let Ok(uri) = source.parse::<Uri>() else {
		return false;
	};
	let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
		return false;
	};
	if authority.as_str().eq_ignore_ascii_case(host) {
		return true;
	}
	let origin = format!("{}://{}", scheme, authority);
	trusted
		.iter()
		.any(|trusted| trusted.trim_end_matches('/').eq_ignore_ascii_case(&origin))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_generated_tokens_differ() {
		let first = CsrfToken::generate();
		let second = CsrfToken::generate();
		assert_eq!(first.as_str().len(), CSRF_TOKEN_LENGTH);
		assert_ne!(first, second);
	}

	#[rstest]
	fn test_token_matches_case_insensitively() {
		let token = CsrfToken::generate();
		assert!(token.matches(&token.as_str().to_ascii_uppercase()));
		assert!(!token.matches(""));
		assert!(!token.matches(CsrfToken::generate().as_str()));
	}

	#[rstest]
	#[case(Method::GET, true)]
	#[case(Method::HEAD, true)]
	#[case(Method::POST, false)]
	#[case(Method::DELETE, false)]
	fn test_safe_methods(#[case] method: Method, #[case] safe: bool) {
		assert_eq!(is_safe_method(&method), safe);
	}

	#[rstest]
	#[case("/relative/path")]
	#[case("desk.local:8000")]
	#[case("http://desk.local:8001/")]
	fn test_foreign_or_malformed_sources(#[case] source: &str) {
		assert!(!is_same_origin(source, "desk.local:8000", &[]));
	}
}
