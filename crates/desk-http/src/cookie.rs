//! Request cookie parsing and `Set-Cookie` values

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::collections::HashMap;

/// Parse a `Cookie` header into name/value pairs
///
/// Values are percent-decoded; malformed pairs are skipped.
///
/// # Examples
///
/// ```
/// use desk_http::cookie::parse_cookies;
///
/// let cookies = parse_cookies("theme=dark; messages=a%20b; broken");
/// assert_eq!(cookies["theme"], "dark");
/// assert_eq!(cookies["messages"], "a b");
/// assert!(!cookies.contains_key("broken"));
/// ```
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
	header
		.split(';')
		.filter_map(|pair| {
			let (name, value) = pair.trim().split_once('=')?;
			let name = name.trim();
			if name.is_empty() {
				return None;
			}
			let value = percent_decode_str(value.trim().trim_matches('"'))
				.decode_utf8_lossy()
				.into_owned();
			Some((name.to_string(), value))
		})
		.collect()
}

/// A cookie to send back with a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
	pub name: String,
	pub value: String,
	pub path: String,
	pub max_age: Option<i64>,
	pub http_only: bool,
	/// `Strict`, `Lax` or `None`; omitted when unset
	pub same_site: Option<&'static str>,
}

impl SetCookie {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			path: "/".to_string(),
			max_age: None,
			http_only: true,
			same_site: None,
		}
	}

	/// A cookie that tells the browser to drop `name`
	pub fn removal(name: impl Into<String>) -> Self {
		Self::new(name, "").with_max_age(0)
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();
		self
	}

	pub fn with_max_age(mut self, seconds: i64) -> Self {
		self.max_age = Some(seconds);
		self
	}

	pub fn with_same_site(mut self, same_site: &'static str) -> Self {
		self.same_site = Some(same_site);
		self
	}

	/// Header value for `Set-Cookie`
	///
	/// # Examples
	///
	/// ```
	/// use desk_http::cookie::SetCookie;
	///
	/// assert_eq!(SetCookie::new("a", "x y").header_value(), "a=x%20y; Path=/; HttpOnly");
	/// assert_eq!(SetCookie::removal("a").header_value(), "a=; Path=/; Max-Age=0; HttpOnly");
	/// assert_eq!(
	///     SetCookie::new("a", "1").with_same_site("Lax").header_value(),
	///     "a=1; Path=/; HttpOnly; SameSite=Lax"
	/// );
	/// ```
	pub fn header_value(&self) -> String {
		let mut value = format!(
			"{}={}; Path={}",
			self.name,
			utf8_percent_encode(&self.value, NON_ALPHANUMERIC),
			self.path
		);
		if let Some(max_age) = self.max_age {
			value.push_str(&format!("; Max-Age={}", max_age));
		}
		if self.http_only {
			value.push_str("; HttpOnly");
		}
		if let Some(same_site) = self.same_site {
			value.push_str(&format!("; SameSite={}", same_site));
		}
		value
	}
}
