//! One-shot flash messages
//!
//! Messages queued while handling a POST ride the redirect in the
//! `messages` cookie (JSON, base64url) and are shown once by the next
//! rendered page, which clears the cookie. Unreadable cookie data is
//! ignored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use desk_core::DeskResult;
use desk_http::{Request, Response, SetCookie};
use serde::{Deserialize, Serialize};

pub const COOKIE_NAME: &str = "messages";

/// Largest cookie value the browser is trusted to keep
pub const MAX_COOKIE_SIZE: usize = 4096;

pub const NO_CHANGES: &str = "No changes. Save cancelled.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
	Success,
	Warning,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub level: Level,
	pub text: String,
}

impl Message {
	pub fn new(level: Level, text: impl Into<String>) -> Self {
		Self {
			level,
			text: text.into(),
		}
	}

	pub fn success(text: impl Into<String>) -> Self {
		Self::new(Level::Success, text)
	}

	pub fn warning(text: impl Into<String>) -> Self {
		Self::new(Level::Warning, text)
	}

	pub fn no_changes() -> Self {
		Self::warning(NO_CHANGES)
	}
}

/// Cookie value for `messages`, dropping the oldest ones that do not fit
///
/// # Examples
///
/// ```
/// use desk_admin::messages::{decode, encode};
/// use desk_admin::Message;
///
/// let value = encode(&[Message::success("Letter 12 was successfully added.")]).unwrap();
/// assert_eq!(decode(&value), vec![Message::success("Letter 12 was successfully added.")]);
/// assert!(decode("not base64 json").is_empty());
/// ```
pub fn encode(messages: &[Message]) -> DeskResult<String> {
	let mut kept = messages;
	loop {
		let value = URL_SAFE_NO_PAD.encode(serde_json::to_vec(kept)?);
		if value.len() <= MAX_COOKIE_SIZE || kept.is_empty() {
			return Ok(value);
		}
		kept = &kept[1..];
	}
}

pub fn decode(raw: &str) -> Vec<Message> {
	URL_SAFE_NO_PAD
		.decode(raw.trim())
		.ok()
		.and_then(|bytes| serde_json::from_slice(&bytes).ok())
		.unwrap_or_default()
}

/// Messages carried by the request's cookie
pub fn from_request(request: &Request) -> Vec<Message> {
	request
		.cookie(COOKIE_NAME)
		.map(|raw| decode(&raw))
		.unwrap_or_default()
}

/// Redirect to `location`, carrying `messages` to the next page
pub fn redirect_with(location: &str, messages: &[Message]) -> DeskResult<Response> {
	let response = Response::redirect(location);
	if messages.is_empty() {
		return Ok(response);
	}
	Ok(response.with_cookie(&SetCookie::new(COOKIE_NAME, encode(messages)?)))
}

/// Drop the cookie once its messages were shown
pub fn consumed(response: Response, shown: &[Message]) -> Response {
	if shown.is_empty() {
		response
	} else {
		response.with_cookie(&SetCookie::removal(COOKIE_NAME))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_oversized_queue_keeps_newest() {
		let long = "x".repeat(MAX_COOKIE_SIZE / 2);
		let messages = vec![
			Message::success(format!("first {}", long)),
			Message::success(format!("second {}", long)),
			Message::warning("last"),
		];
		let kept = decode(&encode(&messages).unwrap());
		assert_eq!(kept.last(), Some(&Message::warning("last")));
		assert!(kept.len() < messages.len());
	}

	#[rstest]
	fn test_redirect_sets_cookie() {
		let response = redirect_with("/contract/contract-0-0/", &[Message::no_changes()]).unwrap();
		let cookie = response.headers.get("set-cookie").unwrap().to_str().unwrap();
		assert!(cookie.starts_with("messages="));
	}

	#[rstest]
	fn test_request_cookie_is_read() {
		let value = encode(&[Message::no_changes()]).unwrap();
		let request = Request::builder()
			.header("cookie", &format!("{}={}", COOKIE_NAME, value))
			.build()
			.unwrap();
		assert_eq!(from_request(&request), vec![Message::no_changes()]);
	}

	#[rstest]
	fn test_consumed_without_messages_leaves_cookie_alone() {
		let response = consumed(Response::html("ok"), &[]);
		assert!(response.headers.get("set-cookie").is_none());
	}
}
