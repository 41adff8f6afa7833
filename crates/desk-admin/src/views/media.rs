//! Stored uploads for signed-in users
//!
//! Uploads come from users, so only types a browser cannot run as a page
//! are shown inline; everything else is sent as a download.

use crate::site::AdminSite;
use desk_core::{AuthUser, DeskResult};
use desk_http::Response;

/// Types shown in the browser; never SVG, which may carry scripts
const INLINE_TYPES: &[&str] = &[
	"application/pdf",
	"image/gif",
	"image/jpeg",
	"image/png",
	"image/webp",
];

/// Last path segment restricted to characters safe in a quoted header value
fn download_name(path: &str) -> String {
	let name: String = path
		.rsplit('/')
		.next()
		.unwrap_or_default()
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
		.collect();
	if name.is_empty() { "download".to_string() } else { name }
}

fn content_disposition(mime: &str, path: &str) -> String {
	let kind = if INLINE_TYPES.contains(&mime) { "inline" } else { "attachment" };
	format!("{}; filename=\"{}\"", kind, download_name(path))
}

pub(crate) async fn serve(site: &AdminSite, user: &AuthUser, path: &str) -> DeskResult<Response> {
	let bytes = site.storage.open(path).await?;
	let mime = mime_guess::from_path(path).first_or_octet_stream();
	tracing::debug!(file = path, user = %user.username, bytes = bytes.len(), "Serving stored file");
	Ok(Response::ok()
		.with_content_type(mime.essence_str())
		.with_header("Content-Disposition", &content_disposition(mime.essence_str(), path))
		.with_header("X-Content-Type-Options", "nosniff")
		.with_header("Cache-Control", "private")
		.with_body(bytes))
}
