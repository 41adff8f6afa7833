//! Form body decoding
//!
//! Both `application/x-www-form-urlencoded` and `multipart/form-data` bodies
//! decode into a [`FormData`]; repeated keys keep every value in order.

use bytes::Bytes;
use desk_core::{DeskError, DeskResult, FormData, UploadedFile};
use futures::stream::once;
use std::future::ready;

/// Largest body the desk accepts, uploads included
pub const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Decode an urlencoded body
///
/// # Examples
///
/// ```
/// use desk_http::body::parse_urlencoded;
///
/// let data = parse_urlencoded(b"number=K%2D1&stage_begin=1&stage_begin=3&note=a+b").unwrap();
/// assert_eq!(data.get("number"), Some("K-1"));
/// assert_eq!(data.get_all("stage_begin"), ["1", "3"]);
/// assert_eq!(data.get("note"), Some("a b"));
/// ```
pub fn parse_urlencoded(body: &[u8]) -> DeskResult<FormData> {
	let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
		.map_err(|e| DeskError::BadRequest(format!("Malformed form body: {}", e)))?;
	Ok(FormData::from_pairs(pairs))
}

/// Decode a multipart body; file parts with a file name become uploads
pub async fn parse_multipart(content_type: &str, body: Bytes) -> DeskResult<FormData> {
	let boundary = multer::parse_boundary(content_type)
		.map_err(|e| DeskError::BadRequest(format!("Failed to parse boundary: {}", e)))?;
	let stream = once(ready(Ok::<_, std::io::Error>(body)));
	let mut multipart = multer::Multipart::new(stream, boundary);

	let mut data = FormData::new();
	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|e| DeskError::BadRequest(format!("Failed to read multipart field: {}", e)))?
	{
		let Some(name) = field.name().map(str::to_string) else {
			continue;
		};
		match field.file_name().map(str::to_string) {
			Some(filename) => {
				let content_type = field.content_type().map(|mime| mime.to_string());
				let bytes = field
					.bytes()
					.await
					.map_err(|e| DeskError::BadRequest(format!("Failed to read file field: {}", e)))?;
				// Browsers send an empty part for a file input left blank
				if filename.is_empty() && bytes.is_empty() {
					continue;
				}
				data.insert_file(
					name,
					UploadedFile {
						filename,
						content_type,
						bytes: bytes.to_vec(),
					},
				);
			}
			None => {
				let text = field
					.text()
					.await
					.map_err(|e| DeskError::BadRequest(format!("Failed to read text field: {}", e)))?;
				data.append(name, text);
			}
		}
	}
	Ok(data)
}

/// Decode a form body according to its content type
///
/// An empty body, or one without a form content type, yields empty data.
pub async fn parse_form(content_type: Option<&str>, body: Bytes) -> DeskResult<FormData> {
	if body.len() > MAX_BODY_SIZE {
		return Err(DeskError::BadRequest(format!(
			"Request body of {} bytes exceeds the {} byte limit",
			body.len(),
			MAX_BODY_SIZE
		)));
	}
	match content_type {
		Some(ct) if ct.starts_with("multipart/form-data") => parse_multipart(ct, body).await,
		Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => parse_urlencoded(&body),
		_ if body.is_empty() => Ok(FormData::new()),
		other => Err(DeskError::BadRequest(format!(
			"Expected a form body, got {}",
			other.unwrap_or("no content type")
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BOUNDARY: &str = "X-DESK-BOUNDARY";

	fn multipart_body() -> Bytes {
		let body = [
			format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"number\"\r\n\r\nK-7\r\n"),
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"act.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF\r\n"
			),
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"scan\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n"
			),
			format!("--{BOUNDARY}--\r\n"),
		]
		.concat();
		Bytes::from(body)
	}

	#[tokio::test]
	async fn test_multipart_fields_and_files() {
		let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
		let data = parse_form(Some(&content_type), multipart_body()).await.unwrap();

		assert_eq!(data.get("number"), Some("K-7"));
		let file = data.file("file").unwrap();
		assert_eq!(file.filename, "act.pdf");
		assert_eq!(file.bytes, b"%PDF");
		assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
		assert!(data.file("scan").is_none());
	}

	#[tokio::test]
	async fn test_unknown_content_type_rejected() {
		let err = parse_form(Some("application/json"), Bytes::from_static(b"{}")).await.unwrap_err();
		assert!(matches!(err, DeskError::BadRequest(_)));
	}

	#[tokio::test]
	async fn test_empty_body_without_content_type() {
		let data = parse_form(None, Bytes::new()).await.unwrap();
		assert!(data.is_empty());
	}
}
