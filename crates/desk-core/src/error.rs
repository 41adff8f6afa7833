use thiserror::Error;

/// Error type shared by every Contract Desk crate
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeskError {
	/// Declarative configuration is inconsistent (list settings, missing model)
	#[error("Improperly configured: {0}")]
	ImproperlyConfigured(String),

	/// Object or page does not exist, or the user may not see it
	#[error("Not found: {0}")]
	NotFound(String),

	/// Request carries no valid credentials
	#[error("Authentication required")]
	Unauthenticated,

	/// Request refused outright, such as a failed CSRF check
	#[error("Forbidden: {0}")]
	Forbidden(String),

	/// Malformed request body or parameters
	#[error("Bad request: {0}")]
	BadRequest(String),

	/// Validation error
	#[error("Validation error: {0}")]
	Validation(String),

	/// Deletion refused because dependent objects are protected
	#[error("Deletion blocked by {0} protected object(s)")]
	Protected(usize),

	/// Slug does not follow `model-obj-related`
	#[error("Invalid slug: {0}")]
	InvalidSlug(String),

	/// Database error
	#[error("Database error: {0}")]
	Database(String),

	/// Template rendering error
	#[error("Template rendering error: {0}")]
	Template(String),

	/// File storage error
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Result type for Contract Desk operations
pub type DeskResult<T> = Result<T, DeskError>;

impl DeskError {
	/// HTTP status code the error is reported with
	///
	/// Permission failures are raised as `NotFound` so they surface as 404.
	///
	/// # Examples
	///
	/// ```
	/// use desk_core::DeskError;
	///
	/// assert_eq!(DeskError::NotFound("contract".into()).status_code(), 404);
	/// assert_eq!(DeskError::Unauthenticated.status_code(), 401);
	/// assert_eq!(DeskError::Database("locked".into()).status_code(), 500);
	/// ```
	pub fn status_code(&self) -> u16 {
		match self {
			DeskError::NotFound(_) | DeskError::InvalidSlug(_) => 404,
			DeskError::Unauthenticated => 401,
			DeskError::Forbidden(_) => 403,
			DeskError::BadRequest(_) | DeskError::Validation(_) => 400,
			DeskError::Protected(_) => 409,
			DeskError::ImproperlyConfigured(_)
			| DeskError::Database(_)
			| DeskError::Template(_)
			| DeskError::Storage(_) => 500,
		}
	}

	pub fn not_found() -> Self {
		DeskError::NotFound("No object matches the given query.".to_string())
	}
}

impl From<sqlx::Error> for DeskError {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::RowNotFound => DeskError::not_found(),
			other => DeskError::Database(other.to_string()),
		}
	}
}

impl From<std::io::Error> for DeskError {
	fn from(err: std::io::Error) -> Self {
		DeskError::Storage(err.to_string())
	}
}

impl From<serde_json::Error> for DeskError {
	fn from(err: serde_json::Error) -> Self {
		DeskError::BadRequest(err.to_string())
	}
}

impl From<tera::Error> for DeskError {
	fn from(err: tera::Error) -> Self {
		// Tera keeps the useful detail in the source chain
		let mut message = err.to_string();
		let mut source = std::error::Error::source(&err);
		while let Some(inner) = source {
			message.push_str(": ");
			message.push_str(&inner.to_string());
			source = inner.source();
		}
		DeskError::Template(message)
	}
}
