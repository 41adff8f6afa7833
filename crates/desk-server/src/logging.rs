use async_trait::async_trait;
use chrono::Utc;
use desk_core::DeskResult;
use desk_http::{Handler, Middleware, Request, Response};
use std::sync::Arc;

/// Logs method, path, status and duration of each request
///
/// # Examples
///
/// ```
/// use desk_server::LoggingMiddleware;
/// use desk_http::{Handler, Middleware, Request, Response, StatusCode};
/// use desk_core::DeskResult;
/// use std::sync::Arc;
///
/// struct Hello;
///
/// #[async_trait::async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, _request: Request) -> DeskResult<Response> {
///         Ok(Response::html("Hello"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let request = Request::builder().uri("/contract/").build().unwrap();
/// let response = LoggingMiddleware::new().process(request, Arc::new(Hello)).await.unwrap();
/// assert_eq!(response.status, StatusCode::OK);
/// # });
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Middleware for LoggingMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response> {
		let start = Utc::now();
		let method = request.method.to_string();
		let path = request.path().to_string();
		let peer = request.remote_addr.map(|addr| addr.to_string()).unwrap_or_default();

		let result = next.handle(request).await;

		let elapsed_ms = Utc::now().signed_duration_since(start).num_milliseconds();
		match &result {
			Ok(response) => tracing::info!(
				%method,
				%path,
				%peer,
				status = response.status.as_u16(),
				elapsed_ms,
				"Request served"
			),
			Err(err) => tracing::warn!(
				%method,
				%path,
				%peer,
				status = err.status_code(),
				error = %err,
				elapsed_ms,
				"Request failed"
			),
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_core::DeskError;

	struct Missing;

	#[async_trait]
	impl Handler for Missing {
		async fn handle(&self, _request: Request) -> DeskResult<Response> {
			Err(DeskError::not_found())
		}
	}

	#[tokio::test]
	async fn test_errors_pass_through_unchanged() {
		let request = Request::builder().uri("/nowhere/").build().unwrap();
		let result = LoggingMiddleware::new().process(request, Arc::new(Missing)).await;
		assert!(matches!(result, Err(DeskError::NotFound(_))));
	}
}
