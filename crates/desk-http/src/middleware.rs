//! Handler and middleware traits
//!
//! ```rust
//! use desk_http::{Handler, Middleware, Request, Response};
//! use desk_core::DeskResult;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _request: Request) -> DeskResult<Response> {
//!         Ok(Response::html("Hello"))
//!     }
//! }
//!
//! struct Noop;
//!
//! #[async_trait]
//! impl Middleware for Noop {
//!     async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response> {
//!         next.handle(request).await
//!     }
//! }
//! ```

use crate::{Request, Response};
use async_trait::async_trait;
use desk_core::DeskResult;
use std::sync::Arc;

/// Turns a request into a response
#[async_trait]
pub trait Handler: Send + Sync {
	async fn handle(&self, request: Request) -> DeskResult<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request) -> DeskResult<Response> {
		(**self).handle(request).await
	}
}

/// Wraps the next handler of a chain
#[async_trait]
pub trait Middleware: Send + Sync {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response>;
}

/// Middleware composed in front of a handler
///
/// The first middleware added sees the request first.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
		self.middlewares.push(middleware);
	}
}

/// One link of the chain: a middleware and everything behind it
struct Link {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Link {
	async fn handle(&self, request: Request) -> DeskResult<Response> {
		self.middleware.process(request, self.next.clone()).await
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request) -> DeskResult<Response> {
		let mut current = self.handler.clone();
		for middleware in self.middlewares.iter().rev() {
			current = Arc::new(Link {
				middleware: middleware.clone(),
				next: current,
			});
		}
		current.handle(request).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	struct Echo;

	#[async_trait]
	impl Handler for Echo {
		async fn handle(&self, request: Request) -> DeskResult<Response> {
			Ok(Response::html(request.path().to_string()))
		}
	}

	struct Trace {
		name: &'static str,
		seen: Arc<Mutex<Vec<&'static str>>>,
	}

	#[async_trait]
	impl Middleware for Trace {
		async fn process(&self, request: Request, next: Arc<dyn Handler>) -> DeskResult<Response> {
			self.seen.lock().unwrap().push(self.name);
			next.handle(request).await
		}
	}

	struct Deny;

	#[async_trait]
	impl Middleware for Deny {
		async fn process(&self, _request: Request, _next: Arc<dyn Handler>) -> DeskResult<Response> {
			Err(desk_core::DeskError::Unauthenticated)
		}
	}

	#[tokio::test]
	async fn test_middleware_runs_in_insertion_order() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let chain = MiddlewareChain::new(Arc::new(Echo))
			.with_middleware(Arc::new(Trace { name: "outer", seen: seen.clone() }))
			.with_middleware(Arc::new(Trace { name: "inner", seen: seen.clone() }));

		let request = Request::builder().uri("/contract/").build().unwrap();
		let response = chain.handle(request).await.unwrap();

		assert_eq!(response.text(), "/contract/");
		assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
	}

	#[tokio::test]
	async fn test_middleware_can_short_circuit() {
		let chain = MiddlewareChain::new(Arc::new(Echo)).with_middleware(Arc::new(Deny));
		let request = Request::builder().build().unwrap();
		assert!(chain.handle(request).await.is_err());
	}
}
