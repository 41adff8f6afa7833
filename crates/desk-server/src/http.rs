use crate::DEFAULT_REALM;
use crate::shutdown::ShutdownCoordinator;
use bytes::Bytes;
use desk_http::{Handler, Middleware, MiddlewareChain, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Errors that stop the server or a connection
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("HTTP error: {0}")]
	Hyper(#[from] hyper::Error),

	#[error("Invalid response: {0}")]
	Response(#[from] hyper::http::Error),
}

/// HTTP/1.1 server in front of a handler and its middleware
pub struct HttpServer {
	pub handler: Arc<dyn Handler>,
	middlewares: Vec<Arc<dyn Middleware>>,
	realm: String,
}

impl HttpServer {
	/// # Examples
	///
	/// ```
	/// use desk_server::HttpServer;
	/// use desk_http::{Handler, Request, Response};
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
	/// let server = HttpServer::new(Arc::new(Hello)).with_realm("Archive");
	/// assert_eq!(server.realm(), "Archive");
	/// ```
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			handler,
			middlewares: Vec::new(),
			realm: DEFAULT_REALM.to_string(),
		}
	}

	/// Add a middleware; the first one added sees the request first
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	/// Realm of the Basic authentication challenge on 401 responses
	pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
		self.realm = realm.into();
		self
	}

	pub fn realm(&self) -> &str {
		&self.realm
	}

	fn build_handler(&self) -> Arc<dyn Handler> {
		if self.middlewares.is_empty() {
			return self.handler.clone();
		}

		let mut chain = MiddlewareChain::new(self.handler.clone());
		for middleware in &self.middlewares {
			chain.add_middleware(middleware.clone());
		}

		Arc::new(chain)
	}

	/// Bind `addr` and serve until the coordinator signals shutdown
	pub async fn listen_with_shutdown(
		self,
		addr: SocketAddr,
		coordinator: ShutdownCoordinator,
	) -> Result<(), ServerError> {
		let listener = TcpListener::bind(addr).await?;
		self.serve_listener(listener, coordinator).await
	}

	/// Serve connections from an already bound listener
	pub async fn serve_listener(
		self,
		listener: TcpListener,
		coordinator: ShutdownCoordinator,
	) -> Result<(), ServerError> {
		tracing::info!(addr = %listener.local_addr()?, "Server listening");

		let handler = self.build_handler();
		let realm: Arc<str> = Arc::from(self.realm.as_str());
		let mut shutdown_rx = coordinator.subscribe();

		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, socket_addr) = match result {
						Ok(accepted) => accepted,
						Err(err) => {
							tracing::warn!(error = %err, "Failed to accept connection");
							continue;
						}
					};
					let handler = handler.clone();
					let realm = realm.clone();
					let mut conn_shutdown = coordinator.subscribe();

					tokio::task::spawn(async move {
						tokio::select! {
							result = Self::handle_connection(stream, socket_addr, handler, realm) => {
								if let Err(err) = result {
									tracing::debug!(peer = %socket_addr, error = %err, "Connection closed with error");
								}
							}
							_ = conn_shutdown.recv() => {
								tracing::debug!(peer = %socket_addr, "Connection interrupted by shutdown");
							}
						}
					});
				}
				_ = shutdown_rx.recv() => {
					tracing::info!("Shutdown signal received, stopping server");
					break;
				}
			}
		}

		coordinator.notify_shutdown_complete();
		Ok(())
	}

	async fn handle_connection(
		stream: TcpStream,
		socket_addr: SocketAddr,
		handler: Arc<dyn Handler>,
		realm: Arc<str>,
	) -> Result<(), ServerError> {
		let io = TokioIo::new(stream);
		let service = RequestService {
			handler,
			remote_addr: socket_addr,
			realm,
		};

		http1::Builder::new().serve_connection(io, service).await?;

		Ok(())
	}
}

/// Bridges hyper requests to a desk handler
struct RequestService {
	handler: Arc<dyn Handler>,
	remote_addr: SocketAddr,
	realm: Arc<str>,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = ServerError;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let handler = self.handler.clone();
		let remote_addr = self.remote_addr;
		let realm = self.realm.clone();

		Box::pin(async move {
			let (parts, body) = req.into_parts();
			let body_bytes = body.collect().await?.to_bytes();

			let mut request = Request::new(parts.method, parts.uri, parts.version, parts.headers, body_bytes);
			request.remote_addr = Some(remote_addr);

			let response = match handler.handle(request).await {
				Ok(response) => response,
				Err(err) => {
					if err.status_code() >= 500 {
						tracing::error!(error = %err, "Request failed");
					}
					Response::from_error(&err, &realm)
				}
			};

			let mut hyper_response = hyper::Response::builder().status(response.status);
			for (key, value) in response.headers.iter() {
				hyper_response = hyper_response.header(key, value);
			}

			Ok(hyper_response.body(Full::new(response.body))?)
		})
	}
}

/// Serve `handler` on `addr` with the given middleware until shutdown
pub async fn serve_with_shutdown(
	addr: SocketAddr,
	handler: Arc<dyn Handler>,
	middlewares: Vec<Arc<dyn Middleware>>,
	coordinator: ShutdownCoordinator,
) -> Result<(), ServerError> {
	let server = middlewares
		.into_iter()
		.fold(HttpServer::new(handler), HttpServer::with_middleware);
	server.listen_with_shutdown(addr, coordinator).await
}
