//! # Contract Desk HTTP
//!
//! The request and response types every desk handler speaks, the
//! [`Handler`] and [`Middleware`] traits, form body decoding and cookies.
//! The server crate converts between these types and hyper's.

pub mod body;
pub mod cookie;
pub mod csrf;
pub mod extensions;
pub mod middleware;
pub mod request;
pub mod response;

pub use cookie::SetCookie;
pub use csrf::CsrfToken;
pub use extensions::Extensions;
pub use middleware::{Handler, Middleware, MiddlewareChain};
pub use request::{Request, RequestBuilder};
pub use response::Response;

pub use hyper::{Method, StatusCode};
