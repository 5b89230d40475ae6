//! An embeddable asynchronous HTTP/1.1 server
//!
//! This crate provides a small, self-contained HTTP/1.1 server built on top
//! of tokio. A [`HttpServer`] owns a route table, a middleware chain, and a
//! set of server-wide response headers; handlers are async functions or
//! trait objects that receive the parsed request plus a header sink and
//! return a response. The server is embeddable: start it on a port, keep
//! using the same instance, stop it, start it again.
//!
//! # Features
//!
//! - Full request parsing: request line, headers, cookies, query strings,
//!   percent-decoding, `Content-Length` and chunked bodies
//! - Pattern routing with `:variable`, `*` and `**` segments
//! - Middleware chain with short-circuit responses
//! - Keep-alive connections and graceful shutdown
//! - Streaming response bodies and `101 Switching Protocols` handover
//! - Typed decoding of JSON bodies, URL-encoded forms, headers and
//!   query strings via serde
//! - Static file and directory handlers
//! - HTTP Basic authentication
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use skiff::{handler_fn, HandlerResult, HttpResponse, HttpResponseBody, HttpServer, Request, ResponseHeaders};
//! use tracing::{error, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! async fn hello(request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
//!     let name = request.path_params().get("name").unwrap_or("world");
//!     Ok(HttpResponse::Ok(HttpResponseBody::Text(format!("hello {name}!"))))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let server = Arc::new(HttpServer::new());
//!     server.get("/hello/:name", handler_fn(hello));
//!
//!     if let Err(e) = server.start(8080).await {
//!         error!(cause = %e, "server failed to start");
//!         return;
//!     }
//!
//!     tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
//!     server.stop();
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`server`]: The [`HttpServer`] itself: lifecycle, registration,
//!   dispatch, route groups, connection metrics
//! - [`router`]: Pattern matching of request paths to handlers
//! - [`handler`]: Handler and middleware traits and the function adapters
//! - [`protocol`]: Requests, responses, headers, multipart, error types
//! - [`codec`]: Reading requests off a connection and writing responses
//! - [`connection`]: The boxed byte stream a connection runs on
//! - [`form`]: URL-encoded form parsing into serde-decodable trees
//! - [`files`]: Static file and directory handlers
//! - [`auth`]: HTTP Basic authentication
//!
//! # Error Handling
//!
//! Fallible operations surface through error types that implement
//! `std::error::Error`:
//!
//! - [`ParseError`]: the request could not be parsed; the connection closes
//! - [`SendError`]: the response could not be written
//! - [`ServerError`]: the listener could not be bound
//! - [`HandlerError`]: a handler or middleware failed; the dispatcher turns
//!   this into an error response instead of tearing the connection down
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Request bodies are read fully into memory before dispatch

pub mod auth;
pub mod codec;
pub mod connection;
pub mod files;
pub mod form;
pub mod handler;
pub mod protocol;
pub mod router;
pub mod server;

mod util;

pub use auth::BasicAuthentication;
pub use codec::BodyWriter;
pub use connection::AsyncStream;
pub use connection::Connection;
pub use files::share_directory;
pub use files::share_file;
pub use files::DirectoryHandler;
pub use files::FileHandler;
pub use form::FormDecoder;
pub use form::FormError;
pub use form::FormValue;
pub use handler::handler_fn;
pub use handler::middleware_fn;
pub use handler::BoxError;
pub use handler::HandlerError;
pub use handler::HandlerResult;
pub use handler::HttpHandler;
pub use handler::InstantResponse;
pub use handler::InterceptResult;
pub use handler::Middleware;
pub use protocol::BodyWriterFn;
pub use protocol::CacheTime;
pub use protocol::CustomSerializerFn;
pub use protocol::HttpError;
pub use protocol::HttpResponse;
pub use protocol::HttpResponseBody;
pub use protocol::Method;
pub use protocol::MultiPart;
pub use protocol::ParseError;
pub use protocol::PathParams;
pub use protocol::PayloadSize;
pub use protocol::Request;
pub use protocol::RequestHeaders;
pub use protocol::ResponseHeaders;
pub use protocol::SendError;
pub use protocol::ServerError;
pub use protocol::SocketSessionFn;
pub use router::Router;
pub use server::ConnectionMetrics;
pub use server::GlobalErrorHandlerFn;
pub use server::HttpServer;
pub use server::RouteGroup;
pub use server::ServerDelegate;

/// Crate version, reported in the default `Server` response header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
