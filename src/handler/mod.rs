//! The handler contract.
//!
//! Handlers and middleware receive the parsed request by shared reference
//! and a mutable header sink for the response they are about to cause.
//! Instead of returning plainly they may fail two ways: an
//! [`InstantResponse`] short-circuits with a ready-made response and extra
//! headers, and any ordinary error becomes a 500 (or whatever the server's
//! global error handler makes of it). Both are carried by [`HandlerError`],
//! so `?` works on either.

use std::error::Error;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::protocol::{HttpResponse, Request, ResponseHeaders};

/// Boxed error type carried by [`HandlerError::Failure`].
pub type BoxError = Box<dyn Error + Send + Sync>;

pub type HandlerResult = Result<HttpResponse, HandlerError>;

/// `Ok(Some(response))` intercepts the request; `Ok(None)` passes it on.
pub type InterceptResult = Result<Option<HttpResponse>, HandlerError>;

/// An async request handler. Implemented directly for stateful handlers,
/// or through [`handler_fn`] for plain async functions.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn handle(&self, request: &Request, headers: &mut ResponseHeaders) -> HandlerResult;
}

/// A middleware layer, run in registration order before routing.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn intercept(&self, request: &Request, headers: &mut ResponseHeaders)
        -> InterceptResult;
}

/// Why a handler did not return a response normally.
pub enum HandlerError {
    /// Short-circuit with a complete response; recovered by dispatch, never
    /// an actual failure.
    Instant(InstantResponse),
    /// A real failure, converted by the global error handler or a 500.
    Failure(BoxError),
}

impl HandlerError {
    pub fn failure(error: impl Into<BoxError>) -> Self {
        Self::Failure(error.into())
    }
}

impl From<InstantResponse> for HandlerError {
    fn from(instant: InstantResponse) -> Self {
        Self::Instant(instant)
    }
}

impl<E: Error + Send + Sync + 'static> From<E> for HandlerError {
    fn from(error: E) -> Self {
        Self::Failure(Box::new(error))
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(instant) => f.debug_tuple("Instant").field(&instant.response).finish(),
            Self::Failure(error) => f.debug_tuple("Failure").field(error).finish(),
        }
    }
}

/// The short-circuit payload: a finished response plus headers to merge
/// into the in-flight header sink.
///
/// Deliberately not an [`Error`]; it expresses control flow, not failure.
pub struct InstantResponse {
    pub(crate) response: HttpResponse,
    pub(crate) headers: ResponseHeaders,
}

impl InstantResponse {
    pub fn new(response: HttpResponse) -> Self {
        Self {
            response,
            headers: ResponseHeaders::new(),
        }
    }

    pub fn with_headers(response: HttpResponse, headers: ResponseHeaders) -> Self {
        Self { response, headers }
    }
}

/// Represents an async function over one request and its header sink.
///
/// The lifetime parameter ties the returned future to the borrowed
/// arguments, which is what lets plain `async fn`s act as handlers.
pub trait RequestFn<'a, Out>: Send + Sync {
    type Fut: Future<Output = Out> + Send + 'a;

    fn call(&self, request: &'a Request, headers: &'a mut ResponseHeaders) -> Self::Fut;
}

impl<'a, F, Fut, Out> RequestFn<'a, Out> for F
where
    F: Fn(&'a Request, &'a mut ResponseHeaders) -> Fut + Send + Sync,
    Fut: Future<Output = Out> + Send + 'a,
{
    type Fut = Fut;

    #[inline]
    fn call(&self, request: &'a Request, headers: &'a mut ResponseHeaders) -> Fut {
        self(request, headers)
    }
}

/// A [`RequestFn`] holder implementing [`HttpHandler`].
pub struct FnHandler<F>(F);

/// Wraps an async function as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> RequestFn<'a, HandlerResult>,
{
    FnHandler(f)
}

#[async_trait]
impl<F> HttpHandler for FnHandler<F>
where
    F: for<'a> RequestFn<'a, HandlerResult>,
{
    async fn handle(&self, request: &Request, headers: &mut ResponseHeaders) -> HandlerResult {
        self.0.call(request, headers).await
    }
}

/// A [`RequestFn`] holder implementing [`Middleware`].
pub struct FnMiddleware<F>(F);

/// Wraps an async function as a middleware layer.
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> RequestFn<'a, InterceptResult>,
{
    FnMiddleware(f)
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> RequestFn<'a, InterceptResult>,
{
    async fn intercept(
        &self,
        request: &Request,
        headers: &mut ResponseHeaders,
    ) -> InterceptResult {
        self.0.call(request, headers).await
    }
}
