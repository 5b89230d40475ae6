use std::error::Error;
use std::sync::Arc;

use crate::handler::{HandlerError, HandlerResult, HttpHandler, Middleware};
use crate::protocol::{HttpResponse, HttpResponseBody, PathParams, Request, ResponseHeaders};

use super::HttpServer;

/// Application hook consulted when a handler fails with a real error.
pub type GlobalErrorHandlerFn = Box<
    dyn Fn(&(dyn Error + Send + Sync), &Request, &mut ResponseHeaders) -> HttpResponse
        + Send
        + Sync,
>;

/// What the connection driver should do with one request.
pub(crate) enum Dispatched {
    /// The response is already decided; write it out.
    Instant(HttpResponse),
    /// Run this handler with these path variables injected.
    Handler(PathParams, Arc<dyn HttpHandler>),
}

impl HttpServer {
    /// Runs the middleware chain, then consults the route table.
    ///
    /// Middleware runs in registration order before any routing. An
    /// intercept, an instant response, or a failure settles the request on
    /// the spot. An unrouted path falls back to the not-found handler when
    /// one is registered, else to a bare 404.
    pub(crate) async fn dispatch(
        &self,
        request: &Request,
        headers: &mut ResponseHeaders,
    ) -> Dispatched {
        let chain: Vec<Arc<dyn Middleware>> = self.middleware.read().unwrap().clone();
        for middleware in chain {
            match middleware.intercept(request, headers).await {
                Ok(None) => {}
                Ok(Some(response)) => return Dispatched::Instant(response),
                Err(failure) => {
                    return Dispatched::Instant(self.convert_failure(failure, request, headers))
                }
            }
        }

        let routed = self
            .router
            .read()
            .unwrap()
            .route(request.method(), request.path());
        if let Some((params, handler)) = routed {
            return Dispatched::Handler(params, handler);
        }

        match self.not_found.read().unwrap().clone() {
            Some(handler) => Dispatched::Handler(PathParams::empty(), handler),
            None => Dispatched::Instant(HttpResponse::NotFound),
        }
    }

    /// Settles a handler outcome into a response.
    pub(crate) fn resolve(
        &self,
        outcome: HandlerResult,
        request: &Request,
        headers: &mut ResponseHeaders,
    ) -> HttpResponse {
        match outcome {
            Ok(response) => response,
            Err(failure) => self.convert_failure(failure, request, headers),
        }
    }

    fn convert_failure(
        &self,
        failure: HandlerError,
        request: &Request,
        headers: &mut ResponseHeaders,
    ) -> HttpResponse {
        match failure {
            HandlerError::Instant(instant) => {
                headers.merge(instant.headers);
                instant.response
            }
            HandlerError::Failure(failure) => match self.error_handler.read().unwrap().as_ref() {
                Some(on_error) => on_error(failure.as_ref(), request, headers),
                None => HttpResponse::InternalServerError(Some(HttpResponseBody::Text(format!(
                    "Unexpected error {failure}"
                )))),
            },
        }
    }
}
