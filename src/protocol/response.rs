//! The response model.
//!
//! [`HttpResponse`] is a closed set of statuses rather than a bare numeric
//! code, so dispatch can match on outcomes and handlers cannot invent
//! malformed status lines. Anything outside the set goes through
//! [`HttpResponse::Raw`].

use std::fmt;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::codec::BodyWriter;
use crate::connection::Connection;
use crate::handler::BoxError;
use crate::protocol::error::SendError;
use crate::protocol::headers::ResponseHeaders;

/// Streams a response payload through the supplied [`BodyWriter`].
pub type BodyWriterFn =
    Box<dyn for<'a> Fn(BodyWriter<'a>) -> BoxFuture<'a, Result<(), SendError>> + Send + Sync>;

/// Takes over the connection after a `101 Switching Protocols` head.
pub type SocketSessionFn = Box<dyn FnOnce(Connection) -> BoxFuture<'static, ()> + Send + Sync>;

/// Serializes a [`HttpResponseBody::Custom`] payload on demand.
pub type CustomSerializerFn = Box<dyn Fn() -> Result<String, BoxError> + Send + Sync>;

/// Body length as known at header-writing time. [`PayloadSize::Unknown`]
/// suppresses `Content-Length` and forces the connection closed after the
/// response, since the client has no other way to find the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Unknown,
}

/// Response payload variants. Each one serializes eagerly when the response
/// is written, so the length is always known up front.
pub enum HttpResponseBody {
    Json(serde_json::Value),
    Html(String),
    /// Body fragment wrapped in a minimal UTF-8 `<html>` envelope.
    HtmlBody(String),
    Text(String),
    JavaScript(String),
    Data(Bytes, Option<String>),
    Custom(CustomSerializerFn),
}

impl HttpResponseBody {
    fn content(&self) -> (PayloadSize, BodyWriterFn) {
        let data: Bytes = match self {
            Self::Json(value) => serde_json::to_vec(value).unwrap_or_default().into(),
            Self::Html(text) | Self::Text(text) | Self::JavaScript(text) => {
                Bytes::copy_from_slice(text.as_bytes())
            }
            Self::HtmlBody(body) => Bytes::from(format!(
                "<html><meta charset=\"UTF-8\"><body>{body}</body></html>"
            )),
            Self::Data(data, _) => data.clone(),
            Self::Custom(serialize) => match serialize() {
                Ok(text) => Bytes::from(text),
                Err(error) => Bytes::from(format!("Serialisation error: {error}")),
            },
        };
        let size = PayloadSize::Length(data.len() as u64);
        let writer = boxed_writer(move |mut body_writer: BodyWriter<'_>| {
            let data = data.clone();
            Box::pin(async move { body_writer.write(&data).await })
        });
        (size, writer)
    }
}

/// Funnels a closure into the boxed writer-callback type. Going through a
/// generic function lets the compiler infer the higher-ranked signature,
/// which it will not do for a bare `Box::new`.
pub(crate) fn boxed_writer<F>(writer: F) -> BodyWriterFn
where
    F: for<'a> Fn(BodyWriter<'a>) -> BoxFuture<'a, Result<(), SendError>> + Send + Sync + 'static,
{
    Box::new(writer)
}

impl fmt::Debug for HttpResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json(_) => "Json",
            Self::Html(_) => "Html",
            Self::HtmlBody(_) => "HtmlBody",
            Self::Text(_) => "Text",
            Self::JavaScript(_) => "JavaScript",
            Self::Data(..) => "Data",
            Self::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

/// The outcome of handling a request.
pub enum HttpResponse {
    /// `101`, with extra headers for the handshake and a session that owns
    /// the connection once the head is on the wire.
    SwitchProtocols(ResponseHeaders, SocketSessionFn),
    Ok(HttpResponseBody),
    Created,
    Accepted,
    NoContent,
    MovedPermanently(String),
    MovedTemporarily(String),
    BadRequest(Option<HttpResponseBody>),
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    TooManyRequests,
    InternalServerError(Option<HttpResponseBody>),
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    /// Escape hatch for statuses outside the closed set.
    Raw(u16, String, Option<BodyWriterFn>),
}

impl HttpResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SwitchProtocols(..) => 101,
            Self::Ok(_) => 200,
            Self::Created => 201,
            Self::Accepted => 202,
            Self::NoContent => 204,
            Self::MovedPermanently(_) => 301,
            Self::MovedTemporarily(_) => 307,
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::NotAcceptable => 406,
            Self::TooManyRequests => 429,
            Self::InternalServerError(_) => 500,
            Self::NotImplemented => 501,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
            Self::Raw(code, ..) => *code,
        }
    }

    pub fn reason_phrase(&self) -> &str {
        match self {
            Self::SwitchProtocols(..) => "Switching Protocols",
            Self::Ok(_) => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NoContent => "No Content",
            Self::MovedPermanently(_) => "Moved Permanently",
            Self::MovedTemporarily(_) => "Moved Temporarily",
            Self::BadRequest(_) => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::NotAcceptable => "Not Acceptable",
            Self::TooManyRequests => "Too Many Requests",
            Self::InternalServerError(_) => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::Raw(_, phrase, _) => phrase,
        }
    }

    /// Headers implied by the response variant itself. `Content-Type` is
    /// derived only for `Ok` payloads that have an unambiguous type.
    pub(crate) fn auto_headers(&self) -> ResponseHeaders {
        let mut headers = ResponseHeaders::new();
        match self {
            Self::SwitchProtocols(switch_headers, _) => {
                headers.merge(switch_headers.clone());
            }
            Self::Ok(body) => match body {
                HttpResponseBody::Json(_) => {
                    headers.add("Content-Type", "application/json");
                }
                HttpResponseBody::Html(_) => {
                    headers.add("Content-Type", "text/html");
                }
                HttpResponseBody::JavaScript(_) => {
                    headers.add("Content-Type", "text/javascript");
                }
                HttpResponseBody::Data(_, content_type) => {
                    headers.add("Content-Type", content_type.clone().unwrap_or_default());
                }
                _ => {}
            },
            Self::MovedPermanently(location) | Self::MovedTemporarily(location) => {
                headers.add("Location", location);
            }
            _ => {}
        }
        headers
    }

    /// Builds a [`HttpResponse::Raw`] around a streaming body callback.
    ///
    /// The callback may run the writer any way it likes; the response is
    /// sent without `Content-Length` and the connection closes afterwards.
    pub fn raw_stream<F>(code: u16, phrase: impl Into<String>, writer: F) -> Self
    where
        F: for<'a> Fn(BodyWriter<'a>) -> BoxFuture<'a, Result<(), SendError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Raw(code, phrase.into(), Some(boxed_writer(writer)))
    }

    /// Decomposes the response into its payload size, body writer, and
    /// protocol-switch session. At most one of the last two is present.
    pub(crate) fn content(self) -> (PayloadSize, Option<BodyWriterFn>, Option<SocketSessionFn>) {
        match self {
            Self::SwitchProtocols(_, session) => (PayloadSize::Unknown, None, Some(session)),
            Self::Ok(body) => {
                let (size, writer) = body.content();
                (size, Some(writer), None)
            }
            Self::BadRequest(Some(body)) | Self::InternalServerError(Some(body)) => {
                let (size, writer) = body.content();
                (size, Some(writer), None)
            }
            Self::Raw(_, _, writer) => (PayloadSize::Unknown, writer, None),
            _ => (PayloadSize::Unknown, None, None),
        }
    }
}

/// Responses compare by status code alone, ignoring payloads. This is what
/// interception and test assertions want; two `Ok` responses with different
/// bodies are the same outcome.
impl PartialEq for HttpResponse {
    fn eq(&self, other: &Self) -> bool {
        self.status_code() == other.status_code()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpResponse({} {})",
            self.status_code(),
            self.reason_phrase()
        )
    }
}
