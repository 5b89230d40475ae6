//! Core HTTP protocol types.
//!
//! Everything the wire layer and handlers exchange lives here:
//!
//! - **Requests** ([`request`]): the parsed [`Request`] with its typed
//!   decoding helpers, and the [`PathParams`] bound by the router.
//! - **Responses** ([`response`]): the closed [`HttpResponse`] status set,
//!   its payload variants, and the callback types for streamed bodies and
//!   protocol-switch sessions.
//! - **Headers** ([`headers`]): the asymmetric header collections. Request
//!   headers collapse to lowercase with first-wins duplicates; response
//!   headers keep name casing and insertion order.
//! - **Multipart** ([`multipart`]): `multipart/form-data` splitting.
//! - **Errors** ([`error`]): parse and send failures, separated so the
//!   connection driver can tell "bad input" from "broken socket".

mod method;
pub use method::Method;

mod headers;
pub use headers::CacheTime;
pub use headers::RequestHeaders;
pub use headers::ResponseHeaders;

mod request;
pub use request::PathParams;
pub use request::Request;

mod multipart;
pub use multipart::MultiPart;

mod response;
pub use response::BodyWriterFn;
pub use response::CustomSerializerFn;
pub use response::HttpResponse;
pub use response::HttpResponseBody;
pub use response::PayloadSize;
pub use response::SocketSessionFn;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::ServerError;
