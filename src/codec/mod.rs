//! Wire codec for HTTP/1.1 framing.
//!
//! [`request_reader`] turns connection bytes into a [`crate::protocol::Request`];
//! [`response_writer`] turns a [`crate::protocol::HttpResponse`] back into
//! bytes and settles the keep-alive decision.

mod request_reader;
pub(crate) use request_reader::read_request;

mod response_writer;
pub(crate) use response_writer::respond;
pub use response_writer::BodyWriter;
