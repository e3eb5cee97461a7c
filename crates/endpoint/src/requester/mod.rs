//! The transport boundary of an endpoint.
//!
//! A [`Requester`] is supplied by the host for exactly one request/response pair. The endpoint
//! reads request facts through it and writes response headers back. Response writes replace any
//! earlier value for the same header.

mod http_requester;

pub use http_requester::HttpRequester;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub trait Requester: Send + Sync {
    fn request_id(&self) -> &str;

    fn method(&self) -> &Method;

    /// The request path, without the query string.
    fn path(&self) -> &str;

    /// The route template the router matched, e.g. `/resources/{id}`.
    fn matched_path(&self) -> &str;

    fn content_type(&self) -> Option<&str> {
        self.peek_header(CONTENT_TYPE.as_str())
    }

    fn accept(&self) -> Option<&str> {
        self.peek_header(ACCEPT.as_str())
    }

    /// Looks up a request header by name. Values that are not visible ASCII are reported as absent.
    fn peek_header(&self, name: &str) -> Option<&str>;

    /// Calls `visitor` once for every request header.
    fn visit_headers(&self, visitor: &mut dyn FnMut(&str, &[u8]));

    fn path_param(&self, name: &str) -> Option<&str>;

    fn query_param(&self, name: &str) -> Option<&str>;

    fn request_body(&self) -> &[u8];

    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue);

    fn set_response_content_type(&mut self, content_type: &str);
}
