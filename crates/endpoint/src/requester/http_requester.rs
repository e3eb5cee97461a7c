use crate::requester::{Requester, X_REQUEST_ID};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// A [`Requester`] over the `http` crate's request types.
///
/// The request body must already be collected; path parameters are supplied by the router that
/// matched the route. Response headers written by the endpoint are kept until
/// [`into_response`](HttpRequester::into_response) builds the outgoing response.
#[derive(Debug)]
pub struct HttpRequester {
    parts: Parts,
    body: Bytes,
    request_id: String,
    matched_path: String,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    response_headers: HeaderMap,
}

impl HttpRequester {
    pub fn new(request: Request<Bytes>, matched_path: impl Into<String>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body, matched_path)
    }

    /// Collects the request body, then wraps the request.
    pub async fn collect<B>(request: Request<B>, matched_path: impl Into<String>) -> Result<Self, B::Error>
    where
        B: Body<Data = Bytes>,
    {
        let (parts, body) = request.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self::from_parts(parts, body, matched_path))
    }

    pub fn from_parts(parts: Parts, body: Bytes, matched_path: impl Into<String>) -> Self {
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

        let query_params = parts.uri.query().map(parse_query).unwrap_or_default();

        Self {
            parts,
            body,
            request_id,
            matched_path: matched_path.into(),
            path_params: HashMap::new(),
            query_params,
            response_headers: HeaderMap::new(),
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Builds the outgoing response from the endpoint's output and the collected response headers.
    pub fn into_response(self, status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = self.response_headers;
        response
    }
}

/// Parses `query` pair by pair. A repeated key keeps its last value; keys are taken verbatim, so
/// `x[y]=1` binds the key `x[y]`.
fn parse_query(query: &str) -> HashMap<String, String> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            warn!(cause = %e, query, "failed to parse query string");
            HashMap::new()
        }
    }
}

impl Requester for HttpRequester {
    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn path(&self) -> &str {
        self.parts.uri.path()
    }

    fn matched_path(&self) -> &str {
        &self.matched_path
    }

    fn peek_header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn visit_headers(&self, visitor: &mut dyn FnMut(&str, &[u8])) {
        for (name, value) in &self.parts.headers {
            visitor(name.as_str(), value.as_bytes());
        }
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    fn request_body(&self) -> &[u8] {
        &self.body
    }

    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    fn set_response_content_type(&mut self, content_type: &str) {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                self.response_headers.insert(CONTENT_TYPE, value);
            }
            Err(e) => warn!(cause = %e, content_type, "invalid response content type"),
        }
    }
}
