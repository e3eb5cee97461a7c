//! Conditional request handling.

use crate::requester::Requester;
use bytes::Bytes;
use http::StatusCode;
use http::header::{CACHE_CONTROL, ETAG, HeaderName, HeaderValue, IF_MATCH, IF_NONE_MATCH};
use sha2::{Digest, Sha256};
use tracing::{trace, warn};

const NO_CACHE: &str = "no-cache";
const ANY: &str = "*";

/// Content fingerprint of `body`: its byte length and hex SHA-256 digest, joined by `-`.
pub fn fingerprint(body: &[u8]) -> String {
    format!("{}-{}", body.len(), hex::encode(Sha256::digest(body)))
}

/// Applies `ETag`, `If-None-Match` and `If-Match` semantics to a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ETagValidator {
    max_age_seconds: u32,
}

impl ETagValidator {
    pub fn new(max_age_seconds: u32) -> Self {
        Self { max_age_seconds }
    }

    pub fn max_age_seconds(&self) -> u32 {
        self.max_age_seconds
    }

    /// Post-processes the final `(status, body)` of an endpoint.
    ///
    /// Responses that are not 2xx, have an empty body, were requested with `Cache-Control:
    /// no-cache`, or carry no conditional header pass through untouched. Otherwise the `ETag`
    /// header is set and a fresh cache answers `304` (If-None-Match) or `412` (If-Match) with an
    /// empty body.
    pub fn apply(&self, requester: &mut dyn Requester, status: StatusCode, body: Bytes) -> (StatusCode, Bytes) {
        let if_none_match = requester.peek_header(IF_NONE_MATCH.as_str()).filter(|v| !v.is_empty());
        let if_match = requester.peek_header(IF_MATCH.as_str()).filter(|v| !v.is_empty());
        let no_cache = requester.peek_header(CACHE_CONTROL.as_str()).is_some_and(|v| v.contains(NO_CACHE));

        if !status.is_success() || body.is_empty() || no_cache || (if_none_match.is_none() && if_match.is_none()) {
            trace!(status = status.as_u16(), body_len = body.len(), no_cache, "skipping etag check");
            return (status, body);
        }

        let etag = fingerprint(&body);
        let outcome = match (if_none_match, if_match) {
            (Some(tags), _) => none_match(tags, &etag).then_some(StatusCode::NOT_MODIFIED),
            (None, Some(tags)) => (!matches(tags, &etag)).then_some(StatusCode::PRECONDITION_FAILED),
            (None, None) => None,
        };

        set_header(requester, ETAG, &etag);
        if self.max_age_seconds > 0 {
            trace!(max_age_seconds = self.max_age_seconds, "etag max age");
            set_header(requester, CACHE_CONTROL, &format!("max-age={}", self.max_age_seconds));
        }

        match outcome {
            Some(status) => {
                trace!(etag = etag.as_str(), status = status.as_u16(), "etag fresh");
                (status, Bytes::new())
            }
            None => {
                trace!(etag = etag.as_str(), "refreshed etag");
                (status, body)
            }
        }
    }
}

fn set_header(requester: &mut dyn Requester, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(header_value) => requester.set_response_header(name, header_value),
        Err(e) => warn!(cause = %e, header = %name, value, "invalid response header value"),
    }
}

fn tags(header: &str) -> impl Iterator<Item = &str> {
    header.split(',').map(str::trim)
}

fn none_match(header: &str, etag: &str) -> bool {
    tags(header).any(|tag| tag == ANY || tag == etag)
}

// a fingerprint never equals `*`, so `If-Match: *` always fails
fn matches(header: &str, etag: &str) -> bool {
    tags(header).any(|tag| tag == etag)
}
