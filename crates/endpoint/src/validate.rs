//! Request and response body validation.
//!
//! Validation failures are not hard errors: the returned [`StatusError`] is passed through to the
//! error responder verbatim, on the assumption that it carries information meant for the caller.

use crate::context::Context;
use crate::error::StatusError;
use async_trait::async_trait;
use http::StatusCode;

#[async_trait]
pub trait RequestValidator: Send + Sync {
    /// Validates the raw request body, after it has been decoded successfully.
    async fn validate_request(&self, ctx: &Context, body: &[u8]) -> Result<(), StatusError>;
}

#[async_trait]
pub trait ResponseValidator: Send + Sync {
    /// Validates the encoded response body and the status the handler returned.
    async fn validate_response(&self, ctx: &Context, status: StatusCode, body: &[u8]) -> Result<(), StatusError>;
}
