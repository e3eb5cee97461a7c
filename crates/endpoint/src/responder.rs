//! Error response rendering.
//!
//! Every failure of the endpoint pipeline is funneled through [`ErrorResponder`], which asks the
//! configured [`ErrorStrategy`] for a payload and encodes it with the negotiated response codec.

use crate::codec::MimeHandler;
use crate::context::Context;
use crate::endpoint::panic_message;
use crate::error::StatusError;
use crate::requester::Requester;
use bytes::Bytes;
use http::StatusCode;
use serde_json::{Value, json};
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Maps a failure to the status and payload written to the caller.
pub trait ErrorStrategy: Send + Sync {
    fn handle_error(
        &self,
        ctx: &Context,
        status: StatusCode,
        error: &(dyn Error + Send + Sync + 'static),
    ) -> (StatusCode, Value);
}

/// Renders every error as `{"message": "<error>"}` and keeps the status unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorStrategy;

impl ErrorStrategy for DefaultErrorStrategy {
    fn handle_error(
        &self,
        _ctx: &Context,
        status: StatusCode,
        error: &(dyn Error + Send + Sync + 'static),
    ) -> (StatusCode, Value) {
        (status, json!({ "message": error.to_string() }))
    }
}

pub struct ErrorResponder<'a> {
    strategy: &'a dyn ErrorStrategy,
}

impl fmt::Debug for ErrorResponder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorResponder").finish_non_exhaustive()
    }
}

impl<'a> ErrorResponder<'a> {
    pub fn new(strategy: &'a dyn ErrorStrategy) -> Self {
        Self { strategy }
    }

    /// Renders `error` for the wire.
    ///
    /// Without a negotiated response codec the error is rendered as plain text. When the strategy
    /// or the codec fails, or panics, while rendering, the response degrades to a plain-text 500.
    /// This never panics.
    pub fn respond(
        &self,
        ctx: &Context,
        requester: &mut dyn Requester,
        response_mime: Option<MimeHandler<'_>>,
        error: StatusError,
    ) -> (StatusCode, Bytes) {
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| self.render(ctx, requester, response_mime, error)));

        match rendered {
            Ok(Some(response)) => response,
            Ok(None) => internal_server_error(requester),
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "error rendering panicked");
                internal_server_error(requester)
            }
        }
    }

    fn render(
        &self,
        ctx: &Context,
        requester: &mut dyn Requester,
        response_mime: Option<MimeHandler<'_>>,
        error: StatusError,
    ) -> Option<(StatusCode, Bytes)> {
        let (status, error) = error.into_parts();

        if status.is_server_error() {
            error!(status = status.as_u16(), cause = %error, "endpoint failure");
        } else {
            debug!(status = status.as_u16(), cause = %error, "endpoint error");
        }

        let Some(negotiated) = response_mime else {
            requester.set_response_content_type(mime::TEXT_PLAIN_UTF_8.as_ref());
            let body = Bytes::from(error.to_string());
            debug!(status = status.as_u16(), "plain text error response");
            return Some((status, body));
        };

        let (status, payload) = self.strategy.handle_error(ctx, status, error.as_ref());
        match negotiated.marshal(&payload) {
            Ok(body) => {
                debug!(status = status.as_u16(), mime_type = negotiated.mime_type(), "error response");
                Some((status, body))
            }
            Err(e) => {
                error!(cause = %e, mime_type = negotiated.mime_type(), "failed to marshal error response");
                None
            }
        }
    }
}

fn internal_server_error(requester: &mut dyn Requester) -> (StatusCode, Bytes) {
    requester.set_response_content_type(mime::TEXT_PLAIN_UTF_8.as_ref());
    (StatusCode::INTERNAL_SERVER_ERROR, Bytes::from_static(INTERNAL_SERVER_ERROR.as_bytes()))
}
