//! The per-request execution pipeline.
//!
//! An [`Endpoint`] pairs a route's [`Config`] with a handler's [`HandlerDescriptor`] and runs
//! every request through the same ordered phases: content negotiation, binding, auth, request
//! body decoding and validation, the handler itself, response encoding and validation, and
//! conditional caching. Any phase may short-circuit into the [`ErrorResponder`]. The deadline and
//! cancellation signal are checked at every phase boundary, and a panic anywhere in the pipeline
//! is turned into a sanitized 500.

use crate::binder::HandlerDescriptor;
use crate::codec::MimeHandler;
use crate::config::Config;
use crate::context::Context;
use crate::error::{ConfigError, EndpointError, StatusError};
use crate::handler::Handler;
use crate::requester::Requester;
use crate::responder::ErrorResponder;
use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::StatusCode;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, trace};

const NULL_BODY: &[u8] = b"null";

/// A type-erased endpoint, as held by a router.
#[async_trait]
pub trait EndpointExecutor: Send + Sync {
    /// The handler name.
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration;

    /// Runs one request to completion. Never fails: every error, including a panic in user code,
    /// is rendered into the returned status and body.
    async fn execute(&self, ctx: &mut Context, requester: &mut dyn Requester) -> (StatusCode, Bytes);
}

pub struct Endpoint<H> {
    config: Arc<Config>,
    descriptor: Arc<HandlerDescriptor<H>>,
}

impl<H: Handler> Endpoint<H> {
    /// Registers `descriptor` against `config`.
    ///
    /// Fails when the descriptor references a resource or content type the config does not
    /// provide; such an endpoint never serves a request.
    pub fn new(config: Arc<Config>, descriptor: HandlerDescriptor<H>) -> Result<Self, ConfigError> {
        descriptor.verify(&config)?;
        debug!(action = descriptor.name(), timeout = ?config.timeout(), "endpoint registered");
        Ok(Self { config, descriptor: Arc::new(descriptor) })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn descriptor(&self) -> &HandlerDescriptor<H> {
        &self.descriptor
    }

    /// A fresh context for one request, bounded by this endpoint's timeout and cancelled along
    /// with `parent`.
    pub fn context(&self, parent: &CancellationToken) -> Context {
        Context::with_parent(parent).with_timeout(self.config.timeout())
    }

    async fn run<'a>(
        &'a self,
        ctx: &Context,
        requester: &mut dyn Requester,
        response_mime: &mut Option<MimeHandler<'a>>,
    ) -> Result<(StatusCode, Bytes), StatusError> {
        let config = self.config.as_ref();
        let descriptor = self.descriptor.as_ref();

        checkpoint(ctx)?;

        let request_mime = if descriptor.has_request_body() {
            trace!("negotiating request content type");
            let Some(content_type) = requester.content_type().filter(|value| !value.is_empty()) else {
                debug!("header Content-Type not found");
                return Err(EndpointError::RequestMimeTypeMissing.into());
            };
            let Some(negotiated) = config.mime_types().get(content_type, descriptor.request_mime_types()) else {
                debug!(content_type, "request mime type not supported");
                return Err(EndpointError::request_mime_type_unsupported(content_type).into());
            };
            debug!(content_type, "found request mime type handler");
            Some(negotiated)
        } else {
            None
        };
        checkpoint(ctx)?;

        trace!("negotiating response content type");
        let Some(accept) = requester.accept().filter(|value| !value.is_empty()) else {
            debug!("header Accept not found");
            return Err(EndpointError::ResponseMimeTypeMissing.into());
        };
        let Some(response_codec) = config.mime_types().get(accept, descriptor.response_mime_types()) else {
            debug!(accept, "response mime type not supported");
            return Err(EndpointError::response_mime_type_unsupported(accept).into());
        };
        debug!(accept, "found response mime type handler");
        requester.set_response_content_type(response_codec.mime_type());
        *response_mime = Some(response_codec);
        checkpoint(ctx)?;

        trace!("allocating handler");
        let mut handler = H::default();
        if let Err(e) = descriptor.bind(&mut handler, config.resources(), requester) {
            debug!(cause = %e, "binding failed");
            return Err(e);
        }
        checkpoint(ctx)?;

        if let Some(auther) = config.auther() {
            trace!("processing auth");
            if let Err(e) = auther.auth(ctx, requester).await {
                debug!(status = e.status().as_u16(), "auth failed");
                return Err(e);
            }
        }
        checkpoint(ctx)?;

        if let Some(request_codec) = request_mime {
            trace!("processing request body");
            let body = requester.request_body();
            let value = request_codec.unmarshal(body).map_err(|e| {
                debug!(cause = %e, "failed to decode request body");
                EndpointError::RequestBodyUnmarshalFailure
            })?;
            descriptor.set_request_body(&mut handler, value).map_err(|e| {
                debug!(cause = %e, "failed to unmarshal request body");
                EndpointError::RequestBodyUnmarshalFailure
            })?;

            if let Some(validator) = config.request_validator().filter(|_| descriptor.validates_request()) {
                trace!("processing request validation");
                if let Err(e) = validator.validate_request(ctx, body).await {
                    debug!(status = e.status().as_u16(), "failed request body validation");
                    return Err(e);
                }
            }
        }
        checkpoint(ctx)?;

        trace!("running endpoint handler");
        let status = match handler.handle(ctx).await {
            Ok(status) => status,
            Err(e) => {
                debug!(status = e.status().as_u16(), "handler error");
                return Err(e);
            }
        };
        checkpoint(ctx)?;

        let body = match descriptor.take_response_body(&mut handler) {
            Some(value) => {
                trace!("encoding response body");
                let value = value.map_err(|e| {
                    error!(cause = %e, "failed to serialize response body");
                    EndpointError::ResponseBodyMarshalFailure
                })?;
                let body = response_codec.marshal(&value).map_err(|e| {
                    error!(cause = %e, "failed to marshal response body");
                    EndpointError::ResponseBodyMarshalFailure
                })?;
                if body.is_empty() || body.as_ref() == NULL_BODY {
                    debug!("response body is null");
                    return Err(EndpointError::ResponseBodyNull.into());
                }
                body
            }
            None => Bytes::new(),
        };
        checkpoint(ctx)?;

        if let Some(validator) = config.response_validator().filter(|_| descriptor.validates_response()) {
            trace!("processing response validation");
            if let Err(e) = validator.validate_response(ctx, status, &body).await {
                debug!(status = e.status().as_u16(), "failed response validation");
                return Err(e);
            }
        }
        checkpoint(ctx)?;

        match descriptor.etag() {
            Some(etag) => Ok(etag.apply(requester, status, body)),
            None => Ok((status, body)),
        }
    }

    async fn execute_in_span(&self, ctx: &Context, requester: &mut dyn Requester) -> (StatusCode, Bytes) {
        for name in self.descriptor.path_names() {
            if let Some(value) = requester.path_param(name) {
                debug!(name, value, "path parameter");
            }
        }
        trace!("executing endpoint");

        let mut response_mime = None;
        let outcome = AssertUnwindSafe(self.run(ctx, requester, &mut response_mime)).catch_unwind().await;

        let error = match outcome {
            Ok(Ok((status, body))) => {
                debug!(status = status.as_u16(), body_len = body.len(), "success response");
                return (status, body);
            }
            Ok(Err(e)) => e,
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "endpoint panicked");
                StatusError::from(EndpointError::Panic)
            }
        };

        ErrorResponder::new(self.config.error_strategy()).respond(ctx, requester, response_mime, error)
    }
}

#[async_trait]
impl<H: Handler> EndpointExecutor for Endpoint<H> {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn execute(&self, ctx: &mut Context, requester: &mut dyn Requester) -> (StatusCode, Bytes) {
        ctx.narrow_timeout(self.config.timeout());

        let span = info_span!(
            "endpoint",
            request_id = requester.request_id(),
            method = %requester.method(),
            route = requester.matched_path(),
            path = requester.path(),
            action = self.descriptor.name(),
        );
        ctx.attach_span(span.clone());

        let ctx: &Context = ctx;
        self.execute_in_span(ctx, requester).instrument(span).await
    }
}

impl<H> Clone for Endpoint<H> {
    fn clone(&self) -> Self {
        Self { config: Arc::clone(&self.config), descriptor: Arc::clone(&self.descriptor) }
    }
}

impl<H> fmt::Debug for Endpoint<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").field("config", &self.config).field("descriptor", &self.descriptor).finish()
    }
}

fn checkpoint(ctx: &Context) -> Result<(), StatusError> {
    if ctx.should_continue() {
        return Ok(());
    }
    debug!(cancelled = ctx.is_cancelled(), expired = ctx.is_expired(), "request canceled or timed out");
    Err(EndpointError::RequestTimeout.into())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requester::HttpRequester;
    use http::Request;
    use http::header::CONTENT_TYPE;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Output {
        value: u32,
    }

    #[derive(Default)]
    struct Counter {
        num: u32,
        output: Option<Output>,
    }

    #[async_trait]
    impl Handler for Counter {
        async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
            if self.num == 13 {
                panic!("unlucky");
            }
            self.output = Some(Output { value: self.num + 1 });
            Ok(StatusCode::OK)
        }
    }

    fn endpoint() -> Endpoint<Counter> {
        let descriptor = HandlerDescriptor::builder("Counter")
            .path("num", |h: &mut Counter, num: u32| h.num = num)
            .response_body(|h: &mut Counter| h.output.take())
            .build()
            .unwrap();
        Endpoint::new(Config::default_shared(), descriptor).unwrap()
    }

    fn requester(num: &str) -> HttpRequester {
        let request = Request::builder().uri(format!("/counter/{num}")).header("Accept", "application/json");
        HttpRequester::new(request.body(Bytes::new()).unwrap(), "/counter/{num}").with_path_param("num", num)
    }

    #[tokio::test]
    async fn executes_handler() {
        let endpoint = endpoint();
        let mut ctx = endpoint.context(&CancellationToken::new());
        let mut requester = requester("41");

        let (status, body) = endpoint.execute(&mut ctx, &mut requester).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(br#"{"value":42}"#));
        assert_eq!(requester.response_headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(endpoint.name(), "Counter");
        assert_eq!(EndpointExecutor::timeout(&endpoint), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn panic_is_sanitized_and_endpoint_keeps_serving() {
        let endpoint = endpoint();

        let mut ctx = Context::new();
        let (status, body) = endpoint.execute(&mut ctx, &mut requester("13")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, Bytes::from_static(br#"{"message":"internal server error"}"#));

        let mut ctx = Context::new();
        let (status, _) = endpoint.execute(&mut ctx, &mut requester("1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let endpoint = endpoint();
        let mut ctx = Context::new();
        ctx.cancel();
        let mut requester = requester("13");

        let (status, body) = endpoint.execute(&mut ctx, &mut requester).await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        // no response type was negotiated yet
        assert_eq!(body, Bytes::from_static(b"request canceled or timed out"));
        assert_eq!(requester.response_headers().get(CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    }

    #[test]
    fn panic_message_of_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
