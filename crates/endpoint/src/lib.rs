//! The per-request endpoint execution pipeline of micro-web.
//!
//! This crate turns an inbound request into a response for one registered handler: content
//! negotiation, authentication, declarative binding of path/query parameters and injected
//! resources onto the handler, request body decoding and validation, the handler call itself,
//! response encoding and validation, and ETag post-processing. All of it runs inside a
//! cancellable, timeout-bound and panic-isolated execution context, so a failing handler never
//! takes the host down.
//!
//! Listening on sockets and matching requests against route templates are left to the host.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use micro_endpoint::{
//!     Config, Context, EndpointExecutor, Endpoint, Handler, HandlerDescriptor, HttpRequester, StatusError, post,
//! };
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize)]
//! struct CreateRequest {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct CreateResponse {
//!     name: String,
//! }
//!
//! #[derive(Default)]
//! struct Create {
//!     request: Option<CreateRequest>,
//!     response: Option<CreateResponse>,
//! }
//!
//! #[async_trait]
//! impl Handler for Create {
//!     async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
//!         let request = self.request.take().ok_or_else(|| StatusError::bad_request("missing body"))?;
//!         self.response = Some(CreateResponse { name: request.name });
//!         Ok(StatusCode::CREATED)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let descriptor = HandlerDescriptor::builder("Create")
//!         .request_body(|h: &mut Create, body: CreateRequest| h.request = Some(body))
//!         .response_body(|h: &mut Create| h.response.take())
//!         .build()?;
//!     let endpoint = Endpoint::new(Config::default_shared(), descriptor)?;
//!     let mut ctx = endpoint.context(&CancellationToken::new());
//!     let route = post("/resources", endpoint);
//!
//!     let request = Request::post("/resources")
//!         .header("Content-Type", "application/json")
//!         .header("Accept", "application/json")
//!         .body(Bytes::from_static(br#"{"name": "hello"}"#))?;
//!     let mut requester = HttpRequester::new(request, route.path());
//!
//!     let (status, body) = route.executor().execute(&mut ctx, &mut requester).await;
//!     assert_eq!(status, StatusCode::CREATED);
//!     assert_eq!(body, Bytes::from_static(br#"{"name":"hello"}"#));
//!     Ok(())
//! }
//! ```

mod auth;
mod binder;
mod codec;
mod config;
mod context;
mod endpoint;
mod error;
mod etag;
mod handler;
mod requester;
mod responder;
mod route;
mod validate;

pub use auth::Auther;
pub use binder::{DescriptorBuilder, HandlerDescriptor};
pub use codec::{JsonCodec, MimeCodec, MimeHandler, MimeTypeRegistry, TextCodec};
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT, Resource, Resources};
pub use context::Context;
pub use endpoint::{Endpoint, EndpointExecutor};
pub use error::{BoxError, CodecError, CodedError, ConfigError, EndpointError, StatusError};
pub use etag::{ETagValidator, fingerprint};
pub use handler::Handler;
pub use requester::{HttpRequester, Requester, X_REQUEST_ID};
pub use responder::{DefaultErrorStrategy, ErrorResponder, ErrorStrategy};
pub use route::{Route, delete, get, head, options, patch, post, put};
pub use validate::{RequestValidator, ResponseValidator};
