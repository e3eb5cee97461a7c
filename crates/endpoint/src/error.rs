use http::StatusCode;
use std::error::Error;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A failure paired with the HTTP status it should be reported with.
///
/// Every phase of the endpoint pipeline, and every capability plugged into it (auth, validators,
/// handlers), reports failure through this type. The status is propagated verbatim to the
/// error responder.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct StatusError {
    status: StatusCode,
    #[source]
    source: BoxError,
}

impl StatusError {
    pub fn new<E: Into<BoxError>>(status: StatusCode, error: E) -> Self {
        Self { status, source: error.into() }
    }

    pub fn bad_request<E: Into<BoxError>>(error: E) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unauthorized<E: Into<BoxError>>(error: E) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    pub fn forbidden<E: Into<BoxError>>(error: E) -> Self {
        Self::new(StatusCode::FORBIDDEN, error)
    }

    pub fn unprocessable<E: Into<BoxError>>(error: E) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, error)
    }

    pub fn internal<E: Into<BoxError>>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn into_parts(self) -> (StatusCode, BoxError) {
        (self.status, self.source)
    }
}

/// Failures raised by the endpoint pipeline itself.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Content-Type MIME type not provided")]
    RequestMimeTypeMissing,

    #[error("Content-Type MIME type not supported: {mime_type}")]
    RequestMimeTypeUnsupported { mime_type: String },

    #[error("Accept MIME type not provided")]
    ResponseMimeTypeMissing,

    #[error("Accept MIME type not supported: {mime_type}")]
    ResponseMimeTypeUnsupported { mime_type: String },

    #[error("invalid path parameter '{name}': {reason}")]
    InvalidPathParameter { name: String, reason: String },

    #[error("invalid query parameter '{name}': {reason}")]
    InvalidQueryParameter { name: String, reason: String },

    #[error("resource not available: {key}")]
    ResourceMissing { key: String },

    #[error("failed to unmarshal request body")]
    RequestBodyUnmarshalFailure,

    #[error("failed to marshal response body")]
    ResponseBodyMarshalFailure,

    #[error("response body is null")]
    ResponseBodyNull,

    #[error("request canceled or timed out")]
    RequestTimeout,

    // the panic payload is logged, never rendered
    #[error("internal server error")]
    Panic,
}

impl EndpointError {
    pub fn request_mime_type_unsupported<S: ToString>(mime_type: S) -> Self {
        Self::RequestMimeTypeUnsupported { mime_type: mime_type.to_string() }
    }

    pub fn response_mime_type_unsupported<S: ToString>(mime_type: S) -> Self {
        Self::ResponseMimeTypeUnsupported { mime_type: mime_type.to_string() }
    }

    pub fn invalid_path_parameter<N: ToString, R: ToString>(name: N, reason: R) -> Self {
        Self::InvalidPathParameter { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_query_parameter<N: ToString, R: ToString>(name: N, reason: R) -> Self {
        Self::InvalidQueryParameter { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn resource_missing<S: ToString>(key: S) -> Self {
        Self::ResourceMissing { key: key.to_string() }
    }

    /// The status this failure is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RequestMimeTypeMissing
            | Self::RequestMimeTypeUnsupported { .. }
            | Self::ResponseMimeTypeMissing
            | Self::ResponseMimeTypeUnsupported { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::InvalidPathParameter { .. }
            | Self::InvalidQueryParameter { .. }
            | Self::RequestBodyUnmarshalFailure => StatusCode::BAD_REQUEST,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::ResourceMissing { .. }
            | Self::ResponseBodyMarshalFailure
            | Self::ResponseBodyNull
            | Self::Panic => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EndpointError> for StatusError {
    fn from(error: EndpointError) -> Self {
        StatusError::new(error.status(), error)
    }
}

/// Raised while registering an endpoint. A route that fails with this error never serves a request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{handler}: resource '{key}' is not registered")]
    MissingResource { handler: String, key: String },

    #[error("{handler}: resource '{key}' is not a `{expected}`")]
    ResourceTypeMismatch { handler: String, key: String, expected: &'static str },

    #[error("{handler}: MIME type '{mime_type}' is not registered")]
    UnknownMimeType { handler: String, mime_type: String },

    #[error("{handler}: {role} binding '{name}' is declared more than once")]
    DuplicateBinding { handler: String, role: &'static str, name: String },
}

/// Errors raised by a [`MimeCodec`](crate::codec::MimeCodec).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid text body: {reason}")]
    InvalidText { reason: String },
}

impl CodecError {
    pub fn invalid_text<S: ToString>(str: S) -> Self {
        Self::InvalidText { reason: str.to_string() }
    }
}

/// An application error rendered as `[code] message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct CodedError {
    code: String,
    message: String,
}

impl CodedError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
