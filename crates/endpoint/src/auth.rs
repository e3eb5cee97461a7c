use crate::context::Context;
use crate::error::StatusError;
use crate::requester::Requester;
use async_trait::async_trait;

/// Authenticates and authorizes a request before its body is decoded.
///
/// A failure is reported to the caller with the status the implementation chose, typically
/// `401 Unauthorized` or `403 Forbidden`.
#[async_trait]
pub trait Auther: Send + Sync {
    async fn auth(&self, ctx: &Context, requester: &dyn Requester) -> Result<(), StatusError>;
}
