use crate::context::Context;
use crate::error::StatusError;
use async_trait::async_trait;
use http::StatusCode;

/// User business logic for one endpoint.
///
/// A fresh instance is allocated with `Default` for every request, its declared bindings are
/// filled in, and `handle` is called exactly once. The returned status is written to the caller
/// along with the encoded response slot; an error is rendered by the configured error strategy
/// with the status it carries.
#[async_trait]
pub trait Handler: Default + Send + 'static {
    async fn handle(&mut self, ctx: &Context) -> Result<StatusCode, StatusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Echo {
        input: String,
        output: Option<String>,
    }

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
            if self.input.is_empty() {
                return Err(StatusError::bad_request("empty input"));
            }
            self.output = Some(self.input.clone());
            Ok(StatusCode::OK)
        }
    }

    fn assert_is_handler<H: Handler>(_handler: &H) {
        // no op
    }

    #[tokio::test]
    async fn handler_mutates_its_instance() {
        let ctx = Context::new();
        let mut echo = Echo { input: "hello".to_string(), ..Echo::default() };
        assert_is_handler(&echo);

        assert_eq!(echo.handle(&ctx).await.unwrap(), StatusCode::OK);
        assert_eq!(echo.output.as_deref(), Some("hello"));

        let error = Echo::default().handle(&ctx).await.unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
