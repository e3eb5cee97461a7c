use crate::endpoint::{Endpoint, EndpointExecutor};
use crate::handler::Handler;
use http::Method;
use std::fmt;

/// An endpoint registered for one method and route template.
///
/// Matching requests to routes is up to the host's router; a route only carries what the router
/// needs to do so, plus the executor to run once it has.
pub struct Route {
    method: Method,
    path: String,
    executor: Box<dyn EndpointExecutor>,
}

impl Route {
    pub fn new<H: Handler>(method: Method, path: impl Into<String>, endpoint: Endpoint<H>) -> Self {
        Self { method, path: path.into(), executor: Box::new(endpoint) }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route template, e.g. `/resources/{id}`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn executor(&self) -> &dyn EndpointExecutor {
        self.executor.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("action", &self.executor.name())
            .finish()
    }
}

macro_rules! method_route {
    ($method:ident, $method_const:ident) => {
        pub fn $method<H: Handler>(path: impl Into<String>, endpoint: Endpoint<H>) -> Route {
            Route::new(Method::$method_const, path, endpoint)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(patch, PATCH);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::HandlerDescriptor;
    use crate::config::Config;
    use crate::context::Context;
    use crate::error::StatusError;
    use async_trait::async_trait;
    use http::StatusCode;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
            Ok(StatusCode::NO_CONTENT)
        }
    }

    fn endpoint() -> Endpoint<Noop> {
        Endpoint::new(Config::default_shared(), HandlerDescriptor::builder("Noop").build().unwrap()).unwrap()
    }

    #[test]
    fn method_routes() {
        let routes = [
            get("/noop", endpoint()),
            post("/noop", endpoint()),
            put("/noop", endpoint()),
            patch("/noop", endpoint()),
            delete("/noop/{id}", endpoint()),
            head("/noop", endpoint()),
            options("/noop", endpoint()),
        ];

        let methods = routes.iter().map(|route| route.method().clone()).collect::<Vec<_>>();
        assert_eq!(
            methods,
            vec![Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::HEAD, Method::OPTIONS]
        );
        assert_eq!(routes[4].path(), "/noop/{id}");
        assert_eq!(routes[0].executor().name(), "Noop");
    }
}
