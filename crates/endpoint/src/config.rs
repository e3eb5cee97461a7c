//! Endpoint configuration.
//!
//! A [`Config`] is built once per route from a [`ConfigBuilder`], with defaults filled in for
//! everything left unset, and is shared read-only by every execution of that route. There is no
//! way to mutate a `Config` after it has been built.

use crate::auth::Auther;
use crate::codec::MimeTypeRegistry;
use crate::responder::{DefaultErrorStrategy, ErrorStrategy};
use crate::validate::{RequestValidator, ResponseValidator};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub type Resource = Arc<dyn Any + Send + Sync>;

/// Named values injected into handlers, e.g. database clients.
///
/// A resource is looked up by key and by type: a handler that binds `"db"` as an
/// `Arc<dyn Datastore>` only matches a resource inserted with exactly that type.
#[derive(Clone, Default)]
pub struct Resources {
    inner: HashMap<String, Resource>,
}

impl Resources {
    pub fn new() -> Self {
        Self { inner: HashMap::new() }
    }

    pub fn insert<R: Any + Send + Sync>(&mut self, key: impl Into<String>, resource: R) -> &mut Self {
        self.inner.insert(key.into(), Arc::new(resource));
        self
    }

    pub fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.inner.get(key).map(|resource| &**resource)
    }

    pub fn get_as<R: Any>(&self, key: &str) -> Option<&R> {
        self.get(key).and_then(|resource| resource.downcast_ref::<R>())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.keys()).finish()
    }
}

pub struct Config {
    error_strategy: Arc<dyn ErrorStrategy>,
    auther: Option<Arc<dyn Auther>>,
    request_validator: Option<Arc<dyn RequestValidator>>,
    response_validator: Option<Arc<dyn ResponseValidator>>,
    mime_types: Arc<MimeTypeRegistry>,
    resources: Resources,
    timeout: Duration,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// A config with every default applied.
    pub fn default_shared() -> Arc<Config> {
        ConfigBuilder::new().build()
    }

    pub fn error_strategy(&self) -> &dyn ErrorStrategy {
        self.error_strategy.as_ref()
    }

    pub fn auther(&self) -> Option<&dyn Auther> {
        self.auther.as_deref()
    }

    pub fn request_validator(&self) -> Option<&dyn RequestValidator> {
        self.request_validator.as_deref()
    }

    pub fn response_validator(&self) -> Option<&dyn ResponseValidator> {
        self.response_validator.as_deref()
    }

    pub fn mime_types(&self) -> &MimeTypeRegistry {
        &self.mime_types
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auther", &self.auther.is_some())
            .field("request_validator", &self.request_validator.is_some())
            .field("response_validator", &self.response_validator.is_some())
            .field("mime_types", &self.mime_types)
            .field("resources", &self.resources)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Caller input for a [`Config`].
///
/// `build` clones the builder's current state, so one builder can produce the configs of several
/// routes.
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
    auther: Option<Arc<dyn Auther>>,
    request_validator: Option<Arc<dyn RequestValidator>>,
    response_validator: Option<Arc<dyn ResponseValidator>>,
    mime_types: Option<Arc<MimeTypeRegistry>>,
    resources: Resources,
    timeout: Option<Duration>,
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("resources", &self.resources)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn error_strategy<S: ErrorStrategy + 'static>(mut self, strategy: S) -> Self {
        self.error_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn auther<A: Auther + 'static>(mut self, auther: A) -> Self {
        self.auther = Some(Arc::new(auther));
        self
    }

    pub fn request_validator<V: RequestValidator + 'static>(mut self, validator: V) -> Self {
        self.request_validator = Some(Arc::new(validator));
        self
    }

    pub fn response_validator<V: ResponseValidator + 'static>(mut self, validator: V) -> Self {
        self.response_validator = Some(Arc::new(validator));
        self
    }

    pub fn mime_types(mut self, registry: MimeTypeRegistry) -> Self {
        self.mime_types = Some(Arc::new(registry));
        self
    }

    pub fn resource<R: Any + Send + Sync>(mut self, key: impl Into<String>, resource: R) -> Self {
        self.resources.insert(key, resource);
        self
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// The per-request timeout. A zero timeout falls back to [`DEFAULT_TIMEOUT`]; a timeout too
    /// large for a deadline, such as `Duration::MAX`, sets none.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(&self) -> Arc<Config> {
        let config = Config {
            error_strategy: self.error_strategy.clone().unwrap_or_else(|| Arc::new(DefaultErrorStrategy)),
            auther: self.auther.clone(),
            request_validator: self.request_validator.clone(),
            response_validator: self.response_validator.clone(),
            mime_types: self.mime_types.clone().unwrap_or_else(MimeTypeRegistry::shared_default),
            resources: self.resources.clone(),
            timeout: self.timeout.filter(|timeout| !timeout.is_zero()).unwrap_or(DEFAULT_TIMEOUT),
        };
        Arc::new(config)
    }
}
