//! Registration-time binding plans.
//!
//! A [`HandlerDescriptor`] records, once per handler type, how a request feeds the handler's
//! fields: injected resources, path and query parameters, the request body slot and the response
//! body slot. Applying it per request is plain field assignment through the stored setters.

mod builder;

pub use builder::DescriptorBuilder;

use crate::config::{Config, Resources};
use crate::error::{ConfigError, EndpointError, StatusError};
use crate::etag::ETagValidator;
use crate::requester::Requester;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use tracing::debug;

type ResourceSetter<H> = Box<dyn Fn(&mut H, &(dyn Any + Send + Sync)) -> bool + Send + Sync>;
type ParamSetter<H> = Box<dyn Fn(&mut H, &str) -> Result<(), String> + Send + Sync>;
type RequestSetter<H> = Box<dyn Fn(&mut H, Value) -> Result<(), serde_json::Error> + Send + Sync>;
type ResponseGetter<H> = Box<dyn Fn(&mut H) -> Result<Value, serde_json::Error> + Send + Sync>;

pub(crate) struct ResourceBinding<H> {
    key: String,
    type_name: &'static str,
    matches: fn(&(dyn Any + Send + Sync)) -> bool,
    setter: ResourceSetter<H>,
}

pub(crate) struct ParamBinding<H> {
    name: String,
    setter: ParamSetter<H>,
}

/// The compiled binding plan of handler type `H`.
///
/// Stateless once built and shared by every execution of the endpoint it belongs to.
pub struct HandlerDescriptor<H> {
    name: String,
    resources: Vec<ResourceBinding<H>>,
    path_params: Vec<ParamBinding<H>>,
    query_params: Vec<ParamBinding<H>>,
    request_body: Option<RequestSetter<H>>,
    request_mime_types: Vec<String>,
    validate_request: bool,
    response_body: Option<ResponseGetter<H>>,
    response_mime_types: Vec<String>,
    validate_response: bool,
    etag: Option<ETagValidator>,
}

impl<H> HandlerDescriptor<H> {
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder<H>
    where
        H: 'static,
    {
        DescriptorBuilder::new(name)
    }

    /// The handler name, used as the `action` of the endpoint's log span.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.path_params.iter().map(|binding| binding.name.as_str())
    }

    pub fn has_request_body(&self) -> bool {
        self.request_body.is_some()
    }

    pub fn has_response_body(&self) -> bool {
        self.response_body.is_some()
    }

    /// The request content types this handler accepts. Empty means every registered type.
    pub fn request_mime_types(&self) -> &[String] {
        &self.request_mime_types
    }

    /// The response content types this handler produces. Empty means every registered type.
    pub fn response_mime_types(&self) -> &[String] {
        &self.response_mime_types
    }

    pub fn validates_request(&self) -> bool {
        self.validate_request
    }

    pub fn validates_response(&self) -> bool {
        self.validate_response
    }

    pub fn etag(&self) -> Option<&ETagValidator> {
        self.etag.as_ref()
    }

    /// Checks the plan against the route's config: every resource must be registered with the
    /// bound type and every declared content type must have a codec.
    pub fn verify(&self, config: &Config) -> Result<(), ConfigError> {
        for binding in &self.resources {
            let Some(resource) = config.resources().get(&binding.key) else {
                return Err(ConfigError::MissingResource { handler: self.name.clone(), key: binding.key.clone() });
            };
            if !(binding.matches)(resource) {
                return Err(ConfigError::ResourceTypeMismatch {
                    handler: self.name.clone(),
                    key: binding.key.clone(),
                    expected: binding.type_name,
                });
            }
        }

        let declared = self.request_mime_types.iter().chain(self.response_mime_types.iter());
        for mime_type in declared {
            if !config.mime_types().contains(mime_type) {
                return Err(ConfigError::UnknownMimeType { handler: self.name.clone(), mime_type: mime_type.clone() });
            }
        }

        Ok(())
    }

    /// Fills resources, then path parameters, then query parameters into `handler`.
    ///
    /// Absent parameters leave the field untouched. A value that fails to parse is a bad request.
    pub fn bind(&self, handler: &mut H, resources: &Resources, requester: &dyn Requester) -> Result<(), StatusError> {
        for binding in &self.resources {
            let bound = resources.get(&binding.key).is_some_and(|resource| (binding.setter)(handler, resource));
            if !bound {
                return Err(EndpointError::resource_missing(&binding.key).into());
            }
        }

        for binding in &self.path_params {
            let Some(raw) = requester.path_param(&binding.name) else {
                debug!(name = binding.name.as_str(), "path parameter absent");
                continue;
            };
            (binding.setter)(handler, raw)
                .map_err(|reason| EndpointError::invalid_path_parameter(&binding.name, reason))?;
        }

        for binding in &self.query_params {
            let Some(raw) = requester.query_param(&binding.name) else {
                debug!(name = binding.name.as_str(), "query parameter absent");
                continue;
            };
            (binding.setter)(handler, raw)
                .map_err(|reason| EndpointError::invalid_query_parameter(&binding.name, reason))?;
        }

        Ok(())
    }

    /// Moves a decoded request body into the request slot. A no-op without a request slot.
    pub(crate) fn set_request_body(&self, handler: &mut H, value: Value) -> Result<(), serde_json::Error> {
        match &self.request_body {
            Some(setter) => setter(handler, value),
            None => Ok(()),
        }
    }

    /// Takes the response slot out of the handler. `None` when no response slot is declared.
    pub(crate) fn take_response_body(&self, handler: &mut H) -> Option<Result<Value, serde_json::Error>> {
        self.response_body.as_ref().map(|getter| getter(handler))
    }
}

impl<H> fmt::Debug for HandlerDescriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("resources", &self.resources.iter().map(|binding| binding.key.as_str()).collect::<Vec<_>>())
            .field("path_params", &self.path_names().collect::<Vec<_>>())
            .field("query_params", &self.query_params.iter().map(|binding| binding.name.as_str()).collect::<Vec<_>>())
            .field("request_body", &self.has_request_body())
            .field("request_mime_types", &self.request_mime_types)
            .field("validate_request", &self.validate_request)
            .field("response_body", &self.has_response_body())
            .field("response_mime_types", &self.response_mime_types)
            .field("validate_response", &self.validate_response)
            .field("etag", &self.etag)
            .finish()
    }
}
