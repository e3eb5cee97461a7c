use crate::binder::{HandlerDescriptor, ParamBinding, ResourceBinding};
use crate::error::ConfigError;
use crate::etag::ETagValidator;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, type_name};
use std::collections::HashSet;
use std::fmt::{self, Display};
use std::str::FromStr;

/// Declares the bindings of handler type `H`.
///
/// ```ignore
/// HandlerDescriptor::builder("GetResource")
///     .resource("db", |h: &mut GetResource, db: Arc<dyn Datastore>| h.db = Some(db))
///     .path("id", |h: &mut GetResource, id: u64| h.id = id)
///     .response_body(|h: &mut GetResource| h.output.take())
///     .response_mime("application/json")
///     .build()?
/// ```
pub struct DescriptorBuilder<H> {
    descriptor: HandlerDescriptor<H>,
}

impl<H> fmt::Debug for DescriptorBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DescriptorBuilder").field(&self.descriptor).finish()
    }
}

impl<H: 'static> DescriptorBuilder<H> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let descriptor = HandlerDescriptor {
            name: name.into(),
            resources: Vec::new(),
            path_params: Vec::new(),
            query_params: Vec::new(),
            request_body: None,
            request_mime_types: Vec::new(),
            validate_request: false,
            response_body: None,
            response_mime_types: Vec::new(),
            validate_response: false,
            etag: None,
        };
        Self { descriptor }
    }

    /// Injects the resource registered under `key`. The resource must have been registered with
    /// exactly type `R`; it is cloned into every handler instance.
    pub fn resource<R, F>(mut self, key: impl Into<String>, setter: F) -> Self
    where
        R: Any + Clone + Send + Sync,
        F: Fn(&mut H, R) + Send + Sync + 'static,
    {
        let binding = ResourceBinding {
            key: key.into(),
            type_name: type_name::<R>(),
            matches: |resource| resource.is::<R>(),
            setter: Box::new(move |handler: &mut H, resource: &(dyn Any + Send + Sync)| {
                match resource.downcast_ref::<R>() {
                    Some(resource) => {
                        setter(handler, resource.clone());
                        true
                    }
                    None => false,
                }
            }),
        };
        self.descriptor.resources.push(binding);
        self
    }

    /// Binds the path parameter `name`, parsed with `FromStr`.
    pub fn path<T, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        T: FromStr + 'static,
        T::Err: Display,
        F: Fn(&mut H, T) + Send + Sync + 'static,
    {
        self.descriptor.path_params.push(param_binding(name, setter));
        self
    }

    /// Binds the query parameter `name`, parsed with `FromStr`.
    pub fn query<T, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        T: FromStr + 'static,
        T::Err: Display,
        F: Fn(&mut H, T) + Send + Sync + 'static,
    {
        self.descriptor.query_params.push(param_binding(name, setter));
        self
    }

    /// Declares a request body, decoded with the negotiated codec and deserialized into `T`.
    pub fn request_body<T, F>(mut self, setter: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&mut H, T) + Send + Sync + 'static,
    {
        self.descriptor.request_body = Some(Box::new(move |handler: &mut H, value: Value| {
            let body = serde_json::from_value::<T>(value)?;
            setter(handler, body);
            Ok(())
        }));
        self
    }

    /// Restricts request negotiation to `mime_type`. May be called more than once.
    pub fn request_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.descriptor.request_mime_types.push(mime_type.into());
        self
    }

    pub fn validate_request(mut self) -> Self {
        self.descriptor.validate_request = true;
        self
    }

    /// Declares a response body. `getter` runs once after the handler returns; `None` is rejected
    /// as a null response.
    pub fn response_body<T, F>(mut self, getter: F) -> Self
    where
        T: Serialize + 'static,
        F: Fn(&mut H) -> Option<T> + Send + Sync + 'static,
    {
        self.descriptor.response_body = Some(Box::new(move |handler: &mut H| serde_json::to_value(getter(handler))));
        self
    }

    /// Restricts response negotiation to `mime_type`. May be called more than once.
    pub fn response_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.descriptor.response_mime_types.push(mime_type.into());
        self
    }

    pub fn validate_response(mut self) -> Self {
        self.descriptor.validate_response = true;
        self
    }

    /// Enables conditional request handling. A positive `max_age_seconds` also sets
    /// `Cache-Control: max-age=<n>` on cacheable responses.
    pub fn etag(mut self, max_age_seconds: u32) -> Self {
        self.descriptor.etag = Some(ETagValidator::new(max_age_seconds));
        self
    }

    pub fn build(self) -> Result<HandlerDescriptor<H>, ConfigError> {
        let descriptor = self.descriptor;

        let resource_keys = descriptor.resources.iter().map(|binding| binding.key.as_str());
        check_unique(&descriptor.name, "resource", resource_keys)?;
        check_unique(&descriptor.name, "path", descriptor.path_names())?;
        let query_names = descriptor.query_params.iter().map(|binding| binding.name.as_str());
        check_unique(&descriptor.name, "query", query_names)?;

        Ok(descriptor)
    }
}

fn param_binding<H: 'static, T, F>(name: impl Into<String>, setter: F) -> ParamBinding<H>
where
    T: FromStr + 'static,
    T::Err: Display,
    F: Fn(&mut H, T) + Send + Sync + 'static,
{
    ParamBinding {
        name: name.into(),
        setter: Box::new(move |handler: &mut H, raw: &str| {
            let value = raw.parse::<T>().map_err(|e| e.to_string())?;
            setter(handler, value);
            Ok(())
        }),
    }
}

fn check_unique<'a>(
    handler: &str,
    role: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateBinding { handler: handler.to_string(), role, name: name.to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Params {
        id: String,
        num: u32,
    }

    #[test]
    fn builds_flags() {
        let descriptor = HandlerDescriptor::<Params>::builder("Params")
            .request_mime("application/json")
            .request_mime("text/plain")
            .validate_request()
            .validate_response()
            .etag(60)
            .build()
            .unwrap();

        assert_eq!(descriptor.name(), "Params");
        assert_eq!(descriptor.request_mime_types(), ["application/json", "text/plain"]);
        assert!(descriptor.response_mime_types().is_empty());
        assert!(descriptor.validates_request());
        assert!(descriptor.validates_response());
        assert!(!descriptor.has_request_body());
        assert!(!descriptor.has_response_body());
        assert_eq!(descriptor.etag().map(ETagValidator::max_age_seconds), Some(60));
    }

    #[test]
    fn duplicate_path_binding() {
        let result = HandlerDescriptor::builder("Params")
            .path("id", |h: &mut Params, id: String| h.id = id)
            .path("id", |h: &mut Params, num: u32| h.num = num)
            .build();

        match result {
            Err(ConfigError::DuplicateBinding { role, name, .. }) => {
                assert_eq!(role, "path");
                assert_eq!(name, "id");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn same_name_in_different_roles_is_allowed() {
        let descriptor = HandlerDescriptor::builder("Params")
            .path("id", |h: &mut Params, id: String| h.id = id)
            .query("id", |h: &mut Params, id: String| h.id = id)
            .build()
            .unwrap();

        assert_eq!(descriptor.path_names().collect::<Vec<_>>(), ["id"]);
    }
}
