//! MIME type negotiation and body codecs.
//!
//! A [`MimeTypeRegistry`] maps content-type strings to [`MimeCodec`] implementations. Codecs work
//! on the [`serde_json::Value`] data model, so one registry can serve any handler body type; the
//! handler's binding plan converts between `Value` and its typed request/response structs.
//!
//! Matching is exact string matching only: no wildcards, no parameter-aware matching.

use crate::error::CodecError;
use bytes::Bytes;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A marshal/unmarshal pair for one content type.
pub trait MimeCodec: Send + Sync {
    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Codec for `application/json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl MimeCodec for JsonCodec {
    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Codec for `text/plain`.
///
/// Strings are written verbatim, any other value as its JSON text. Unmarshalling always yields a
/// string value.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl MimeCodec for TextCodec {
    fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        match value {
            Value::String(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            other => Ok(Bytes::from(other.to_string())),
        }
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Value::String(s.to_owned())),
            Err(e) => Err(CodecError::invalid_text(e)),
        }
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<MimeTypeRegistry>> = Lazy::new(|| {
    let mut registry = MimeTypeRegistry::new();
    registry.register(mime::APPLICATION_JSON.as_ref(), JsonCodec);
    registry.register(mime::TEXT_PLAIN.as_ref(), TextCodec);
    Arc::new(registry)
});

/// The set of content types an endpoint can negotiate.
#[derive(Clone, Default)]
pub struct MimeTypeRegistry {
    codecs: HashMap<String, Arc<dyn MimeCodec>>,
}

impl MimeTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { codecs: HashMap::new() }
    }

    /// Returns the shared registry holding `application/json` and `text/plain`.
    pub fn shared_default() -> Arc<MimeTypeRegistry> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// Registers `codec` for `mime_type`, replacing any codec previously registered for it.
    pub fn register<C: MimeCodec + 'static>(&mut self, mime_type: impl Into<String>, codec: C) -> &mut Self {
        self.codecs.insert(mime_type.into(), Arc::new(codec));
        self
    }

    pub fn with<C: MimeCodec + 'static>(mut self, mime_type: impl Into<String>, codec: C) -> Self {
        self.register(mime_type, codec);
        self
    }

    pub fn contains(&self, mime_type: &str) -> bool {
        self.codecs.contains_key(mime_type)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Looks up the codec for `content_type`.
    ///
    /// `allowed` restricts negotiation to a subset of the registered types; an empty subset means
    /// every registered type is allowed.
    pub fn get<'a>(&'a self, content_type: &str, allowed: &[String]) -> Option<MimeHandler<'a>> {
        if !allowed.is_empty() && !allowed.iter().any(|mime_type| mime_type == content_type) {
            return None;
        }

        self.codecs
            .get_key_value(content_type)
            .map(|(mime_type, codec)| MimeHandler { mime_type: mime_type.as_str(), codec: codec.as_ref() })
    }
}

impl fmt::Debug for MimeTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

/// A negotiated content type and its codec.
#[derive(Clone, Copy)]
pub struct MimeHandler<'a> {
    mime_type: &'a str,
    codec: &'a dyn MimeCodec,
}

impl MimeHandler<'_> {
    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    pub fn marshal(&self, value: &Value) -> Result<Bytes, CodecError> {
        self.codec.marshal(value)
    }

    pub fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        self.codec.unmarshal(bytes)
    }
}

impl fmt::Debug for MimeHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MimeHandler").field("mime_type", &self.mime_type).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_is_exact_match() {
        let registry = MimeTypeRegistry::shared_default();

        assert_eq!(registry.get("application/json", &[]).unwrap().mime_type(), "application/json");
        assert!(registry.get("application/json; charset=utf-8", &[]).is_none());
        assert!(registry.get("application/*", &[]).is_none());
        assert!(registry.get("*/*", &[]).is_none());
        assert!(registry.get("Application/JSON", &[]).is_none());
    }

    #[test]
    fn get_respects_allowed_subset() {
        let registry = MimeTypeRegistry::shared_default();
        let allowed = vec!["application/json".to_string()];

        assert!(registry.get("application/json", &allowed).is_some());
        assert!(registry.get("text/plain", &allowed).is_none());
        assert!(registry.get("text/plain", &[]).is_some());
    }

    #[test]
    fn allowed_subset_cannot_extend_registry() {
        let registry = MimeTypeRegistry::new().with("application/json", JsonCodec);
        let allowed = vec!["application/xml".to_string()];

        assert!(registry.get("application/xml", &allowed).is_none());
    }

    #[test]
    fn json_codec() {
        let codec = JsonCodec;
        let value = codec.unmarshal(br#"{"my_string": "hello", "my_int": 5}"#).unwrap();
        assert_eq!(value, json!({"my_string": "hello", "my_int": 5}));

        assert_eq!(codec.marshal(&json!({"output_int": 5})).unwrap(), Bytes::from_static(br#"{"output_int":5}"#));
        assert_eq!(codec.marshal(&Value::Null).unwrap(), Bytes::from_static(b"null"));
        assert!(codec.unmarshal(b"").is_err());
        assert!(codec.unmarshal(b"{not json").is_err());
    }

    #[test]
    fn text_codec() {
        let codec = TextCodec;
        assert_eq!(codec.marshal(&json!("hello")).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(codec.marshal(&json!({"message": "boom"})).unwrap(), Bytes::from_static(br#"{"message":"boom"}"#));
        assert_eq!(codec.unmarshal(b"hello").unwrap(), json!("hello"));
        assert!(codec.unmarshal(&[0xff, 0xfe]).is_err());
    }
}
