//! Dual-format (JSON/YAML) decoding of spec text.
//!
//! JSON is almost valid YAML, so the order in which the two decoders are tried
//! decides how ambiguous input is read. [`decoder_order`] picks YAML first when
//! the content type or the text itself points at YAML, and JSON first
//! otherwise. The first decoder that succeeds wins.

use serde_json::{Map, Number, Value};
use tracing::{debug, instrument, trace};

use super::error::SpecError;
use crate::fetch::constants::MAX_SOURCE_BYTES;

/// A text format a spec document may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    /// JSON (RFC 8259).
    Json,
    /// YAML 1.2.
    Yaml,
}

impl SpecFormat {
    /// Returns the stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Decodes `text` into the JSON value model.
    ///
    /// # Errors
    ///
    /// Returns the decoder's error message.
    pub fn decode(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str::<serde_yaml::Value>(text)
                .map_err(|e| e.to_string())
                .and_then(yaml_to_json),
        }
    }
}

/// Returns the decoders to try, in order.
///
/// YAML goes first when `content_type_hint` mentions `yaml` or when the text
/// contains a bare `openapi:` or `swagger:` key; JSON goes first otherwise.
///
/// # Examples
///
/// ```
/// use spec_fetch_core::spec::{decoder_order, SpecFormat};
///
/// assert_eq!(decoder_order("application/yaml", "{}")[0], SpecFormat::Yaml);
/// assert_eq!(decoder_order("", "openapi: 3.0.0")[0], SpecFormat::Yaml);
/// assert_eq!(decoder_order("application/json", r#"{"openapi":"3.0.0"}"#)[0], SpecFormat::Json);
/// ```
#[must_use]
pub fn decoder_order(content_type_hint: &str, text: &str) -> [SpecFormat; 2] {
    let looks_like_yaml = content_type_hint.to_ascii_lowercase().contains("yaml")
        || text.contains("openapi:")
        || text.contains("swagger:");

    if looks_like_yaml {
        [SpecFormat::Yaml, SpecFormat::Json]
    } else {
        [SpecFormat::Json, SpecFormat::Yaml]
    }
}

/// Decodes spec text with JSON/YAML fallback under a raw size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecParser {
    max_source_bytes: u64,
}

impl Default for SpecParser {
    fn default() -> Self {
        Self::new(MAX_SOURCE_BYTES)
    }
}

impl SpecParser {
    /// Creates a parser rejecting text longer than `max_source_bytes`.
    #[must_use]
    pub fn new(max_source_bytes: u64) -> Self {
        Self { max_source_bytes }
    }

    /// Returns the raw size limit.
    #[must_use]
    pub fn max_source_bytes(&self) -> u64 {
        self.max_source_bytes
    }

    /// Decodes `text`, trying the decoders in [`decoder_order`].
    ///
    /// # Errors
    ///
    /// - [`SpecError::SourceTooLarge`] when the text exceeds the limit
    /// - [`SpecError::Unparseable`] when both decoders fail
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub fn parse(&self, text: &str, content_type_hint: &str) -> Result<Value, SpecError> {
        let actual = text.len() as u64;
        if actual > self.max_source_bytes {
            return Err(SpecError::SourceTooLarge {
                actual,
                limit: self.max_source_bytes,
            });
        }

        let mut json_error = String::new();
        let mut yaml_error = String::new();

        for format in decoder_order(content_type_hint, text) {
            match format.decode(text) {
                Ok(value) => {
                    debug!(format = format.as_str(), "decoded spec text");
                    return Ok(value);
                }
                Err(error) => {
                    trace!(format = format.as_str(), %error, "decoder rejected text");
                    match format {
                        SpecFormat::Json => json_error = error,
                        SpecFormat::Yaml => yaml_error = error,
                    }
                }
            }
        }

        debug!(%json_error, %yaml_error, "no decoder accepted text");
        Err(SpecError::Unparseable {
            json: json_error,
            yaml: yaml_error,
        })
    }
}

/// Converts a YAML tree into the JSON value model.
///
/// Scalar mapping keys are stringified (`200:` becomes `"200"`), tags are
/// dropped, and non-finite floats are rejected.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_to_json(tagged.value)?
        }
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::from(u))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("number {n} cannot be represented in JSON"))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_key(tagged.value)
        }
        Yaml::Sequence(_) | Yaml::Mapping(_) => {
            Err("mapping keys must be scalars to convert to JSON".to_string())
        }
    }
}
