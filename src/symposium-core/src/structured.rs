//! Structured model output: JSON schema generation and lenient decoding.

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::InferenceError;

/// A type the model is asked to produce as a JSON object.
///
/// Implemented for anything that is `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Inlined JSON schema for this type with `additionalProperties: false`
    /// on every object and all properties listed as required.
    fn output_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        close_objects(&mut value);
        if let Value::Object(map) = &mut value {
            map.remove("$schema");
            map.remove("title");
        }

        value
    }

    /// Name of the output shape, used to label requests.
    fn output_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                if let Some(Value::Object(props)) = map.get("properties") {
                    let required = props.keys().cloned().map(Value::String).collect();
                    map.insert("required".to_string(), Value::Array(required));
                }
            }

            for (_, v) in map.iter_mut() {
                close_objects(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                close_objects(item);
            }
        }
        _ => {}
    }
}

/// Strip a surrounding markdown code fence from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Decode raw model text into `T`.
///
/// Accepts a bare JSON object, one wrapped in a code fence, or one
/// surrounded by chatter (the outermost `{...}` span is tried last).
pub fn decode<T: StructuredOutput>(raw: &str) -> Result<T, InferenceError> {
    let body = strip_code_blocks(raw);

    let first_err = match serde_json::from_str::<T>(body) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<T>(&body[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(InferenceError::Malformed(format!(
        "expected {} JSON: {}",
        T::output_name(),
        first_err
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Verdict {
        winner: String,
        margin: Option<u32>,
    }

    #[test]
    fn test_schema_closes_objects_and_requires_all_fields() {
        let schema = Verdict::output_schema();
        assert_eq!(schema["additionalProperties"], Value::Bool(false));

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(required.contains(&"winner"));
        assert!(required.contains(&"margin"));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_output_name() {
        assert_eq!(Verdict::output_name(), "Verdict");
    }

    #[test]
    fn test_decode_plain_json() {
        let v: Verdict = decode(r#"{"winner": "Kant", "margin": 2}"#).unwrap();
        assert_eq!(v.winner, "Kant");
        assert_eq!(v.margin, Some(2));
    }

    #[test]
    fn test_decode_fenced_json() {
        let v: Verdict = decode("```json\n{\"winner\": \"Plato\", \"margin\": null}\n```").unwrap();
        assert_eq!(v.winner, "Plato");
        assert_eq!(v.margin, None);
    }

    #[test]
    fn test_decode_json_with_surrounding_text() {
        let raw = "Sure! Here you go: {\"winner\": \"Nietzsche\", \"margin\": 1} Hope that helps.";
        let v: Verdict = decode(raw).unwrap();
        assert_eq!(v.winner, "Nietzsche");
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let err = decode::<Verdict>(r#"{"argument": "x"}"#).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_decode_rejects_prose() {
        let err = decode::<Verdict>("I refuse to answer in JSON.").unwrap_err();
        assert!(matches!(err, InferenceError::Malformed(msg) if msg.contains("Verdict")));
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
