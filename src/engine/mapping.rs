//! Declarative field-mapping engine.

use serde_json::{Map, Number, Value as JsonValue};

use super::{InputReader, InputStream, IntermediateRecord, MappingEngine, MappingError};
use crate::extraction::FieldPath;
use crate::resources::{FieldMapping, FieldTransform, ResourceBundle};

/// Applies the field mappings of a [`MappingConfig`](crate::resources::MappingConfig)
/// to the record produced by the input reader.
///
/// Mappings run in order. A mapping whose source path is absent uses its
/// `default`, or is skipped when it has none. An empty mapping list passes
/// the input value through unchanged. Required fields of the output schema
/// are checked last.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMappingEngine;

impl MappingEngine for FieldMappingEngine {
    fn map(
        &self,
        input: InputStream,
        resources: &ResourceBundle,
        reader: &dyn InputReader,
    ) -> Result<IntermediateRecord, MappingError> {
        let record = reader.read(&input, &resources.input_schema)?;
        let output_schema = &resources.output_schema;

        let value = if resources.config.is_identity() {
            record.into_value()
        } else {
            let mut output = JsonValue::Object(Map::new());
            for mapping in &resources.config.mappings {
                let source = FieldPath::from_dotted(&mapping.from)
                    .get(record.value())
                    .cloned()
                    .or_else(|| mapping.default.clone());

                let Some(source) = source else {
                    tracing::trace!(from = %mapping.from, "Source field absent, skipping mapping");
                    continue;
                };

                let mapped = match mapping.transform {
                    Some(transform) => apply_transform(mapping, transform, source)?,
                    None => source,
                };
                FieldPath::from_dotted(&mapping.to).set(&mut output, mapped)?;
            }
            output
        };

        for field in output_schema.required_fields() {
            let present = value.get(field).is_some_and(|v| !v.is_null());
            if !present {
                return Err(MappingError::MissingField(field.to_string()));
            }
        }

        Ok(IntermediateRecord::new(
            output_schema.name.clone(),
            output_schema.namespace.clone(),
            value,
        ))
    }
}

fn apply_transform(
    mapping: &FieldMapping,
    transform: FieldTransform,
    value: JsonValue,
) -> Result<JsonValue, MappingError> {
    let fail = |reason: &str| MappingError::Transform {
        field: mapping.from.clone(),
        transform,
        reason: reason.to_string(),
    };

    match transform {
        FieldTransform::Uppercase | FieldTransform::Lowercase | FieldTransform::Trim => {
            let JsonValue::String(s) = value else {
                return Err(fail("value is not a string"));
            };
            Ok(JsonValue::String(match transform {
                FieldTransform::Uppercase => s.to_uppercase(),
                FieldTransform::Lowercase => s.to_lowercase(),
                _ => s.trim().to_string(),
            }))
        }
        FieldTransform::ToNumber => match value {
            JsonValue::Number(_) => Ok(value),
            JsonValue::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(JsonValue::Number(i.into()))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(JsonValue::Number)
                        .ok_or_else(|| fail("value is not numeric"))
                }
            }
            _ => Err(fail("value is not numeric")),
        },
        FieldTransform::ToString => match value {
            JsonValue::String(_) => Ok(value),
            JsonValue::Number(n) => Ok(JsonValue::String(n.to_string())),
            JsonValue::Bool(b) => Ok(JsonValue::String(b.to_string())),
            JsonValue::Null => Ok(JsonValue::String(String::new())),
            _ => Err(fail("value is not a scalar")),
        },
        FieldTransform::ToBoolean => match value {
            JsonValue::Bool(_) => Ok(value),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(JsonValue::Bool(true)),
                "false" | "0" | "no" => Ok(JsonValue::Bool(false)),
                _ => Err(fail("value is not a boolean")),
            },
            _ => Err(fail("value is not a boolean")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JsonInputReader, XmlInputReader};
    use crate::extraction::FieldPathError;
    use crate::resources::{MappingConfig, Schema};
    use serde_json::json;

    fn bundle(config: &str, output_schema: &str) -> ResourceBundle {
        ResourceBundle {
            config: MappingConfig::parse(config).unwrap(),
            input_schema: Schema::from_json(r#"{"name":"order"}"#).unwrap(),
            output_schema: Schema::from_json(output_schema).unwrap(),
        }
    }

    #[test]
    fn test_maps_fields_with_transforms() {
        let resources = bundle(
            r#"
mappings:
  - from: "@id"
    to: reference
    transform: to_number
  - from: customer.name
    to: billing.name
    transform: uppercase
  - from: note
    to: comment
    default: "n/a"
"#,
            r#"{"name":"invoice","namespace":"urn:billing"}"#,
        );
        let input = InputStream::from_bytes(
            r#"<order id="42"><customer><name>ada</name></customer></order>"#,
        );

        let record = FieldMappingEngine
            .map(input, &resources, &XmlInputReader)
            .unwrap();

        assert_eq!(record.name(), "invoice");
        assert_eq!(record.namespace(), Some("urn:billing"));
        assert_eq!(
            record.value(),
            &json!({"reference": 42, "billing": {"name": "ADA"}, "comment": "n/a"})
        );
    }

    #[test]
    fn test_identity_mapping() {
        let resources = bundle("{}", r#"{"name":"copy"}"#);
        let input = InputStream::from_bytes(r#"{"a": [1, 2]}"#);

        let record = FieldMappingEngine
            .map(input, &resources, &JsonInputReader)
            .unwrap();

        assert_eq!(record.name(), "copy");
        assert_eq!(record.value(), &json!({"a": [1, 2]}));
    }

    #[test]
    fn test_missing_required_field() {
        let resources = bundle(
            "mappings:\n  - from: absent\n    to: id\n",
            r#"{"name":"invoice","fields":[{"name":"id","type":"string","required":true}]}"#,
        );
        let input = InputStream::from_bytes(r#"{"other": 1}"#);

        let result = FieldMappingEngine.map(input, &resources, &JsonInputReader);
        assert!(matches!(result, Err(MappingError::MissingField(f)) if f == "id"));
    }

    #[test]
    fn test_reader_failure_propagates() {
        let resources = bundle("{}", r#"{"name":"copy"}"#);
        let result = FieldMappingEngine.map(InputStream::absent(), &resources, &JsonInputReader);
        assert!(matches!(result, Err(MappingError::EmptyInput(_))));
    }

    #[test]
    fn test_oversized_target_index_fails_mapping() {
        let resources = bundle(
            "mappings:\n  - from: qty\n    to: \"a.[18446744073709551615]\"\n",
            r#"{"name":"out"}"#,
        );
        let input = InputStream::from_bytes(r#"{"qty": 1}"#);

        let result = FieldMappingEngine.map(input, &resources, &JsonInputReader);
        assert!(matches!(
            result,
            Err(MappingError::Path(FieldPathError::IndexTooLarge { .. }))
        ));
    }

    #[test]
    fn test_bad_transform_input() {
        let resources = bundle(
            "mappings:\n  - from: qty\n    to: qty\n    transform: to_number\n",
            r#"{"name":"out"}"#,
        );
        let input = InputStream::from_bytes(r#"{"qty": "many"}"#);

        let result = FieldMappingEngine.map(input, &resources, &JsonInputReader);
        assert!(matches!(result, Err(MappingError::Transform { .. })));
    }

    #[test]
    fn test_to_boolean_and_to_string() {
        let resources = bundle(
            r#"
mappings:
  - from: active
    to: active
    transform: to_boolean
  - from: count
    to: count
    transform: to_string
"#,
            r#"{"name":"out"}"#,
        );
        let input = InputStream::from_bytes(r#"{"active": "Yes", "count": 3}"#);

        let record = FieldMappingEngine
            .map(input, &resources, &JsonInputReader)
            .unwrap();
        assert_eq!(record.value(), &json!({"active": true, "count": "3"}));
    }
}
