//! Schema and mapping-configuration documents.
//!
//! Schemas are avro-style JSON record definitions. Mapping configurations
//! are YAML (or JSON) lists of field mappings between dotted field paths.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Record schema for one side of a mapping.
///
/// ```json
/// {
///   "type": "record",
///   "name": "order",
///   "namespace": "urn:shop",
///   "fields": [{"name": "id", "type": "string", "required": true}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    /// Record name; doubles as the root element name for XML payloads
    pub name: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

fn default_schema_type() -> String {
    "record".to_string()
}

/// A top-level field of a record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,

    /// Avro type; may be a primitive name or a nested schema
    #[serde(rename = "type", default)]
    pub field_type: JsonValue,

    #[serde(default)]
    pub required: bool,
}

impl Schema {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Names of fields that must be present in a record of this schema.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Field-level mapping instructions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Field mappings, applied in order. Empty means identity.
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
}

impl MappingConfig {
    /// Parse a mapping configuration. YAML is a superset of JSON, so both
    /// encodings are accepted.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn is_identity(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// One source-to-target field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Source path in the input record (e.g. `order.items.[0].sku`)
    pub from: String,

    /// Target path in the output record
    pub to: String,

    #[serde(default)]
    pub transform: Option<FieldTransform>,

    /// Value used when the source path is absent
    #[serde(default)]
    pub default: Option<JsonValue>,
}

/// Scalar conversions applied to a mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    Uppercase,
    Lowercase,
    Trim,
    ToNumber,
    ToString,
    ToBoolean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_schema() {
        let schema = Schema::from_json(
            r#"{"type":"record","name":"order","namespace":"urn:shop",
                "fields":[{"name":"id","type":"string","required":true},{"name":"note","type":"string"}]}"#,
        )
        .unwrap();

        assert_eq!(schema.name, "order");
        assert_eq!(schema.namespace.as_deref(), Some("urn:shop"));
        assert_eq!(schema.field_names(), vec!["id", "note"]);
        assert_eq!(schema.required_fields().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_schema_type_defaults_to_record() {
        let schema = Schema::from_json(r#"{"name":"invoice"}"#).unwrap();
        assert_eq!(schema.schema_type, "record");
        assert!(schema.fields.is_empty());
    }

    #[test]
    fn test_parse_mapping_config_yaml() {
        let config = MappingConfig::parse(
            r#"
mappings:
  - from: order.id
    to: invoice.reference
    transform: uppercase
  - from: order.note
    to: invoice.comment
    default: "none"
"#,
        )
        .unwrap();

        assert_eq!(config.mappings.len(), 2);
        assert_eq!(config.mappings[0].transform, Some(FieldTransform::Uppercase));
        assert_eq!(config.mappings[1].default, Some(json!("none")));
        assert!(!config.is_identity());
    }

    #[test]
    fn test_parse_mapping_config_json() {
        let config =
            MappingConfig::parse(r#"{"mappings":[{"from":"a","to":"b","transform":"to_number"}]}"#)
                .unwrap();
        assert_eq!(config.mappings[0].transform, Some(FieldTransform::ToNumber));
    }

    #[test]
    fn test_empty_mapping_config_is_identity() {
        let config = MappingConfig::parse("{}").unwrap();
        assert!(config.is_identity());
    }
}
