//! Input readers for the supported payload encodings.

use serde_json::{Map, Value as JsonValue};

use super::convert::element_to_value;
use super::{InputReader, InputStream, IntermediateRecord, MappingError};
use crate::datatype::DataType;
use crate::resources::Schema;
use crate::xml::XmlElement;

/// Namespace of the element that wraps plain-text payloads inside a body.
pub const TEXT_WRAPPER_NAMESPACE: &str = "http://ws.apache.org/commons/ns/payload";

fn utf8(input: &InputStream, data_type: DataType) -> Result<&str, MappingError> {
    let bytes = input.bytes().ok_or(MappingError::EmptyInput(data_type))?;
    std::str::from_utf8(bytes).map_err(|e| MappingError::Malformed {
        data_type,
        message: e.to_string(),
    })
}

/// Reads an XML payload element. The root element must carry the input
/// schema's name when the schema declares one.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlInputReader;

impl InputReader for XmlInputReader {
    fn data_type(&self) -> DataType {
        DataType::Xml
    }

    fn read(&self, input: &InputStream, schema: &Schema) -> Result<IntermediateRecord, MappingError> {
        let root = XmlElement::parse(utf8(input, DataType::Xml)?)?;

        if !schema.name.is_empty() && root.name.local != schema.name {
            return Err(MappingError::SchemaMismatch {
                expected: schema.name.clone(),
                found: root.name.local.clone(),
            });
        }

        Ok(IntermediateRecord::new(
            root.name.local.clone(),
            root.name.namespace.clone(),
            element_to_value(&root),
        ))
    }
}

/// Reads a raw JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInputReader;

impl InputReader for JsonInputReader {
    fn data_type(&self) -> DataType {
        DataType::Json
    }

    fn read(&self, input: &InputStream, schema: &Schema) -> Result<IntermediateRecord, MappingError> {
        let bytes = input.bytes().ok_or(MappingError::EmptyInput(DataType::Json))?;
        let value: JsonValue = serde_json::from_slice(bytes)?;
        Ok(IntermediateRecord::new(
            schema.name.clone(),
            schema.namespace.clone(),
            value,
        ))
    }
}

/// Reads CSV text with a header row into an array of row objects.
///
/// The text may arrive bare or wrapped in a payload text element, which is
/// how plain-text bodies travel inside an envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvInputReader;

impl InputReader for CsvInputReader {
    fn data_type(&self) -> DataType {
        DataType::Csv
    }

    fn read(&self, input: &InputStream, schema: &Schema) -> Result<IntermediateRecord, MappingError> {
        let raw = utf8(input, DataType::Csv)?;
        let unwrapped;
        let text = if raw.trim_start().starts_with('<') {
            unwrapped = XmlElement::parse(raw)?.text();
            unwrapped.as_str()
        } else {
            raw
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.trim().as_bytes());

        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Map<String, JsonValue> = headers
                .iter()
                .zip(record.iter())
                .map(|(header, field)| (header.to_string(), JsonValue::String(field.to_string())))
                .collect();
            rows.push(JsonValue::Object(row));
        }

        Ok(IntermediateRecord::new(
            schema.name.clone(),
            schema.namespace.clone(),
            JsonValue::Array(rows),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(name: &str) -> Schema {
        Schema::from_json(&format!(r#"{{"name":"{}"}}"#, name)).unwrap()
    }

    #[test]
    fn test_xml_reader() {
        let input = InputStream::from_bytes(r#"<order id="1"><sku>A1</sku></order>"#);
        let record = XmlInputReader.read(&input, &schema("order")).unwrap();

        assert_eq!(record.name(), "order");
        assert_eq!(record.value(), &json!({"@id": "1", "sku": "A1"}));
    }

    #[test]
    fn test_xml_reader_rejects_wrong_root() {
        let input = InputStream::from_bytes("<invoice/>");
        let result = XmlInputReader.read(&input, &schema("order"));
        assert!(matches!(result, Err(MappingError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_xml_reader_rejects_malformed_input() {
        let input = InputStream::from_bytes("<order><sku></order>");
        assert!(XmlInputReader.read(&input, &schema("order")).is_err());
    }

    #[test]
    fn test_json_reader() {
        let input = InputStream::from_bytes(r#"{"id": 1, "tags": ["a"]}"#);
        let record = JsonInputReader.read(&input, &schema("order")).unwrap();

        assert_eq!(record.name(), "order");
        assert_eq!(record.value(), &json!({"id": 1, "tags": ["a"]}));
    }

    #[test]
    fn test_json_reader_absent_input() {
        let result = JsonInputReader.read(&InputStream::absent(), &schema("order"));
        assert!(matches!(result, Err(MappingError::EmptyInput(DataType::Json))));
    }

    #[test]
    fn test_csv_reader_bare_text() {
        let input = InputStream::from_bytes("id, name\n1, pen\n2, ink\n");
        let record = CsvInputReader.read(&input, &schema("items")).unwrap();

        assert_eq!(
            record.value(),
            &json!([{"id": "1", "name": "pen"}, {"id": "2", "name": "ink"}])
        );
    }

    #[test]
    fn test_csv_reader_wrapped_text() {
        let input = InputStream::from_bytes(format!(
            "<text xmlns=\"{}\">id,name\n1,pen</text>",
            TEXT_WRAPPER_NAMESPACE
        ));
        let record = CsvInputReader.read(&input, &schema("items")).unwrap();
        assert_eq!(record.value(), &json!([{"id": "1", "name": "pen"}]));
    }
}
