//! Output writers for the supported payload encodings.
//!
//! Every writer returns an XML output document, since the result is spliced
//! into a SOAP body. A record whose value is `null` produces no document.

use serde_json::Value as JsonValue;

use super::convert::{scalar_text, value_to_element};
use super::readers::TEXT_WRAPPER_NAMESPACE;
use super::{IntermediateRecord, MappingError, OutputWriter};
use crate::datatype::DataType;
use crate::envelope::is_envelope_marker;
use crate::xml::{QName, XmlElement};

/// Root of the document wrapping an envelope produced by the XML writer.
pub const DOCUMENT_ELEMENT: &str = "document";

/// Writes the record as an XML element named after the record.
///
/// When the record is itself a SOAP envelope the element is returned inside a
/// `document` wrapper, so the caller sees the envelope as the document's
/// first child.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlOutputWriter;

impl OutputWriter for XmlOutputWriter {
    fn data_type(&self) -> DataType {
        DataType::Xml
    }

    fn write(
        &self,
        _output_type: &str,
        record: &IntermediateRecord,
    ) -> Result<Option<XmlElement>, MappingError> {
        if record.value().is_null() {
            return Ok(None);
        }

        let name = match record.namespace() {
            Some(ns) if !ns.is_empty() => QName::qualified(ns, record.name()),
            _ => QName::local(record.name()),
        };
        let element = value_to_element(name, record.value(), "item", DataType::Xml)?;

        if is_envelope_marker(&element.name) {
            Ok(Some(
                XmlElement::new(QName::local(DOCUMENT_ELEMENT)).with_child(element),
            ))
        } else {
            Ok(Some(element))
        }
    }
}

/// Writes the record as a `jsonObject` (or `jsonArray`) element, the XML
/// form a JSON payload takes inside an envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutputWriter;

impl OutputWriter for JsonOutputWriter {
    fn data_type(&self) -> DataType {
        DataType::Json
    }

    fn write(
        &self,
        _output_type: &str,
        record: &IntermediateRecord,
    ) -> Result<Option<XmlElement>, MappingError> {
        let root = match record.value() {
            JsonValue::Null => return Ok(None),
            JsonValue::Array(_) => "jsonArray",
            _ => "jsonObject",
        };
        Ok(Some(value_to_element(
            QName::local(root),
            record.value(),
            "jsonElement",
            DataType::Json,
        )?))
    }
}

/// Writes an array of row objects as CSV text inside the payload text
/// element. Column order follows the first row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvOutputWriter;

impl OutputWriter for CsvOutputWriter {
    fn data_type(&self) -> DataType {
        DataType::Csv
    }

    fn write(
        &self,
        _output_type: &str,
        record: &IntermediateRecord,
    ) -> Result<Option<XmlElement>, MappingError> {
        let rows: Vec<&serde_json::Map<String, JsonValue>> = match record.value() {
            JsonValue::Null => return Ok(None),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| MappingError::Write {
                        data_type: DataType::Csv,
                        message: "every CSV row must be an object".to_string(),
                    })
                })
                .collect::<Result<_, _>>()?,
            JsonValue::Object(row) => vec![row],
            _ => {
                return Err(MappingError::Write {
                    data_type: DataType::Csv,
                    message: "record is neither a row nor a list of rows".to_string(),
                })
            }
        };

        let headers: Vec<&String> = rows.first().map(|row| row.keys().collect()).unwrap_or_default();

        let mut writer = csv::Writer::from_writer(Vec::new());
        if !headers.is_empty() {
            writer.write_record(headers.iter().map(|h| h.as_str()))?;
        }
        for row in &rows {
            let fields: Vec<String> = headers
                .iter()
                .map(|h| row.get(h.as_str()).map(scalar_text).unwrap_or_default())
                .collect();
            writer.write_record(&fields)?;
        }

        let bytes = writer.into_inner().map_err(|e| MappingError::Write {
            data_type: DataType::Csv,
            message: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| MappingError::Write {
            data_type: DataType::Csv,
            message: e.to_string(),
        })?;

        Ok(Some(
            XmlElement::new(QName::qualified(TEXT_WRAPPER_NAMESPACE, "text")).with_text(text),
        ))
    }
}
