//! Conversions between XML element trees and JSON record values.
//!
//! Element to value:
//! - attributes become `@name` keys (namespace declarations are skipped)
//! - child elements become keys by local name; repeated names become arrays
//! - text becomes the value itself for leaf elements, `#text` otherwise
//!
//! Value to element is the inverse. A key may carry an explicit namespace in
//! Clark notation (`{urn:x}name`, or `{}name` for none); otherwise children
//! inherit the parent's namespace. Keys that are not valid XML names are
//! rejected rather than written out as broken markup.

use serde_json::{Map, Value as JsonValue};

use super::MappingError;
use crate::datatype::DataType;
use crate::xml::{QName, XmlElement, XmlNode};

pub const TEXT_KEY: &str = "#text";
pub const ATTRIBUTE_PREFIX: char = '@';

/// Convert an element's content into a record value.
pub fn element_to_value(element: &XmlElement) -> JsonValue {
    let attributes: Vec<(&String, &String)> = element
        .attributes
        .iter()
        .filter(|(key, _)| *key != "xmlns" && !key.starts_with("xmlns:"))
        .collect();
    let text = element.text();

    if attributes.is_empty() && element.first_element().is_none() {
        return JsonValue::String(text);
    }

    let mut map = Map::new();
    for (key, value) in attributes {
        map.insert(format!("{}{}", ATTRIBUTE_PREFIX, key), JsonValue::String(value.clone()));
    }

    for child in element.child_elements() {
        let value = element_to_value(child);
        match map.get_mut(&child.name.local) {
            Some(JsonValue::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = JsonValue::Array(vec![first, value]);
            }
            None => {
                map.insert(child.name.local.clone(), value);
            }
        }
    }

    if !text.is_empty() {
        map.insert(TEXT_KEY.to_string(), JsonValue::String(text));
    }

    JsonValue::Object(map)
}

/// Build an element named `name` from a record value.
///
/// A top-level array yields one child per item, each named `item_name`.
/// Every element and attribute name must be a valid unprefixed XML name;
/// otherwise a [`MappingError::Write`] for `data_type` is returned.
pub fn value_to_element(
    name: QName,
    value: &JsonValue,
    item_name: &str,
    data_type: DataType,
) -> Result<XmlElement, MappingError> {
    check_name(&name.local, data_type)?;
    let mut element = XmlElement::new(name);
    match value {
        JsonValue::Array(items) => {
            for item in items {
                let child_name = child_qname(&element.name, item_name, data_type)?;
                element.add_child(value_to_element(child_name, item, item_name, data_type)?);
            }
        }
        _ => fill_element(&mut element, value, item_name, data_type)?,
    }
    Ok(element)
}

fn fill_element(
    element: &mut XmlElement,
    value: &JsonValue,
    item_name: &str,
    data_type: DataType,
) -> Result<(), MappingError> {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                if key == TEXT_KEY {
                    element.children.push(XmlNode::Text(scalar_text(child)));
                } else if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    check_name(attr, data_type)?;
                    element.attributes.insert(attr.to_string(), scalar_text(child));
                } else {
                    let child_name = child_qname(&element.name, key, data_type)?;
                    match child {
                        JsonValue::Array(items) => {
                            for item in items {
                                let mut item_element = XmlElement::new(child_name.clone());
                                fill_element(&mut item_element, item, item_name, data_type)?;
                                element.add_child(item_element);
                            }
                        }
                        _ => {
                            let mut child_element = XmlElement::new(child_name);
                            fill_element(&mut child_element, child, item_name, data_type)?;
                            element.add_child(child_element);
                        }
                    }
                }
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                let child_name = child_qname(&element.name, item_name, data_type)?;
                let mut item_element = XmlElement::new(child_name);
                fill_element(&mut item_element, item, item_name, data_type)?;
                element.add_child(item_element);
            }
        }
        JsonValue::Null => {}
        scalar => {
            let text = scalar_text(scalar);
            if !text.is_empty() {
                element.children.push(XmlNode::Text(text));
            }
        }
    }
    Ok(())
}

fn child_qname(parent: &QName, key: &str, data_type: DataType) -> Result<QName, MappingError> {
    if let Some(rest) = key.strip_prefix('{') {
        if let Some((namespace, local)) = rest.split_once('}') {
            check_name(local, data_type)?;
            return Ok(if namespace.is_empty() {
                QName::local(local)
            } else {
                QName::qualified(namespace, local)
            });
        }
    }
    check_name(key, data_type)?;
    Ok(QName {
        namespace: parent.namespace.clone(),
        local: key.to_string(),
        prefix: parent.prefix.clone(),
    })
}

/// Whether `name` can be written as an unprefixed element or attribute name.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

fn check_name(name: &str, data_type: DataType) -> Result<(), MappingError> {
    if is_xml_name(name) {
        Ok(())
    } else {
        Err(MappingError::Write {
            data_type,
            message: format!("'{}' is not a valid XML name", name),
        })
    }
}

/// Text form of a scalar; objects and arrays fall back to compact JSON.
pub fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
