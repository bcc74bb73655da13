//! Dotted field paths for addressing values inside intermediate records.
//!
//! A path such as `order.items.[0].sku` is split on `.`; a segment written
//! `[n]` is an array index, anything else is an object field.

use std::fmt;

use serde_json::{Map, Value as JsonValue};

/// Largest array index [`FieldPath::set`] will pad an array up to.
pub const MAX_INDEX: usize = 10_000;

/// Errors raised while writing through a field path.
#[derive(Debug, thiserror::Error)]
pub enum FieldPathError {
    #[error("Index {index} in path '{path}' exceeds the maximum of {}", MAX_INDEX)]
    IndexTooLarge { path: String, index: usize },
}

/// Represents a path to a field in a record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The raw path string
    pub raw: String,
    /// Parsed path segments
    pub segments: Vec<PathSegment>,
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field (e.g., "order", "id")
    Field(String),
    /// An array index (e.g., [0], [5])
    Index(usize),
}

impl FieldPath {
    /// Parse a field path with a given delimiter
    ///
    /// # Example
    ///
    /// ```
    /// use datamapper_mediator::extraction::{FieldPath, PathSegment};
    ///
    /// let path = FieldPath::parse("order.items.[1]", ".");
    /// assert_eq!(path.segments.len(), 3);
    /// assert_eq!(path.segments[2], PathSegment::Index(1));
    /// ```
    pub fn parse(path: &str, delimiter: &str) -> Self {
        let segments = path
            .split(delimiter)
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                    if let Ok(index) = inner.parse::<usize>() {
                        return PathSegment::Index(index);
                    }
                }
                PathSegment::Field(s.to_string())
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Create a field path from a dotted string (common format)
    pub fn from_dotted(path: &str) -> Self {
        Self::parse(path, ".")
    }

    /// Look up the value at this path. An empty path addresses the root.
    pub fn get<'a>(&self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                PathSegment::Field(name) => current.get(name.as_str()),
                PathSegment::Index(index) => current.get(*index),
            })
    }

    /// Store `new_value` at this path, creating intermediate objects and
    /// arrays as needed. Scalars in the way are replaced; arrays are padded
    /// with nulls up to the requested index, which may not exceed
    /// [`MAX_INDEX`].
    pub fn set(
        &self,
        target: &mut JsonValue,
        new_value: JsonValue,
    ) -> Result<(), FieldPathError> {
        let mut current = target;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => {
                    if !current.is_object() {
                        *current = JsonValue::Object(Map::new());
                    }
                    match current {
                        JsonValue::Object(map) => {
                            map.entry(name.clone()).or_insert(JsonValue::Null)
                        }
                        _ => unreachable!("value was just made an object"),
                    }
                }
                PathSegment::Index(index) => {
                    let len = index
                        .checked_add(1)
                        .filter(|_| *index <= MAX_INDEX)
                        .ok_or_else(|| FieldPathError::IndexTooLarge {
                            path: self.raw.clone(),
                            index: *index,
                        })?;
                    if !current.is_array() {
                        *current = JsonValue::Array(Vec::new());
                    }
                    match current {
                        JsonValue::Array(items) => {
                            if items.len() < len {
                                items.resize(len, JsonValue::Null);
                            }
                            &mut items[*index]
                        }
                        _ => unreachable!("value was just made an array"),
                    }
                }
            };
        }
        *current = new_value;
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
