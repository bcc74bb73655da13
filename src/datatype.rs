//! Declared payload type tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Payload encodings the data mapper can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Xml,
    Json,
    Csv,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Xml, DataType::Json, DataType::Csv];

    /// Parse a type token (`"XML"`, `"json"`, ` Csv `). Returns `None` for
    /// anything unrecognized.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.token().eq_ignore_ascii_case(token))
    }

    /// Canonical token for this type.
    pub fn token(&self) -> &'static str {
        match self {
            DataType::Xml => "XML",
            DataType::Json => "JSON",
            DataType::Csv => "CSV",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| format!("Unknown data type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token_is_case_insensitive() {
        assert_eq!(DataType::from_token("XML"), Some(DataType::Xml));
        assert_eq!(DataType::from_token("json"), Some(DataType::Json));
        assert_eq!(DataType::from_token(" Csv "), Some(DataType::Csv));
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(DataType::from_token("AVRO"), None);
        assert_eq!(DataType::from_token(""), None);
        assert!("yaml".parse::<DataType>().is_err());
    }

    #[test]
    fn test_serde_uses_uppercase_tokens() {
        let json = serde_json::to_string(&DataType::Csv).unwrap();
        assert_eq!(json, "\"CSV\"");
        let parsed: DataType = serde_json::from_str("\"JSON\"").unwrap();
        assert_eq!(parsed, DataType::Json);
    }
}
