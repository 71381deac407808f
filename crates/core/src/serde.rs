//! Serde helper functions for request deserialization.
//!
//! Clients send empty strings for fields they did not fill in, and creation
//! times arrive either as strings or as numbers. These helpers normalize both.

use serde::{Deserialize, Deserializer};

/// A JSON value that is either a string or a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

/// Deserialize an optional string, treating empty strings as None.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

/// Deserialize a creation time given as a string or a number.
pub fn deserialize_creation_time<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

/// Deserialize an optional creation time, treating empty strings as None.
pub fn deserialize_optional_creation_time<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    Ok(value
        .map(StringOrNumber::into_string)
        .filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestStruct {
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        string_field: Option<String>,
        #[serde(default, deserialize_with = "deserialize_optional_creation_time")]
        time_field: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct RequiredTime {
        #[serde(deserialize_with = "deserialize_creation_time")]
        time: String,
    }

    #[test]
    fn test_deserialize_optional_string_empty() {
        let result: TestStruct = serde_json::from_str(r#"{"string_field": ""}"#).unwrap();
        assert_eq!(result.string_field, None);
    }

    #[test]
    fn test_deserialize_optional_string_whitespace() {
        let result: TestStruct = serde_json::from_str(r#"{"string_field": "   "}"#).unwrap();
        assert_eq!(result.string_field, None);
    }

    #[test]
    fn test_deserialize_optional_string_value() {
        let result: TestStruct = serde_json::from_str(r#"{"string_field": "hello"}"#).unwrap();
        assert_eq!(result.string_field, Some("hello".to_string()));
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let result: TestStruct = serde_json::from_str("{}").unwrap();
        assert_eq!(
            result,
            TestStruct {
                string_field: None,
                time_field: None
            }
        );
    }

    #[test]
    fn test_creation_time_from_string() {
        let result: TestStruct = serde_json::from_str(r#"{"time_field": "1000"}"#).unwrap();
        assert_eq!(result.time_field, Some("1000".to_string()));
    }

    #[test]
    fn test_creation_time_from_number() {
        let result: TestStruct = serde_json::from_str(r#"{"time_field": 1700000000000}"#).unwrap();
        assert_eq!(result.time_field, Some("1700000000000".to_string()));
    }

    #[test]
    fn test_creation_time_empty_string_is_none() {
        let result: TestStruct = serde_json::from_str(r#"{"time_field": ""}"#).unwrap();
        assert_eq!(result.time_field, None);
    }

    #[test]
    fn test_required_creation_time_accepts_both_forms() {
        let from_str: RequiredTime = serde_json::from_str(r#"{"time": "42"}"#).unwrap();
        let from_num: RequiredTime = serde_json::from_str(r#"{"time": 42}"#).unwrap();
        assert_eq!(from_str, from_num);
    }

    #[test]
    fn test_creation_time_rejects_objects() {
        let result: Result<RequiredTime, _> = serde_json::from_str(r#"{"time": {"a": 1}}"#);
        assert!(result.is_err());
    }
}
