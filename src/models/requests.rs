//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{NamespaceCodec, EXPIRATION_SUFFIX};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in minutes, fractions allowed
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in minutes
    #[serde(default)]
    pub ttl: Option<f64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if NamespaceCodec::is_reserved(&self.key) {
            return Some(format!("Key cannot contain '{}'", EXPIRATION_SUFFIX));
        }
        None
    }
}

/// Request body for PUT /bucket
#[derive(Debug, Clone, Deserialize)]
pub struct BucketRequest {
    /// Bucket to switch to
    pub name: String,
}

/// Request body for PUT /warnings
#[derive(Debug, Clone, Deserialize)]
pub struct WarningsRequest {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!("hello"));
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_request_structured_value_and_fractional_ttl() {
        let json = r#"{"key": "test", "value": {"a": [1, 2]}, "ttl": 0.5}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value, json!({"a": [1, 2]}));
        assert_eq!(req.ttl, Some(0.5));
    }

    #[test]
    fn test_validate_empty_key() {
        let req = SetRequest {
            key: "".to_string(),
            value: json!("test"),
            ttl: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req = SetRequest {
            key: "valid_key".to_string(),
            value: json!("test"),
            ttl: Some(60.0),
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_reserved_key() {
        let req = SetRequest {
            key: "k-cacheexpiration".to_string(),
            value: json!("test"),
            ttl: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_bucket_request_deserialize() {
        let req: BucketRequest = serde_json::from_str(r#"{"name": "users"}"#).unwrap();
        assert_eq!(req.name, "users");
    }
}
