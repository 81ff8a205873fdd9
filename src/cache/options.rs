//! Init Options Module
//!
//! Options accepted by [`Cache::init`](crate::cache::Cache::init).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::backend::StoreKind;
use crate::error::{CacheError, Result};

// == Init Options ==
/// Recognized `init` options. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct InitOptions {
    /// Requested store kind: `durable`, `session` or `synced`
    #[serde(default)]
    pub storage_kind: Option<String>,
}

impl InitOptions {
    pub fn with_storage_kind(kind: impl Into<String>) -> Self {
        Self {
            storage_kind: Some(kind.into()),
        }
    }

    /// Parses options from a JSON object. `null` means "no options".
    pub fn from_json(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| CacheError::UnknownOption(e.to_string()))
    }
}

// == Init Report ==
/// Result of `init`. Empty when no store kind was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using_kind: Option<StoreKind>,
}
