//! Namespace Module
//!
//! Maps logical `(bucket, key)` pairs to the physical keys stored in the
//! shared backing store, and back.
//!
//! Layout: `PREFIX + escaped(bucket) + '|' + key` for the value record and the
//! same with [`EXPIRATION_SUFFIX`] appended for the expiration record. Inside
//! the bucket, `\` and `|` are escaped with `\`, so the first unescaped `|`
//! always ends the bucket and no two pairs share a physical key.

use regex::Regex;

// == Constants ==
/// Marks every record owned by the cache.
pub const CACHE_PREFIX: &str = "qcache-";

/// Appended to a value key to form its expiration key.
pub const EXPIRATION_SUFFIX: &str = "-cacheexpiration";

const BUCKET_DELIMITER: char = '|';
const ESCAPE: char = '\\';

/// Returns the expiration key paired with `key`.
pub fn expiration_key(key: &str) -> String {
    format!("{}{}", key, EXPIRATION_SUFFIX)
}

fn escape_bucket(bucket: &str) -> String {
    let mut escaped = String::with_capacity(bucket.len());
    for c in bucket.chars() {
        if c == ESCAPE || c == BUCKET_DELIMITER {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

// == Owned Key ==
/// A raw store key recognized as belonging to the active bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedKey {
    /// Value record for the logical key
    Value(String),
    /// Expiration record for the logical key
    Expiration(String),
}

// == Namespace Codec ==
/// Physical key mapping for one bucket.
#[derive(Debug, Clone)]
pub struct NamespaceCodec {
    bucket: String,
    physical_prefix: String,
    matcher: Regex,
}

impl NamespaceCodec {
    // == Constructor ==
    /// Creates a codec for `bucket` (empty string is the default bucket).
    pub fn new(bucket: &str) -> Self {
        let physical_prefix = format!(
            "{}{}{}",
            CACHE_PREFIX,
            escape_bucket(bucket),
            BUCKET_DELIMITER
        );
        let pattern = format!("(?s)^{}(.*)$", regex::escape(&physical_prefix));
        let matcher = Regex::new(&pattern).expect("escaped literal pattern is always valid");

        Self {
            bucket: bucket.to_string(),
            physical_prefix,
            matcher,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    // == Forward Mapping ==
    /// Physical key of the value record for `key`.
    pub fn value_key(&self, key: &str) -> String {
        format!("{}{}", self.physical_prefix, key)
    }

    /// Physical key of the expiration record for `key`.
    pub fn expiration_key(&self, key: &str) -> String {
        expiration_key(&self.value_key(key))
    }

    /// Keys containing the expiration suffix would alias another key's
    /// expiration record, so the cache refuses them.
    pub fn is_reserved(key: &str) -> bool {
        key.contains(EXPIRATION_SUFFIX)
    }

    // == Inverse Mapping ==
    /// Classifies a raw store key. Returns None for keys outside this bucket.
    pub fn classify(&self, raw_key: &str) -> Option<OwnedKey> {
        let captures = self.matcher.captures(raw_key)?;
        let rest = captures.get(1)?.as_str();

        if let Some(key) = rest.strip_suffix(EXPIRATION_SUFFIX) {
            if Self::is_reserved(key) {
                return None;
            }
            return Some(OwnedKey::Expiration(key.to_string()));
        }
        if Self::is_reserved(rest) {
            return None;
        }
        Some(OwnedKey::Value(rest.to_string()))
    }

    /// Logical key when `raw_key` is a value record of this bucket.
    pub fn logical_key(&self, raw_key: &str) -> Option<String> {
        match self.classify(raw_key)? {
            OwnedKey::Value(key) => Some(key),
            OwnedKey::Expiration(_) => None,
        }
    }
}

impl Default for NamespaceCodec {
    fn default() -> Self {
        Self::new("")
    }
}
