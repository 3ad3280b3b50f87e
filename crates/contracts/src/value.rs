//! StructuredValue - the serialization model for records
//!
//! A record is a nested map/array structure. Map pair order is preserved and
//! keys are not required to be unique, so maps are stored as ordered pair
//! vectors rather than hash maps.

/// A single value inside a structured record.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredValue {
    /// Explicit nil
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Double-precision float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered sequence of values
    Array(Vec<StructuredValue>),
    /// Ordered sequence of key/value pairs
    Map(Vec<(StructuredValue, StructuredValue)>),
}

impl StructuredValue {
    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Build a map from (key, value) pairs, keys as strings.
    pub fn map(pairs: Vec<(&str, StructuredValue)>) -> Self {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (Self::str(k), v))
                .collect(),
        )
    }

    /// Borrow the pair list if this value is a map.
    pub fn as_map(&self) -> Option<&[(StructuredValue, StructuredValue)]> {
        match self {
            Self::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Borrow the string content if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value is a container (map or array).
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Array(_))
    }
}

impl From<&str> for StructuredValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for StructuredValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for StructuredValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_order_and_duplicates() {
        let value = StructuredValue::Map(vec![
            (StructuredValue::str("k"), StructuredValue::Int(1)),
            (StructuredValue::str("k"), StructuredValue::Int(2)),
            (StructuredValue::str("a"), StructuredValue::Int(3)),
        ]);

        let pairs = value.as_map().unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].1, StructuredValue::Int(1));
        assert_eq!(pairs[1].1, StructuredValue::Int(2));
        assert_eq!(pairs[2].0.as_str(), Some("a"));
    }

    #[test]
    fn test_helpers() {
        let value = StructuredValue::map(vec![("key", StructuredValue::from(true))]);
        assert!(value.is_container());
        assert!(value.as_str().is_none());
        assert_eq!(value.as_map().unwrap()[0].0.as_str(), Some("key"));
    }
}
