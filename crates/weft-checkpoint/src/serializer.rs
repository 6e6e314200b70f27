//! Serialization protocol for checkpoint payloads

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Pluggable serialization strategy for checkpoint payloads
///
/// Savers that persist to external storage serialize through this protocol
/// so the wire format can be swapped without touching the storage logic.
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes.
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes.
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// Serialize to a JSON value.
    fn dumps_json<T: Serialize>(&self, value: &T) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(value)?)
    }

    /// Deserialize from a JSON value.
    fn loads_json<T: for<'de> Deserialize<'de>>(&self, value: &serde_json::Value) -> Result<T> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Default JSON serializer
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;

    #[test]
    fn json_roundtrip() {
        let serializer = JsonSerializer::new();
        let checkpoint = Checkpoint::empty();

        let bytes = serializer.dumps(&checkpoint).unwrap();
        let back: Checkpoint = serializer.loads(&bytes).unwrap();
        assert_eq!(back.id, checkpoint.id);

        let value = serializer.dumps_json(&checkpoint).unwrap();
        let back: Checkpoint = serializer.loads_json(&value).unwrap();
        assert_eq!(back.id, checkpoint.id);
    }
}
