use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A serializable record of an operation call sufficient to replay it.
///
/// Descriptors live in the `refresh` hash of the shared store and must
/// survive a round trip through it. They are created by the registrar,
/// consumed (read, never mutated) by the refresher, and deleted on permanent
/// replay failure, on staleness, or when they fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshDescriptor {
    /// Identifier of the target the operation lives on.
    pub target: String,
    /// Name of the operation to replay.
    pub operation: String,
    /// Ordered parameter type identifiers.
    pub arg_types: Vec<String>,
    /// Ordered argument values.
    pub args: Vec<Value>,
    /// The full store key the cached value lives under.
    pub key: String,
    /// Entry TTL in seconds; non-positive means a non-expiring write.
    pub ttl: i64,
}

impl RefreshDescriptor {
    /// Two descriptors for the same key are considered equivalent when their
    /// TTLs match. Equivalence is the de-duplication criterion, not full
    /// structural equality: the key already encodes the arguments.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.ttl == other.ttl
    }
}
