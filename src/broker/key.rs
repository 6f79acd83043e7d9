//! Cache key derivation.

use crate::broker::Operation;
use crate::upstream::Params;

/// Prefix shared by every upstream response key.
pub const KEY_PREFIX: &str = "youtube";

/// Deterministic key: `youtube:{operation}:{sorted params as JSON}`.
///
/// `Params` is ordered, so insertion order never affects the key.
pub fn cache_key(operation: Operation, params: &Params) -> String {
    let encoded = serde_json::to_string(params).unwrap_or_default();
    format!("{}:{}:{}", KEY_PREFIX, operation.name(), encoded)
}
