//! Request Broker Module
//!
//! Maps logical lookups onto cached upstream calls.

mod key;
mod operation;
mod service;

pub use key::{cache_key, KEY_PREFIX};
pub use operation::Operation;
pub use service::{Broker, BrokerResponse, BrokerStats, OperationPolicy, OperationStats};
