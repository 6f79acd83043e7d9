//! Background Tasks Module
//!
//! Periodic work that runs alongside the server: one expiry sweep per cache
//! partition.

mod cleanup;

pub use cleanup::spawn_cleanup_task;
