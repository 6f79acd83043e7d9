//! API Module
//!
//! HTTP handlers, admission middleware and routing for the proxy.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{client_ip, PolicyGuard};
pub use routes::create_router;
