//! Gateway: the HTTP surface of the application.
//!
//! One port serves the provider webhook and a health probe. Request handling
//! is per-call and stateless; everything in the router state is immutable.

mod server;

pub use server::{run_gateway, WEBHOOK_PATH};
