//! # Shared Types Crate
//!
//! Domain entities and port traits shared across the HostGate crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Subject`, `Action`, `Response` and the audit
//!   records are defined once here and consumed by every transport.
//! - **Ports, not implementations**: command providers, transports and the
//!   state store are traits; concrete adapters live in their own crates.
//! - **Append-only records**: `AuditEvent` and `MetricRecord` have no mutation
//!   API once constructed.

pub mod entities;
pub mod errors;
pub mod humantime_serde;
pub mod ports;
pub mod records;

pub use entities::*;
pub use errors::*;
pub use ports::*;
pub use records::*;

/// Generate a fresh request correlation id (32 lower-hex characters).
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
