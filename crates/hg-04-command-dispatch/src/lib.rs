//! # Command Dispatch (HG-04)
//!
//! The transport-agnostic pipeline shared by every text-command front-end:
//!
//! ```text
//! raw text -> parse -> authorize -> rate-limit -> execute -> audit
//! ```
//!
//! Each step is a hard gate. Exactly one audit record is written for every
//! command that parses, whichever gate it stops at.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): command parsing and the error taxonomy
//! - **Service Layer** (`service.rs`): the gated pipeline
//! - **Adapters** (`adapters/`): chat transports that feed raw text in

pub mod adapters;
pub mod domain;
pub mod service;

pub use adapters::chat::ChatTransport;
pub use domain::errors::{DispatchError, ParseError};
pub use domain::parser::{parse_text_command, ParsedCommand};
pub use service::DispatchService;
