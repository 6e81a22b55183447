//! # HostGate Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── chat_pipeline.rs   # telegram/maxbot -> dispatch -> audit
//!     ├── web_gateway.rs     # HTTP contract of /v1 over a shared store
//!     └── runtime_wiring.rs  # config file -> App -> every front-end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hg-tests
//! cargo test -p hg-tests integration::web_gateway
//! ```

pub mod integration;
