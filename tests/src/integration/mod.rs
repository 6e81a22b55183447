//! Cross-crate scenarios.

pub mod chat_pipeline;
pub mod web_gateway;
