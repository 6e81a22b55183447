//! # Module Registry (HG-01)
//!
//! Name -> provider map. Routes `(module, command, args)` to the provider
//! registered under `module` and passes its `Response`/error through
//! unchanged.
//!
//! ## Invariants
//!
//! - Registration is append-only: there is no unregister path.
//! - Names are unique and non-empty; a provider is initialized exactly once,
//!   before it becomes visible.
//! - The registry performs no authorization. Callers gate upstream.
//!
//! The registry is built mutably during startup and then shared behind an
//! `Arc`; after that it is read-only and needs no lock.

pub mod errors;
pub mod registry;

pub use errors::RegistryError;
pub use registry::ModuleRegistry;
