use shared_types::CommandError;
use thiserror::Error;

/// Registration failures. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("provider name is empty")]
    EmptyName,

    #[error("provider {0} already registered")]
    Duplicate(String),

    #[error("init provider {name}: {source}")]
    Init {
        name: String,
        #[source]
        source: CommandError,
    },
}
