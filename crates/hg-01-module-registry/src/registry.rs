use crate::errors::RegistryError;
use shared_types::{CommandError, CommandProvider, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of command providers keyed by module name.
#[derive(Default)]
pub struct ModuleRegistry {
    providers: HashMap<String, Arc<dyn CommandProvider>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize `provider` and insert it under its name.
    ///
    /// Fails on an empty or duplicate name, or when `init` fails; in every
    /// failure case the registry is left unchanged.
    pub async fn register(&mut self, provider: Arc<dyn CommandProvider>) -> Result<(), RegistryError> {
        let name = provider.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.providers.contains_key(&name) {
            warn!(module = %name, "[Registry] Duplicate module registration rejected");
            return Err(RegistryError::Duplicate(name));
        }

        provider
            .init()
            .await
            .map_err(|source| RegistryError::Init {
                name: name.clone(),
                source,
            })?;

        info!(module = %name, "[Registry] Registered module");
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Route a command to the named module.
    pub async fn execute(
        &self,
        module: &str,
        command: &str,
        args: &[String],
    ) -> Result<Response, CommandError> {
        let Some(provider) = self.providers.get(module) else {
            debug!(module, command, "[Registry] Module not found");
            return Err(CommandError::ModuleNotFound(module.to_string()));
        };
        provider.execute(command, args).await
    }

    /// Registered module names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, module: &str) -> bool {
        self.providers.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
