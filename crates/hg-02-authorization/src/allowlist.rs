use crate::{Authorizer, AuthzError};
use shared_types::{Action, Subject};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Static source -> allowed-ids table, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct AllowlistAuthorizer {
    allowed: HashMap<String, HashSet<String>>,
}

impl AllowlistAuthorizer {
    /// Build from `source -> [ids]`. Empty ids are dropped; a source with
    /// no remaining ids is still "recognized" but admits nobody.
    pub fn new<I, S, V, T>(src: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let allowed = src
            .into_iter()
            .map(|(source, ids)| {
                let ids = ids
                    .into_iter()
                    .map(Into::<String>::into)
                    .filter(|id| !id.is_empty())
                    .collect();
                (source.into(), ids)
            })
            .collect();
        Self { allowed }
    }

    /// Number of configured sources.
    pub fn source_count(&self) -> usize {
        self.allowed.len()
    }
}

impl Authorizer for AllowlistAuthorizer {
    fn authorize(&self, subject: &Subject, _action: &Action) -> Result<(), AuthzError> {
        if subject.source.is_empty() || subject.id.is_empty() {
            return Err(AuthzError::MalformedSubject);
        }
        let Some(ids) = self.allowed.get(&subject.source) else {
            debug!(source = %subject.source, "Unknown source");
            return Err(AuthzError::UnknownSource(subject.source.clone()));
        };
        if !ids.contains(&subject.id) {
            return Err(AuthzError::SubjectNotAllowed {
                source_name: subject.source.clone(),
                id: subject.id.clone(),
            });
        }
        Ok(())
    }
}
