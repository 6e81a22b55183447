use crate::{Authorizer, AuthzError};
use shared_types::{Action, Subject};
use std::sync::Arc;

/// Ordered conjunction of authorizers: the first denial wins.
#[derive(Clone, Default)]
pub struct AuthorizerChain {
    stages: Vec<Arc<dyn Authorizer>>,
}

impl AuthorizerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: Arc<dyn Authorizer>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Authorizer for AuthorizerChain {
    /// An empty chain denies: there is no implicit allow.
    fn authorize(&self, subject: &Subject, action: &Action) -> Result<(), AuthzError> {
        if self.stages.is_empty() {
            return Err(AuthzError::UnknownSource(subject.source.clone()));
        }
        for stage in &self.stages {
            stage.authorize(subject, action)?;
        }
        Ok(())
    }
}
