//! Route authorization stage.
//!
//! Checks the resolved caller against the shared authorizer using an action
//! derived from the route. Denials are `403` and leave a `denied` audit
//! record under the route's audit action.

use crate::audit::Auditor;
use crate::domain::context::{request_id_of, RequestContext};
use crate::domain::error::ApiError;
use axum::{
    body::Body,
    extract::Query,
    http::Request,
    response::Response,
};
use hg_02_authorization::Authorizer;
use serde_json::{json, Map, Value};
use shared_types::{Action, AuditStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

/// How a route derives the action it authorizes.
#[derive(Debug, Clone)]
pub enum ActionRule {
    Fixed(Action),
    /// `(module from ?module=, command)`; requests without a module pass
    /// through so the handler can answer `module_required`.
    QueryModule(&'static str),
}

impl ActionRule {
    fn resolve<B>(&self, req: &Request<B>) -> Option<Action> {
        match self {
            Self::Fixed(action) => Some(action.clone()),
            Self::QueryModule(command) => {
                let module = Query::<HashMap<String, String>>::try_from_uri(req.uri())
                    .ok()
                    .and_then(|Query(params)| params.get("module").map(|m| m.trim().to_string()))
                    .unwrap_or_default();
                (!module.is_empty()).then(|| Action::new(module, *command))
            }
        }
    }

    fn denial_payload(&self, action: &Action) -> Value {
        match self {
            Self::Fixed(_) => Value::Object(Map::new()),
            Self::QueryModule(_) => json!({ "module": action.module }),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizeLayer {
    authorizer: Arc<dyn Authorizer>,
    auditor: Auditor,
    rule: ActionRule,
    audit_action: &'static str,
}

impl AuthorizeLayer {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        auditor: Auditor,
        rule: ActionRule,
        audit_action: &'static str,
    ) -> Self {
        Self {
            authorizer,
            auditor,
            rule,
            audit_action,
        }
    }
}

impl<S> Layer<S> for AuthorizeLayer {
    type Service = AuthorizeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizeService {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizeService<S> {
    inner: S,
    layer: AuthorizeLayer,
}

impl<S> Service<Request<Body>> for AuthorizeService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let layer = self.layer.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(ctx) = req.extensions().get::<RequestContext>().cloned() else {
                return Ok(ApiError::auth_required().into_response(&request_id_of(&req)));
            };
            let Some(caller) = ctx.caller.as_ref() else {
                return Ok(ApiError::auth_required().into_response(&ctx.request_id));
            };
            let Some(action) = layer.rule.resolve(&req) else {
                return inner.call(req).await;
            };

            let subject = caller.subject();
            if let Err(err) = layer.authorizer.authorize(&subject, &action) {
                warn!(
                    request_id = %ctx.request_id,
                    subject = %subject,
                    action = %action,
                    error = %err,
                    "Route access denied"
                );
                layer
                    .auditor
                    .record(
                        &ctx,
                        layer.audit_action,
                        AuditStatus::Denied,
                        layer.rule.denial_payload(&action),
                    )
                    .await;
                return Ok(ApiError::access_denied().into_response(&ctx.request_id));
            }

            inner.call(req).await
        })
    }
}
