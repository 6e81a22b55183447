//! Route handlers.
//!
//! Every handler answers with the uniform envelope
//! `{request_id, status, data}` (or the error body from [`ApiError`]) and
//! writes exactly one audit record per outcome, except for failures the
//! middleware already audited.

use crate::domain::context::RequestContext;
use crate::domain::error::{codes, json_response, ApiError};
use crate::service::GatewayState;
use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Extension,
};
use chrono::{DateTime, SecondsFormat, Utc};
use http_body_util::LengthLimitError;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{command_payload, Action, AuditEvent, AuditQuery, AuditStatus, CommandError};
use std::future::Future;
use std::time::Instant;
use tokio::time::timeout_at;
use tracing::{debug, warn};

pub const ACTION_ME: &str = "web:me";
pub const ACTION_MODULES: &str = "web:modules";
pub const ACTION_EXECUTE: &str = "web:execute";
pub const ACTION_METRICS_LATEST: &str = "web:metrics_latest";
pub const ACTION_AUDIT_QUERY: &str = "web:audit_query";

/// `POST /v1/commands/execute` body.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    pub module: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<String>,
}

/// Run `fut` against the request deadline; `None` means it expired.
async fn within_deadline<F: Future>(ctx: &RequestContext, fut: F) -> Option<F::Output> {
    match ctx.deadline {
        Some(deadline) => timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn ok_envelope(ctx: &RequestContext, data: Value) -> Response {
    json_response(
        StatusCode::OK,
        &ctx.request_id,
        &json!({
            "request_id": ctx.request_id,
            "status": "ok",
            "data": data,
        }),
    )
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn with_error_code(mut payload: Value, code: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("error_code".into(), Value::from(code));
    }
    payload
}

// =============================================================================
// Public
// =============================================================================

pub async fn health(Extension(ctx): Extension<RequestContext>) -> Response {
    json_response(StatusCode::OK, &ctx.request_id, &json!({ "status": "ok" }))
}

/// Catch-all for unknown paths behind the subject stage.
pub async fn not_found(Extension(ctx): Extension<RequestContext>) -> Response {
    ApiError::not_found(codes::NOT_FOUND).into_response(&ctx.request_id)
}

// =============================================================================
// Identity and discovery
// =============================================================================

pub async fn me(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(caller) = ctx.caller.as_ref() else {
        return ApiError::auth_required().into_response(&ctx.request_id);
    };
    let data = json!({
        "subject": caller.subject_id,
        "roles": caller.roles,
        "auth_method": caller.method.as_str(),
    });
    state
        .auditor
        .record(&ctx, ACTION_ME, AuditStatus::Ok, json!({}))
        .await;
    ok_envelope(&ctx, data)
}

pub async fn modules(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let names = state.registry.providers();
    state
        .auditor
        .record(&ctx, ACTION_MODULES, AuditStatus::Ok, json!({ "items": names.len() }))
        .await;
    ok_envelope(&ctx, json!(names))
}

// =============================================================================
// Command execution
// =============================================================================

/// Decode, authorize, rate-limit and run one command.
///
/// Authorization lives here rather than in a route stage because the action
/// comes from the body, which is read under the size cap first.
pub async fn execute(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<RequestContext>,
    body: Body,
) -> Response {
    let Some(caller) = ctx.caller.clone() else {
        return ApiError::auth_required().into_response(&ctx.request_id);
    };

    let bytes = match within_deadline(&ctx, to_bytes(body, state.config.max_body_bytes)).await {
        Some(Ok(bytes)) => bytes,
        Some(Err(err)) => {
            debug!(request_id = %ctx.request_id, error = %err, "Request body rejected");
            return decode_failure(&state, &ctx, body_error(&err)).await;
        }
        None => return decode_failure(&state, &ctx, ApiError::request_timeout()).await,
    };

    let request: ExecuteRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(_) => {
            return decode_failure(&state, &ctx, ApiError::bad_request(codes::INVALID_JSON)).await
        }
    };
    let module = request.module.trim();
    let command = request.command.trim();
    if module.is_empty() || command.is_empty() {
        return decode_failure(&state, &ctx, ApiError::bad_request(codes::BAD_COMMAND)).await;
    }

    let action = Action::new(module, command);
    let audit_action = action.to_string();
    let payload = command_payload(&action, &request.args);
    let subject = caller.subject();

    if let Err(err) = state.authorizer.authorize(&subject, &action) {
        warn!(
            request_id = %ctx.request_id,
            subject = %subject,
            action = %action,
            error = %err,
            "Command denied"
        );
        state
            .auditor
            .record(&ctx, &audit_action, AuditStatus::Denied, payload)
            .await;
        return ApiError::access_denied().into_response(&ctx.request_id);
    }

    if let Some(limiter) = &state.limiter {
        if !limiter.allow(&subject.limiter_key(), Instant::now()) {
            state
                .auditor
                .record(&ctx, &audit_action, AuditStatus::RateLimited, payload)
                .await;
            return ApiError::rate_limited().into_response(&ctx.request_id);
        }
    }

    let outcome = within_deadline(
        &ctx,
        state.registry.execute(module, command, &request.args),
    )
    .await;

    match outcome {
        None => {
            warn!(request_id = %ctx.request_id, action = %action, "Command timed out");
            state
                .auditor
                .record(
                    &ctx,
                    &audit_action,
                    AuditStatus::Error,
                    with_error_code(payload, codes::REQUEST_TIMEOUT),
                )
                .await;
            ApiError::request_timeout().into_response(&ctx.request_id)
        }
        Some(Err(err)) => command_failure(&state, &ctx, &audit_action, payload, err).await,
        Some(Ok(response)) => {
            let status = if response.is_error() {
                AuditStatus::Error
            } else {
                AuditStatus::Ok
            };
            let audit_payload = if response.is_error() {
                with_error_code(payload, &response.error_code)
            } else {
                payload
            };
            state
                .auditor
                .record(&ctx, &audit_action, status, audit_payload)
                .await;
            json_response(
                StatusCode::OK,
                &ctx.request_id,
                &json!({
                    "request_id": ctx.request_id,
                    "status": response.status.as_str(),
                    "data": response.data,
                    "error_code": response.error_code,
                }),
            )
        }
    }
}

/// Only an exceeded cap is `413`; any other read failure is a bad request.
fn body_error(err: &axum::Error) -> ApiError {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cause {
        if e.is::<LengthLimitError>() {
            return ApiError::payload_too_large();
        }
        cause = e.source();
    }
    ApiError::bad_request(codes::INVALID_JSON)
}

async fn decode_failure(state: &GatewayState, ctx: &RequestContext, err: ApiError) -> Response {
    state
        .auditor
        .record(
            ctx,
            ACTION_EXECUTE,
            AuditStatus::Error,
            json!({ "error_code": err.code }),
        )
        .await;
    err.into_response(&ctx.request_id)
}

async fn command_failure(
    state: &GatewayState,
    ctx: &RequestContext,
    audit_action: &str,
    payload: Value,
    err: CommandError,
) -> Response {
    let code = err.error_code().to_string();
    debug!(request_id = %ctx.request_id, code = %code, error = %err, "Command failed");
    state
        .auditor
        .record(ctx, audit_action, AuditStatus::Error, with_error_code(payload, &code))
        .await;
    json_response(
        StatusCode::BAD_REQUEST,
        &ctx.request_id,
        &json!({
            "request_id": ctx.request_id,
            "status": "error",
            "error_code": code,
            "message": err.to_string(),
        }),
    )
}

// =============================================================================
// Store reads
// =============================================================================

pub async fn latest_metric(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<MetricsParams>,
) -> Response {
    let module = params.module.unwrap_or_default().trim().to_string();
    if module.is_empty() {
        return ApiError::bad_request(codes::MODULE_REQUIRED).into_response(&ctx.request_id);
    }

    let outcome = within_deadline(&ctx, state.store.latest_metric(&module)).await;
    let (status, err) = match outcome {
        Some(Ok(Some(record))) => {
            state
                .auditor
                .record(&ctx, ACTION_METRICS_LATEST, AuditStatus::Ok, json!({ "module": module }))
                .await;
            return ok_envelope(
                &ctx,
                json!({
                    "module": record.module,
                    "ts": rfc3339(record.ts),
                    "payload": record.payload,
                }),
            );
        }
        Some(Ok(None)) => (AuditStatus::Error, ApiError::not_found(codes::METRIC_NOT_FOUND)),
        Some(Err(err)) => {
            warn!(request_id = %ctx.request_id, error = %err, "Metric read failed");
            (
                AuditStatus::Error,
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, codes::STORE_UNAVAILABLE),
            )
        }
        None => (AuditStatus::Error, ApiError::request_timeout()),
    };

    state
        .auditor
        .record(
            &ctx,
            ACTION_METRICS_LATEST,
            status,
            json!({ "module": module, "error_code": err.code }),
        )
        .await;
    err.into_response(&ctx.request_id)
}

/// Parse `?subject&from&to&limit`. Bad bounds are rejected; a bad limit
/// falls back to the default.
pub fn parse_audit_query(params: &AuditParams) -> Result<AuditQuery, ApiError> {
    let parse_bound = |raw: &Option<String>, code: &str| -> Result<Option<DateTime<Utc>>, ApiError> {
        match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|_| ApiError::bad_request(code)),
        }
    };

    let limit = params
        .limit
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));

    Ok(AuditQuery {
        subject: params
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        from: parse_bound(&params.from, codes::BAD_FROM)?,
        to: parse_bound(&params.to, codes::BAD_TO)?,
        limit,
    })
}

fn audit_item(event: &AuditEvent) -> Value {
    json!({
        "subject": event.subject,
        "action": event.action,
        "source": event.source,
        "status": event.status.as_str(),
        "request_id": event.request_id,
        "payload": event.payload,
        "ts": rfc3339(event.ts),
    })
}

pub async fn audit_query(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<AuditParams>,
) -> Response {
    let query = match parse_audit_query(&params) {
        Ok(query) => query,
        Err(err) => return err.into_response(&ctx.request_id),
    };

    let err = match within_deadline(&ctx, state.store.query_audit(query)).await {
        Some(Ok(events)) => {
            let items: Vec<Value> = events.iter().map(audit_item).collect();
            state
                .auditor
                .record(&ctx, ACTION_AUDIT_QUERY, AuditStatus::Ok, json!({ "items": items.len() }))
                .await;
            return ok_envelope(&ctx, Value::Array(items));
        }
        Some(Err(err)) => {
            warn!(request_id = %ctx.request_id, error = %err, "Audit query failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, codes::STORE_UNAVAILABLE)
        }
        None => ApiError::request_timeout(),
    };

    state
        .auditor
        .record(
            &ctx,
            ACTION_AUDIT_QUERY,
            AuditStatus::Error,
            json!({ "error_code": err.code }),
        )
        .await;
    err.into_response(&ctx.request_id)
}
