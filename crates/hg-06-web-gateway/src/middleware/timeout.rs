//! Request deadline stage.
//!
//! Stamps `now + request_timeout` into the request context. Handlers race
//! their own work against that deadline so a timeout can be audited; the
//! stage itself only cuts off requests that overrun it by [`BACKSTOP_GRACE`].

use crate::domain::context::{request_id_of, update_context};
use crate::domain::error::ApiError;
use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tower::{Layer, Service};
use tracing::warn;

pub const BACKSTOP_GRACE: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct TimeoutLayer {
    request_timeout: Duration,
}

impl TimeoutLayer {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    request_timeout: Duration,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_timeout = self.request_timeout;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let deadline = Instant::now() + request_timeout;
            update_context(&mut req, |ctx| ctx.deadline = Some(deadline));
            let request_id = request_id_of(&req);

            match timeout_at(deadline + BACKSTOP_GRACE, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        request_id = %request_id,
                        timeout_ms = request_timeout.as_millis() as u64,
                        "Request overran its deadline"
                    );
                    Ok(ApiError::request_timeout().into_response(&request_id))
                }
            }
        })
    }
}
