//! Middleware stages for the web gateway.
//!
//! Layer order: Request -> RequestId -> Cors -> Timeout -> Subject -> Authorize -> Handler

pub mod authorize;
pub mod cors;
pub mod request_id;
pub mod subject;
pub mod timeout;

pub use authorize::{ActionRule, AuthorizeLayer};
pub use cors::{CorsLayer, CorsPolicy};
pub use request_id::RequestIdLayer;
pub use subject::{SubjectLayer, SubjectResolver};
pub use timeout::TimeoutLayer;
