//! Tower middleware for the HTTP pipeline.
//!
//! # Middleware Order
//! When using `.layer()` on a router:
//! - Outermost layer is added last
//! - Request flows: outermost → innermost → handler
//! - Response flows: handler → innermost → outermost
//!
//! Order used by the router (outermost first):
//! 1. TraceIdLayer - Extract/generate the trace id first
//! 2. TraceLayer - Request span carrying the trace id
//! 3. MetricsLayer - Request count and latency
//! 4. CorsLayer - Preflight handling, headers on every response
//! 5. ErrorTranslatorLayer - Faults and raw errors into wire responses
//! 6. ResponseTransformLayer - Success envelope
//! 7. TimeoutLayer - Request timeout (408)
//! 8. CatchPanicLayer - Panics into internal faults
//! 9. AuthLayer - JWT authentication on matched routes only

pub mod auth;
pub mod metrics;
pub mod trace_id;
pub mod transform;
pub mod translator;

pub use auth::AuthLayer;
pub use metrics::MetricsLayer;
pub use trace_id::{TRACE_ID_HEADER, TraceId, TraceIdLayer};
pub use transform::ResponseTransformLayer;
pub use translator::{ErrorTranslatorLayer, FaultContext, FaultSink, TracingSink};
