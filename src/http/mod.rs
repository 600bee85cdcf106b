//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned or propagated)
//!     → observability::middleware (root span, correlation headers)
//!     → predict.rs | health::probes
//!     → response.rs (status mapping, error body)
//!     → Send to client
//! ```

pub mod predict;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, MakeRequestUuid, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{AppState, HttpServer};
