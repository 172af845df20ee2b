//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, request ID, tracing)
//!     → routing (first matching service/route in the live snapshot)
//!     → plugin chain of the matched service
//!     → forward.rs (pooled client call to the upstream)
//!     → response.rs (hop-by-hop stripping, error status mapping)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
