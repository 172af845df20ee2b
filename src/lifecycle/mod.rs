//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → Registry → Forwarder → Initial config load + publish → Router → Bind
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop config polling → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Fail fast: any startup error is fatal
//! - Listeners bind last (traffic only when a snapshot is live)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, Gateway, StartupError};
