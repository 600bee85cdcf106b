//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Model load (model::store):
//!     → state.rs (Initializing → Ready | Failed)
//!
//! Probes (probes.rs):
//!     GET /live_check  → always alive
//!     GET /ready_check → state.rs snapshot
//! ```
//!
//! # Design Decisions
//! - Liveness never depends on the model
//! - Readiness is write-once per process
//! - A failed load keeps the process alive but permanently not ready

pub mod probes;
pub mod state;

pub use probes::{live_check, ready_check, ProbeStatus};
pub use state::{Readiness, ReadinessState, TransitionError};
