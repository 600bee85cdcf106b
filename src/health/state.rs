//! Model readiness state machine.
//!
//! # States
//! - Initializing: model load in progress, traffic should wait
//! - Ready: model loaded, predictions are served
//! - Failed: model load errored, the instance will never become ready
//!
//! # State Transitions
//! ```text
//! Initializing → Ready:  load succeeded
//! Initializing → Failed: load errored
//! ```
//! Ready and Failed are terminal for the process lifetime.
//!
//! # Design Decisions
//! - Single atomic byte, readers never lock
//! - Transitions use compare-and-swap so only the first writer wins
//! - Injected into handlers rather than held in a global

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use thiserror::Error;

/// Readiness of the loaded model.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Initializing = 0,
    Ready = 1,
    Failed = 2,
}

impl Readiness {
    /// Stable lowercase name used in probe bodies and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Initializing => "initializing",
            Readiness::Ready => "ready",
            Readiness::Failed => "failed",
        }
    }
}

impl From<u8> for Readiness {
    fn from(val: u8) -> Self {
        match val {
            1 => Readiness::Ready,
            2 => Readiness::Failed,
            _ => Readiness::Initializing,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a transition is attempted after the state has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("readiness already settled as {current}")]
pub struct TransitionError {
    pub current: Readiness,
}

/// Write-once readiness cell.
#[derive(Debug)]
pub struct ReadinessState {
    state: AtomicU8,
}

impl ReadinessState {
    /// Create a cell in the Initializing state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(Readiness::Initializing as u8),
        }
    }

    /// Current value. Never blocks.
    pub fn get(&self) -> Readiness {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_ready(&self) -> bool {
        self.get() == Readiness::Ready
    }

    /// Initializing → Ready.
    pub fn mark_ready(&self) -> Result<(), TransitionError> {
        self.settle(Readiness::Ready)
    }

    /// Initializing → Failed.
    pub fn mark_failed(&self) -> Result<(), TransitionError> {
        self.settle(Readiness::Failed)
    }

    fn settle(&self, target: Readiness) -> Result<(), TransitionError> {
        self.state
            .compare_exchange(
                Readiness::Initializing as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| TransitionError {
                current: current.into(),
            })
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}
