//! Lifecycle state machine.
//!
//! ```text
//! create ──► Created ──configure──► Ready ◄──► run / get / set
//!               │                     │
//!               │                     └──fault──► Faulted
//!               └──────── release (from any state) ──────► Released
//! ```

use crate::error::{ComponentError, Result};
use std::fmt;

/// Observable states of a component handle.
///
/// A handle that was never created has no state; `Configured` is transient
/// and immediately becomes [`LifecycleState::Ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Ready,
    Faulted,
    Released,
}

/// Lifecycle operations, used for state checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Configure,
    Run,
    Get,
    Set,
    Release,
}

/// What an operation should do given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Invoke the component.
    Proceed,
    /// Return success without invoking the component.
    Skip,
}

impl LifecycleState {
    /// Decide whether `op` may run in this state.
    pub fn admit(self, op: Operation) -> Result<Admission> {
        use LifecycleState::*;
        use Operation::*;

        match (self, op) {
            (Released, _) => Err(ComponentError::UseAfterRelease),
            (_, Release) => Ok(Admission::Proceed),
            (Created, Configure) => Ok(Admission::Proceed),
            (Ready, Configure) => Ok(Admission::Skip),
            (Ready, Run | Get | Set) => Ok(Admission::Proceed),
            (Created, Run | Get | Set) | (Faulted, _) => {
                Err(ComponentError::invalid_state(op, self))
            }
        }
    }

    /// State code reported by `cpy_state`
    pub fn code(self) -> i32 {
        match self {
            LifecycleState::Created => 0,
            LifecycleState::Ready => 1,
            LifecycleState::Faulted => 2,
            LifecycleState::Released => 3,
        }
    }

    pub fn is_ready(self) -> bool {
        self == LifecycleState::Ready
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Created => "created",
            LifecycleState::Ready => "ready",
            LifecycleState::Faulted => "faulted",
            LifecycleState::Released => "released",
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Configure => "configure",
            Operation::Run => "run",
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Release => "release",
        })
    }
}
