//! Backend trait for component implementations
//!
//! This module provides the seam between the lifecycle state machine and the
//! engine that actually executes component logic. The Rhai implementation lives
//! in [`crate::scripting`]; tests substitute a mock.

use crate::error::Result;
use crate::port::PortTable;

/// The executable side of a component.
///
/// Implementations do not track lifecycle state; [`super::Component`] only
/// calls these methods when the state machine admits the operation, and it
/// validates `set` tables before calling [`ComponentBackend::write_ports`].
#[cfg_attr(test, mockall::automock)]
pub trait ComponentBackend: Send {
    /// Check required structure and run one-time setup
    fn configure(&mut self) -> Result<()>;

    /// Advance the component by one step
    fn run(&mut self) -> Result<()>;

    /// Snapshot all current ports
    fn read_ports(&self) -> Result<PortTable>;

    /// Write every port in `table`. Names and types are already validated.
    fn write_ports(&mut self, table: &PortTable) -> Result<()>;

    /// Whether the underlying instance is still usable.
    ///
    /// Checked after every invocation; `false` faults the component.
    fn is_intact(&self) -> bool;
}
