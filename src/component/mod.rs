//! Component handles and the lifecycle protocol.
//!
//! A [`Component`] binds a [`ComponentSource`] to a [`ComponentBackend`] and
//! enforces the lifecycle: `configure` once, then any sequence of `run`, `get`
//! and `set`, then release. [`ComponentHandle`] wraps a component for shared,
//! thread-safe use and tracks release explicitly.
//!
//! # Decisions
//!
//! - `configure` is idempotent: a second call in `Ready` succeeds without
//!   invoking the backend again.
//! - `set` is all-or-nothing: every port is checked against the current
//!   snapshot before anything is written.
//! - A failed `run` leaves the component `Ready`. Only a backend that reports
//!   itself no longer intact (or a panic caught by [`ComponentHandle`]) moves it
//!   to `Faulted`.
//! - A failed `configure` leaves the component `Created`, even when the
//!   backend is no longer intact.

pub mod backend;
pub mod handle;
pub mod state;
pub mod stats;

pub use backend::ComponentBackend;
pub use handle::ComponentHandle;
pub use state::{Admission, LifecycleState, Operation};
pub use stats::ComponentStats;

use crate::error::{ComponentError, Result};
use crate::port::PortTable;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Where a component's logic is loaded from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentSource {
    /// Path of the script file
    pub file_name: PathBuf,
    /// Module identifier the script is registered under
    pub module_name: String,
    /// Entry point instantiated from the module
    pub class_name: String,
}

impl ComponentSource {
    pub fn new(
        file_name: impl Into<PathBuf>,
        module_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            module_name: module_name.into(),
            class_name: class_name.into(),
        }
    }
}

impl fmt::Display for ComponentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} ({})",
            self.module_name,
            self.class_name,
            self.file_name.display()
        )
    }
}

/// A created component and its lifecycle state
pub struct Component {
    source: ComponentSource,
    backend: Box<dyn ComponentBackend>,
    state: LifecycleState,
    stats: ComponentStats,
}

impl Component {
    /// Wrap an instantiated backend. The component starts in `Created`.
    pub fn new(source: ComponentSource, backend: Box<dyn ComponentBackend>) -> Self {
        tracing::debug!("Component {} created", source);
        Self {
            source,
            backend,
            state: LifecycleState::Created,
            stats: ComponentStats::default(),
        }
    }

    pub fn source(&self) -> &ComponentSource {
        &self.source
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stats(&self) -> &ComponentStats {
        &self.stats
    }

    /// Establish the preconditions for `run`
    pub fn configure(&mut self) -> Result<()> {
        if self.admit(Operation::Configure)? == Admission::Skip {
            tracing::debug!("Component {} already configured", self.source);
            return Ok(());
        }

        self.backend.configure()?;
        if !self.backend.is_intact() {
            let e = ComponentError::Configuration(
                "instance no longer usable after configure".to_string(),
            );
            tracing::warn!("Component {} stays created: {}", self.source, e);
            return Err(e);
        }

        self.state = LifecycleState::Ready;
        tracing::debug!("Component {} ready", self.source);
        Ok(())
    }

    /// Advance the component by one step
    pub fn run(&mut self) -> Result<()> {
        self.admit(Operation::Run)?;

        let started = Instant::now();
        let result = self.backend.run();
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        match &result {
            Ok(()) => self.stats.record_success(elapsed_us),
            Err(e) => {
                self.stats.record_failure();
                tracing::warn!("Component {} run failed: {}", self.source, e);
            }
        }

        self.check_intact(Operation::Run, result)
    }

    /// Snapshot all current ports
    pub fn get(&mut self) -> Result<PortTable> {
        self.admit(Operation::Get)?;

        let result = self.backend.read_ports();
        let table = self.check_intact(Operation::Get, result)?;
        tracing::trace!("Component {} ports: {:?}", self.source, table);
        Ok(table)
    }

    /// Push port values back into the component.
    ///
    /// Rejected tables leave the component untouched.
    pub fn set(&mut self, table: &PortTable) -> Result<()> {
        self.admit(Operation::Set)?;

        let declared = self.backend.read_ports();
        let declared = self.check_intact(Operation::Set, declared)?;
        if let Err(e) = validate_against(&declared, table) {
            tracing::warn!("Component {} rejected set: {}", self.source, e);
            return Err(e);
        }

        let result = self.backend.write_ports(table);
        self.check_intact(Operation::Set, result)
    }

    /// Release the component and everything it owns
    pub fn release(self) {
        drop(self);
    }

    /// Move to `Faulted`; every further operation except release fails
    pub(crate) fn fault(&mut self, reason: &str) {
        if self.state != LifecycleState::Faulted {
            tracing::error!("Component {} faulted: {}", self.source, reason);
            self.state = LifecycleState::Faulted;
        }
    }

    fn admit(&self, op: Operation) -> Result<Admission> {
        self.state.admit(op).inspect_err(|e| {
            tracing::warn!("Component {} rejected {}: {}", self.source, op, e);
        })
    }

    /// Fault the component if the backend is no longer intact. The original
    /// error is kept when there is one.
    fn check_intact<T>(&mut self, op: Operation, result: Result<T>) -> Result<T> {
        if self.backend.is_intact() {
            return result;
        }

        self.fault(&format!("instance corrupted during {}", op));
        match result {
            Err(e) => Err(e),
            Ok(_) => Err(ComponentError::Execution(format!(
                "instance no longer usable after {}",
                op
            ))),
        }
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        tracing::debug!(
            "Component {} released after {} runs ({} failed, avg {:.1} us)",
            self.source,
            self.stats.runs,
            self.stats.failed_runs,
            self.stats.avg_run_time_us()
        );
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Check every port of `table` against the `declared` snapshot
fn validate_against(declared: &PortTable, table: &PortTable) -> Result<()> {
    for port in table {
        let current = declared
            .get(&port.name)
            .ok_or_else(|| ComponentError::UnknownPort(port.name.clone()))?;

        if current.port_type() != port.port_type() {
            return Err(ComponentError::TypeMismatch {
                port: port.name.clone(),
                expected: current.port_type(),
                actual: port.port_type(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::backend::MockComponentBackend;
    use super::*;
    use crate::error::ErrorKind;
    use crate::port::{Port, PortValue};

    fn source() -> ComponentSource {
        ComponentSource::new("module.rhai", "module", "Abc")
    }

    fn ports(x: f64) -> PortTable {
        [Port::new("x", x), Port::new("on", true)]
            .into_iter()
            .collect()
    }

    fn intact_mock() -> MockComponentBackend {
        let mut mock = MockComponentBackend::new();
        mock.expect_is_intact().return_const(true);
        mock
    }

    fn ready_component(mut mock: MockComponentBackend) -> Component {
        mock.expect_configure().times(1).returning(|| Ok(()));
        let mut component = Component::new(source(), Box::new(mock));
        component.configure().unwrap();
        component
    }

    #[test]
    fn test_run_before_configure_stays_created() {
        let mut mock = intact_mock();
        mock.expect_run().never();
        let mut component = Component::new(source(), Box::new(mock));

        let err = component.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(component.state(), LifecycleState::Created);
    }

    #[test]
    fn test_configure_is_idempotent() {
        let mut component = ready_component(intact_mock());
        assert_eq!(component.state(), LifecycleState::Ready);

        // The mock's `times(1)` fails the test if the backend is called again
        component.configure().unwrap();
        assert_eq!(component.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_failed_configure_stays_created() {
        let mut mock = intact_mock();
        mock.expect_configure()
            .returning(|| Err(ComponentError::Configuration("no run".to_string())));
        let mut component = Component::new(source(), Box::new(mock));

        let err = component.configure().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(component.state(), LifecycleState::Created);
    }

    #[test]
    fn test_corrupting_configure_stays_created() {
        let mut mock = MockComponentBackend::new();
        mock.expect_configure().times(2).returning(|| Ok(()));
        mock.expect_is_intact().return_const(false);
        let mut component = Component::new(source(), Box::new(mock));

        for _ in 0..2 {
            let err = component.configure().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert_eq!(component.state(), LifecycleState::Created);
        }
        assert_eq!(component.run().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_failed_run_stays_ready() {
        let mut mock = intact_mock();
        mock.expect_run()
            .times(2)
            .returning(|| Err(ComponentError::Execution("thrown".to_string())));
        let mut component = ready_component(mock);

        assert_eq!(component.run().unwrap_err().kind(), ErrorKind::Execution);
        assert_eq!(component.run().unwrap_err().kind(), ErrorKind::Execution);
        assert_eq!(component.state(), LifecycleState::Ready);
        assert_eq!(component.stats().failed_runs, 2);
    }

    #[test]
    fn test_corrupted_run_faults() {
        let mut mock = MockComponentBackend::new();
        mock.expect_configure().returning(|| Ok(()));
        mock.expect_run().returning(|| Ok(()));
        let mut intact = true;
        mock.expect_is_intact().returning(move || {
            // Intact through configure, corrupted by the first run
            let was = intact;
            intact = false;
            was
        });
        mock.expect_read_ports().never();

        let mut component = Component::new(source(), Box::new(mock));
        component.configure().unwrap();

        let err = component.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(component.state(), LifecycleState::Faulted);

        assert_eq!(component.get().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(component.run().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            component.configure().unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_set_unknown_port_is_rejected_without_write() {
        let mut mock = intact_mock();
        mock.expect_read_ports().returning(|| Ok(ports(1.0)));
        mock.expect_write_ports().never();
        let mut component = ready_component(mock);

        let table: PortTable = [Port::new("x", 2.0), Port::new("ghost", 1.0)]
            .into_iter()
            .collect();
        let err = component.set(&table).unwrap_err();
        assert!(matches!(err, ComponentError::UnknownPort(ref n) if n == "ghost"));
        assert_eq!(component.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_set_type_mismatch_is_rejected_without_write() {
        let mut mock = intact_mock();
        mock.expect_read_ports().returning(|| Ok(ports(1.0)));
        mock.expect_write_ports().never();
        let mut component = ready_component(mock);

        let table: PortTable = [Port::new("x", 2.0), Port::new("on", 1isize)]
            .into_iter()
            .collect();
        let err = component.set(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_set_valid_table_is_written() {
        let mut mock = intact_mock();
        mock.expect_read_ports().returning(|| Ok(ports(11.0)));
        mock.expect_write_ports()
            .withf(|t| t.value("x") == Some(PortValue::Float(1.0)))
            .times(1)
            .returning(|_| Ok(()));
        let mut component = ready_component(mock);

        let mut table = component.get().unwrap();
        table.set_value("x", 1.0);
        component.set(&table).unwrap();
    }

    #[test]
    fn test_get_failure_is_introspection() {
        let mut mock = intact_mock();
        mock.expect_read_ports()
            .returning(|| Err(ComponentError::Introspection("no outports".to_string())));
        let mut component = ready_component(mock);

        assert_eq!(
            component.get().unwrap_err().kind(),
            ErrorKind::Introspection
        );
        assert_eq!(component.state(), LifecycleState::Ready);
    }
}
