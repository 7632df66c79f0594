//! Thread-safe component handle.
//!
//! Operations on one handle are serialized by a per-handle mutex held for the
//! whole operation. Distinct handles share nothing and can be driven from
//! different threads at the same time. There are no timeouts: a component
//! step that never finishes blocks the calling thread (bounded in practice by
//! the engine's operation limit).

use crate::component::{Component, ComponentSource, ComponentStats, LifecycleState, Operation};
use crate::error::{ComponentError, Result};
use crate::port::PortTable;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

/// A shareable, explicitly released component.
///
/// After [`ComponentHandle::release`] every operation, including a second
/// release, fails with [`ComponentError::UseAfterRelease`].
pub struct ComponentHandle {
    source: ComponentSource,
    inner: Mutex<Option<Component>>,
}

impl ComponentHandle {
    pub fn new(component: Component) -> Self {
        Self {
            source: component.source().clone(),
            inner: Mutex::new(Some(component)),
        }
    }

    pub fn source(&self) -> &ComponentSource {
        &self.source
    }

    pub fn state(&self) -> LifecycleState {
        self.lock()
            .as_ref()
            .map(Component::state)
            .unwrap_or(LifecycleState::Released)
    }

    /// Run statistics, or `None` once released
    pub fn stats(&self) -> Option<ComponentStats> {
        self.lock().as_ref().map(|c| c.stats().clone())
    }

    pub fn configure(&self) -> Result<()> {
        self.with(Operation::Configure, Component::configure)
    }

    pub fn run(&self) -> Result<()> {
        self.with(Operation::Run, Component::run)
    }

    pub fn get(&self) -> Result<PortTable> {
        self.with(Operation::Get, Component::get)
    }

    pub fn set(&self, table: &PortTable) -> Result<()> {
        self.with(Operation::Set, |c| c.set(table))
    }

    /// Free the component now. Waits for an in-flight operation to finish.
    pub fn release(&self) -> Result<()> {
        let component = self.lock().take();
        match component {
            Some(component) => {
                component.release();
                Ok(())
            }
            None => {
                tracing::error!("Component {} released twice", self.source);
                Err(ComponentError::UseAfterRelease)
            }
        }
    }

    /// Lock the handle. A poisoned lock means an operation panicked while
    /// holding it, which faults the component.
    fn lock(&self) -> MutexGuard<'_, Option<Component>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                if let Some(component) = guard.as_mut() {
                    component.fault("handle lock poisoned");
                }
                self.inner.clear_poison();
                guard
            }
        }
    }

    /// Run `f` on the component under the handle lock, converting a panic
    /// into a fault.
    fn with<T, F>(&self, op: Operation, f: F) -> Result<T>
    where
        F: FnOnce(&mut Component) -> Result<T>,
    {
        let mut guard = self.lock();
        let component = guard.as_mut().ok_or_else(|| {
            tracing::error!("Component {} used after release ({})", self.source, op);
            ComponentError::UseAfterRelease
        })?;

        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *component))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                component.fault(&format!("panic during {}: {}", op, message));
                Err(ComponentError::Execution(format!(
                    "panic during {}: {}",
                    op, message
                )))
            }
        }
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("source", &self.source)
            .field("state", &self.state())
            .finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
