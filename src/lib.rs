//! # portbridge: Script Components behind a C Port Table
//!
//! portbridge lets a host program drive components whose logic is written in
//! Rhai. Each component exposes a set of typed ports (`float`, `int`, `bool`)
//! and follows a fixed lifecycle: create, configure once, then any sequence
//! of run / get / set, then release.
//!
//! ## Architecture
//!
//! - **Component**: Lifecycle state machine over a [`component::ComponentBackend`]
//! - **Scripting**: Rhai backend, one engine per component
//! - **Host**: Configuration and compiled-module cache used to create components
//! - **FFI**: `extern "C"` surface with generation-checked handles (`include/cpy.h`)
//!
//! ## Configuration
//!
//! Engine limits and logging are read from `host.toml` (see [`config`]).
//!
//! ## Example
//!
//! ```no_run
//! use portbridge::{Host, PortValue};
//!
//! fn main() -> portbridge::Result<()> {
//!     let host = Host::from_default_config();
//!     let mut component = host.create("module.rhai", "module", "Abc")?;
//!
//!     component.configure()?;
//!     component.run()?;
//!
//!     let mut ports = component.get()?;
//!     if let Some(PortValue::Float(x)) = ports.value("x") {
//!         ports.set_value("x", x - 10.0);
//!     }
//!     component.set(&ports)?;
//!
//!     component.release();
//!     Ok(())
//! }
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod ffi;
pub mod host;
pub mod logging;
pub mod port;
pub mod scripting;

// Re-export commonly used types
pub use component::{Component, ComponentHandle, ComponentSource, ComponentStats, LifecycleState};
pub use config::HostConfig;
pub use error::{ComponentError, ErrorKind, Result, Status};
pub use host::Host;
pub use port::{Port, PortTable, PortType, PortValue};
