//! Error handling for portbridge
//!
//! This module defines the error taxonomy of the component lifecycle protocol
//! and a Result alias for use throughout the crate. Every error maps to an
//! [`ErrorKind`], and every kind maps to a [`Status`] code at the C boundary.

use crate::component::{LifecycleState, Operation};
use crate::port::PortType;
use thiserror::Error;

/// Main error type for component operations
#[derive(Error, Debug)]
pub enum ComponentError {
    /// The component source could not be located, parsed, or instantiated
    #[error("Load failure: {0}")]
    Load(String),

    /// Required structure (ports, entry points) is missing
    #[error("Configuration failure: {0}")]
    Configuration(String),

    /// The component logic raised an error during `run`
    #[error("Execution failure: {0}")]
    Execution(String),

    /// Port descriptors could not be read
    #[error("Introspection failure: {0}")]
    Introspection(String),

    /// A value's tag does not match the declared port type
    #[error("Type mismatch on port '{port}': declared {expected}, got {actual}")]
    TypeMismatch {
        port: String,
        expected: PortType,
        actual: PortType,
    },

    /// A port name has no corresponding port
    #[error("Unknown port '{0}'")]
    UnknownPort(String),

    /// Operation called out of lifecycle order
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: Operation,
        state: LifecycleState,
    },

    /// The handle was already released
    #[error("Use after release")]
    UseAfterRelease,

    /// Malformed input at the C boundary
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Errors related to host configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ComponentError>,
    },
}

/// Classification of a [`ComponentError`], independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Load,
    Configuration,
    Execution,
    Introspection,
    TypeMismatch,
    UnknownPort,
    InvalidState,
    UseAfterRelease,
    InvalidArgument,
}

impl ComponentError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ComponentError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid-state error for `operation` attempted in `state`
    pub fn invalid_state(operation: Operation, state: LifecycleState) -> Self {
        ComponentError::InvalidState { operation, state }
    }

    /// The kind of this error, looking through context wrappers.
    ///
    /// Host configuration and IO problems only surface while loading a
    /// component, so they classify as [`ErrorKind::Load`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComponentError::Load(_) | ComponentError::Config(_) | ComponentError::Io(_) => {
                ErrorKind::Load
            }
            ComponentError::Configuration(_) => ErrorKind::Configuration,
            ComponentError::Execution(_) => ErrorKind::Execution,
            ComponentError::Introspection(_) => ErrorKind::Introspection,
            ComponentError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ComponentError::UnknownPort(_) => ErrorKind::UnknownPort,
            ComponentError::InvalidState { .. } => ErrorKind::InvalidState,
            ComponentError::UseAfterRelease => ErrorKind::UseAfterRelease,
            ComponentError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ComponentError::WithContext { source, .. } => source.kind(),
        }
    }

    /// The status code reported for this error at the C boundary
    pub fn status(&self) -> Status {
        Status::from(self.kind())
    }
}

/// Status codes returned by the `extern "C"` surface
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    LoadFailure = 1,
    ConfigurationFailure = 2,
    ExecutionFailure = 3,
    IntrospectionFailure = 4,
    TypeMismatch = 5,
    UnknownPort = 6,
    InvalidState = 7,
    UseAfterRelease = 8,
    InvalidArgument = 9,
}

impl Status {
    /// The raw code as seen by C callers
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Load => Status::LoadFailure,
            ErrorKind::Configuration => Status::ConfigurationFailure,
            ErrorKind::Execution => Status::ExecutionFailure,
            ErrorKind::Introspection => Status::IntrospectionFailure,
            ErrorKind::TypeMismatch => Status::TypeMismatch,
            ErrorKind::UnknownPort => Status::UnknownPort,
            ErrorKind::InvalidState => Status::InvalidState,
            ErrorKind::UseAfterRelease => Status::UseAfterRelease,
            ErrorKind::InvalidArgument => Status::InvalidArgument,
        }
    }
}

/// Result type alias for portbridge operations
pub type Result<T> = std::result::Result<T, ComponentError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
