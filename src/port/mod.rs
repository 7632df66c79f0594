//! Port data model.
//!
//! A port is a named value of one of three primitive types. Components expose
//! their state exclusively through a [`PortTable`] of such ports.

pub mod table;
pub mod value;

pub use table::PortTable;
pub use value::{Port, PortType, PortValue};
