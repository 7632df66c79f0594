//! Ordered port snapshots.

use crate::port::{Port, PortValue};
use serde::{Deserialize, Serialize};

/// An ordered sequence of ports with unique names.
///
/// Tables returned by `get` are fresh snapshots; mutating one has no effect on
/// the component until it is pushed back with `set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Port>", into = "Vec<Port>")]
pub struct PortTable {
    ports: Vec<Port>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ports: Vec::with_capacity(capacity),
        }
    }

    /// Append a port, or replace the value of an existing port with the same
    /// name (keeping its position).
    pub fn push(&mut self, port: Port) {
        match self.ports.iter_mut().find(|p| p.name == port.name) {
            Some(existing) => existing.value = port.value,
            None => self.ports.push(port),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name == name)
    }

    /// The value of port `name`, if present
    pub fn value(&self, name: &str) -> Option<PortValue> {
        self.get(name).map(|p| p.value)
    }

    /// Overwrite the value of an existing port. Returns false if no port has
    /// that name.
    pub fn set_value(&mut self, name: &str, value: impl Into<PortValue>) -> bool {
        match self.get_mut(name) {
            Some(port) => {
                port.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Port> {
        self.ports.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Port> {
        self.ports.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }

    pub fn as_slice(&self) -> &[Port] {
        &self.ports
    }
}

impl FromIterator<Port> for PortTable {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        let mut table = PortTable::new();
        for port in iter {
            table.push(port);
        }
        table
    }
}

/// Duplicate names collapse as with [`PortTable::push`]
impl From<Vec<Port>> for PortTable {
    fn from(ports: Vec<Port>) -> Self {
        ports.into_iter().collect()
    }
}

impl From<PortTable> for Vec<Port> {
    fn from(table: PortTable) -> Self {
        table.ports
    }
}

impl IntoIterator for PortTable {
    type Item = Port;
    type IntoIter = std::vec::IntoIter<Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.into_iter()
    }
}

impl<'a> IntoIterator for &'a PortTable {
    type Item = &'a Port;
    type IntoIter = std::slice::Iter<'a, Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.iter()
    }
}
