//! Port values: the unit of data exchanged with a component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared type of a port.
///
/// Closed set; the discriminants are the values used at the C boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// 64-bit IEEE double
    Float = 0,
    /// Pointer-width signed integer
    Int = 1,
    Bool = 2,
}

impl PortType {
    /// All port types, in discriminant order
    pub const ALL: [PortType; 3] = [PortType::Float, PortType::Int, PortType::Bool];

    /// The spelling used in component scripts
    pub fn as_str(self) -> &'static str {
        match self {
            PortType::Float => "float",
            PortType::Int => "int",
            PortType::Bool => "bool",
        }
    }

    /// Look up a type by its C discriminant
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(PortType::Float),
            1 => Some(PortType::Int),
            2 => Some(PortType::Bool),
            _ => None,
        }
    }

    /// The C discriminant of this type
    pub fn to_raw(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(PortType::Float),
            "int" => Ok(PortType::Int),
            "bool" => Ok(PortType::Bool),
            other => Err(format!("unknown port type '{}'", other)),
        }
    }
}

/// A typed port value.
///
/// Serializes as `{"type": "float", "value": 1.0}`, the same shape component
/// scripts use for their port descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PortValue {
    Float(f64),
    Int(isize),
    Bool(bool),
}

impl PortValue {
    /// The type tag of this value
    pub fn port_type(&self) -> PortType {
        match self {
            PortValue::Float(_) => PortType::Float,
            PortValue::Int(_) => PortType::Int,
            PortValue::Bool(_) => PortType::Bool,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PortValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<isize> {
        match self {
            PortValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PortValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Float(v) => write!(f, "{}", v),
            PortValue::Int(v) => write!(f, "{}", v),
            PortValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for PortValue {
    fn from(v: f64) -> Self {
        PortValue::Float(v)
    }
}

impl From<isize> for PortValue {
    fn from(v: isize) -> Self {
        PortValue::Int(v)
    }
}

impl From<bool> for PortValue {
    fn from(v: bool) -> Self {
        PortValue::Bool(v)
    }
}

/// A named, typed value exchanged between caller and component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(flatten)]
    pub value: PortValue,
}

impl Port {
    pub fn new(name: impl Into<String>, value: impl Into<PortValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The declared type of this port
    pub fn port_type(&self) -> PortType {
        self.value.port_type()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.name, self.port_type(), self.value)
    }
}
