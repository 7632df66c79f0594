//! C layout of ports and the owned buffers handed to C callers

use crate::error::{ComponentError, Result};
use crate::port::{Port, PortTable, PortType, PortValue};
use std::ffi::{c_char, c_int, CStr, CString};

/// `CPyPortValue`. Which member is meaningful is given by [`RawPort::type_`].
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawPortValue {
    pub d: f64,
    pub i: isize,
    pub b: bool,
    /// Storage of `b`, read instead of it so any byte C wrote is accepted
    raw_byte: u8,
}

/// `CPyPort`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawPort {
    pub name: *const c_char,
    pub type_: c_int,
    pub value: RawPortValue,
}

impl RawPortValue {
    pub fn new(value: PortValue) -> Self {
        match value {
            PortValue::Float(d) => RawPortValue { d },
            PortValue::Int(i) => RawPortValue { i },
            PortValue::Bool(b) => RawPortValue { b },
        }
    }
}

impl RawPort {
    /// Read a port written by C.
    ///
    /// # Safety
    ///
    /// `name` must be null or point to a nul-terminated string that stays
    /// valid for the duration of the call.
    pub unsafe fn to_port(&self) -> Result<Port> {
        if self.name.is_null() {
            return Err(ComponentError::InvalidArgument(
                "port name is null".to_string(),
            ));
        }
        let name = CStr::from_ptr(self.name).to_str().map_err(|_| {
            ComponentError::InvalidArgument("port name is not valid UTF-8".to_string())
        })?;

        let ty = PortType::from_raw(self.type_).ok_or_else(|| {
            ComponentError::InvalidArgument(format!(
                "port '{}' has unknown type {}",
                name, self.type_
            ))
        })?;

        let value = match ty {
            PortType::Float => PortValue::Float(self.value.d),
            PortType::Int => PortValue::Int(self.value.i),
            PortType::Bool => PortValue::Bool(self.value.raw_byte != 0),
        };
        Ok(Port::new(name, value))
    }
}

impl std::fmt::Debug for RawPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPort")
            .field("name", &self.name)
            .field("type_", &self.type_)
            .finish_non_exhaustive()
    }
}

/// Read `len` ports from a C array.
///
/// # Safety
///
/// `ports` must point to `len` initialized ports (it may be null when `len`
/// is 0), each satisfying [`RawPort::to_port`].
pub unsafe fn table_from_raw(ports: *const RawPort, len: usize) -> Result<PortTable> {
    if len == 0 {
        return Ok(PortTable::new());
    }
    if ports.is_null() {
        return Err(ComponentError::InvalidArgument(format!(
            "null port array with length {}",
            len
        )));
    }

    std::slice::from_raw_parts(ports, len)
        .iter()
        .map(|raw| raw.to_port())
        .collect()
}

/// A port table laid out for C, owning the array and the name strings.
///
/// C may write values through the array pointer until the lease is dropped.
pub struct PortLease {
    ports: *mut RawPort,
    len: usize,
    _names: Vec<CString>,
}

// The lease exclusively owns the array and the strings it points into
unsafe impl Send for PortLease {}

impl PortLease {
    /// Lay out `table` for C. Returns `None` for an empty table.
    pub fn new(table: &PortTable) -> Result<Option<Self>> {
        if table.is_empty() {
            return Ok(None);
        }

        let names = table
            .iter()
            .map(|port| {
                CString::new(port.name.as_str()).map_err(|_| {
                    ComponentError::Introspection(format!(
                        "port name {:?} contains a nul byte",
                        port.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ports: Box<[RawPort]> = table
            .iter()
            .zip(&names)
            .map(|(port, name)| RawPort {
                name: name.as_ptr(),
                type_: port.port_type().to_raw(),
                value: RawPortValue::new(port.value),
            })
            .collect();

        let len = ports.len();
        Ok(Some(Self {
            ports: Box::into_raw(ports) as *mut RawPort,
            len,
            _names: names,
        }))
    }

    pub fn as_ptr(&self) -> *mut RawPort {
        self.ports
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        // SAFETY: `ports` came from `Box::into_raw` of a slice of `len` ports
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.ports, self.len,
            )));
        }
    }
}

impl std::fmt::Debug for PortLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortLease")
            .field("ports", &self.ports)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PortTable {
        [
            Port::new("enabled", true),
            Port::new("count", 7isize),
            Port::new("x", 1.5),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_lease_reads_back() {
        let lease = PortLease::new(&table()).unwrap().unwrap();
        assert_eq!(lease.len(), 3);

        let read = unsafe { table_from_raw(lease.as_ptr(), lease.len()) }.unwrap();
        assert_eq!(read, table());
    }

    #[test]
    fn test_lease_values_are_writable() {
        let lease = PortLease::new(&table()).unwrap().unwrap();
        unsafe {
            let ports = std::slice::from_raw_parts_mut(lease.as_ptr(), lease.len());
            ports[2].value.d -= 10.0;
        }
        let read = unsafe { table_from_raw(lease.as_ptr(), lease.len()) }.unwrap();
        assert_eq!(read.value("x"), Some(PortValue::Float(-8.5)));
    }

    #[test]
    fn test_empty_table_has_no_lease() {
        assert!(PortLease::new(&PortTable::new()).unwrap().is_none());
        assert!(unsafe { table_from_raw(std::ptr::null(), 0) }
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_malformed_raw_ports() {
        let name = CString::new("x").unwrap();
        let mut raw = RawPort {
            name: name.as_ptr(),
            type_: 7,
            value: RawPortValue { d: 1.0 },
        };
        let err = unsafe { raw.to_port() }.unwrap_err();
        assert!(matches!(err, ComponentError::InvalidArgument(_)));

        raw.type_ = PortType::Float.to_raw();
        raw.name = std::ptr::null();
        assert!(unsafe { raw.to_port() }.is_err());

        assert!(unsafe { table_from_raw(std::ptr::null(), 2) }.is_err());
    }

    #[test]
    fn test_bool_reads_any_nonzero_byte() {
        let name = CString::new("on").unwrap();
        let mut value = RawPortValue { i: 0 };
        value.raw_byte = 2;
        let raw = RawPort {
            name: name.as_ptr(),
            type_: PortType::Bool.to_raw(),
            value,
        };
        assert_eq!(
            unsafe { raw.to_port() }.unwrap().value,
            PortValue::Bool(true)
        );
    }
}
