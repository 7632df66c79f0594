//! Conversion between Rhai values and ports.
//!
//! An instance exposes its ports as an `outports` object map. Each entry is a
//! descriptor map:
//!
//! ```rhai
//! outports: #{
//!     x:       #{ "type": "float", "value": 1.0 },
//!     count:   #{ "type": "int",   "value": 0 },
//!     enabled: #{ "type": "bool",  "value": true },
//! }
//! ```

use crate::port::{Port, PortTable, PortType, PortValue};
use rhai::{Dynamic, Map, FLOAT, INT};

/// Property of the instance holding the port descriptors
pub const OUTPORTS: &str = "outports";

const TYPE_KEY: &str = "type";
const VALUE_KEY: &str = "value";

/// Convert a script value to a port value of type `ty`.
///
/// Float ports accept integers, widening them.
pub fn value_from_dynamic(ty: PortType, value: &Dynamic) -> Result<PortValue, String> {
    match ty {
        PortType::Float => {
            if let Ok(v) = value.as_float() {
                Ok(PortValue::Float(v))
            } else if let Ok(v) = value.as_int() {
                Ok(PortValue::Float(v as FLOAT))
            } else {
                Err(format!("expected a number, found {}", value.type_name()))
            }
        }
        PortType::Int => {
            let v = value
                .as_int()
                .map_err(|actual| format!("expected an integer, found {}", actual))?;
            isize::try_from(v).map(PortValue::Int).map_err(|_| {
                format!("integer {} does not fit in a pointer-width integer", v)
            })
        }
        PortType::Bool => value
            .as_bool()
            .map(PortValue::Bool)
            .map_err(|actual| format!("expected a bool, found {}", actual)),
    }
}

/// Convert a port value to the matching script value
pub fn value_to_dynamic(value: PortValue) -> Dynamic {
    match value {
        PortValue::Float(v) => Dynamic::from_float(v),
        PortValue::Int(v) => Dynamic::from_int(v as INT),
        PortValue::Bool(v) => Dynamic::from_bool(v),
    }
}

/// Read one descriptor map into a port
pub fn port_from_descriptor(name: &str, descriptor: &Dynamic) -> Result<Port, String> {
    let descriptor = descriptor
        .read_lock::<Map>()
        .ok_or_else(|| format!("port '{}' is not an object map", name))?;

    let ty = descriptor
        .get(TYPE_KEY)
        .ok_or_else(|| format!("port '{}' has no '{}'", name, TYPE_KEY))?
        .clone()
        .into_immutable_string()
        .map_err(|actual| format!("port '{}' type must be a string, found {}", name, actual))?;
    let ty: PortType = ty
        .as_str()
        .parse()
        .map_err(|e| format!("port '{}': {}", name, e))?;

    let value = descriptor
        .get(VALUE_KEY)
        .ok_or_else(|| format!("port '{}' has no '{}'", name, VALUE_KEY))?;
    let value = value_from_dynamic(ty, value).map_err(|e| format!("port '{}': {}", name, e))?;

    Ok(Port::new(name, value))
}

/// Snapshot every port of an instance, ordered by name
pub fn read_outports(instance: &Dynamic) -> Result<PortTable, String> {
    let map = instance
        .read_lock::<Map>()
        .ok_or_else(|| "instance is not an object map".to_string())?;
    let outports = map
        .get(OUTPORTS)
        .ok_or_else(|| format!("instance has no '{}'", OUTPORTS))?;
    let outports = outports
        .read_lock::<Map>()
        .ok_or_else(|| format!("'{}' is not an object map", OUTPORTS))?;

    let mut table = PortTable::with_capacity(outports.len());
    for (name, descriptor) in outports.iter() {
        table.push(port_from_descriptor(name.as_str(), descriptor)?);
    }
    Ok(table)
}

/// Write the value of every port in `table` into the instance descriptors
pub fn write_outports(instance: &mut Dynamic, table: &PortTable) -> Result<(), String> {
    let mut map = instance
        .write_lock::<Map>()
        .ok_or_else(|| "instance is not an object map".to_string())?;
    let outports = map
        .get_mut(OUTPORTS)
        .ok_or_else(|| format!("instance has no '{}'", OUTPORTS))?;
    let mut outports = outports
        .write_lock::<Map>()
        .ok_or_else(|| format!("'{}' is not an object map", OUTPORTS))?;

    for port in table {
        let descriptor = outports
            .get_mut(port.name.as_str())
            .ok_or_else(|| format!("unknown port '{}'", port.name))?;
        let mut descriptor = descriptor
            .write_lock::<Map>()
            .ok_or_else(|| format!("port '{}' is not an object map", port.name))?;
        descriptor.insert(VALUE_KEY.into(), value_to_dynamic(port.value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(script: &str) -> Dynamic {
        rhai::Engine::new().eval::<Dynamic>(script).unwrap()
    }

    #[test]
    fn test_read_outports_sorted_by_name() {
        let obj = instance(
            r#"#{ outports: #{
                z: #{ "type": "bool", "value": true },
                a: #{ "type": "int", "value": 7 },
                m: #{ "type": "float", "value": 2.5 },
            } }"#,
        );
        let table = read_outports(&obj).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "m", "z"]);
        assert_eq!(table.value("a"), Some(PortValue::Int(7)));
        assert_eq!(table.value("m"), Some(PortValue::Float(2.5)));
        assert_eq!(table.value("z"), Some(PortValue::Bool(true)));
    }

    #[test]
    fn test_float_port_widens_integer() {
        let obj = instance(r#"#{ outports: #{ x: #{ "type": "float", "value": 3 } } }"#);
        let table = read_outports(&obj).unwrap();
        assert_eq!(table.value("x"), Some(PortValue::Float(3.0)));
    }

    #[test]
    fn test_unreadable_descriptors() {
        let cases = [
            "42",
            "#{}",
            "#{ outports: [] }",
            r#"#{ outports: #{ x: 1.0 } }"#,
            r#"#{ outports: #{ x: #{ "value": 1.0 } } }"#,
            r#"#{ outports: #{ x: #{ "type": "double", "value": 1.0 } } }"#,
            r#"#{ outports: #{ x: #{ "type": "int", "value": 1.5 } } }"#,
            r#"#{ outports: #{ x: #{ "type": "bool" } } }"#,
        ];
        for case in cases {
            assert!(read_outports(&instance(case)).is_err(), "accepted {}", case);
        }
    }

    #[test]
    fn test_write_outports_replaces_values() {
        let mut obj = instance(
            r#"#{ outports: #{
                x: #{ "type": "float", "value": 11.0 },
                n: #{ "type": "int", "value": 1 },
            } }"#,
        );
        let table: PortTable = [Port::new("x", 1.0), Port::new("n", -4isize)]
            .into_iter()
            .collect();
        write_outports(&mut obj, &table).unwrap();

        let read = read_outports(&obj).unwrap();
        assert_eq!(read.value("x"), Some(PortValue::Float(1.0)));
        assert_eq!(read.value("n"), Some(PortValue::Int(-4)));
    }
}
