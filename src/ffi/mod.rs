//! C interface
//!
//! Exposes the component lifecycle to C through opaque handles (see
//! `include/cpy.h`). Every function returns a [`Status`] code or a
//! null/sentinel value and records the outcome in a per-thread error channel
//! read with [`cpy_last_error_code`] and [`cpy_last_error_message`]. No panic
//! crosses the boundary.
//!
//! All handles live in one process-wide [`Host`], built on first use from
//! [`HostConfig::locate`]. Building it also installs the log subscriber.

pub mod raw;
pub mod registry;

pub use raw::{PortLease, RawPort, RawPortValue};
pub use registry::{HandleRegistry, Token};

use crate::component::handle::panic_message;
use crate::component::{ComponentHandle, LifecycleState};
use crate::config::HostConfig;
use crate::error::{ComponentError, Result, Status};
use crate::host::Host;
use crate::logging;
use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

struct Runtime {
    host: Host,
    registry: Mutex<HandleRegistry>,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let located = HostConfig::locate();
        let loaded = located.as_deref().map(HostConfig::load);
        let config = match &loaded {
            Some(Ok(config)) => config.clone(),
            _ => HostConfig::default(),
        };

        logging::init(&config.logging);
        match (&located, &loaded) {
            (Some(path), Some(Ok(_))) => {
                tracing::debug!("Host config loaded from {}", path.display())
            }
            (_, Some(Err(e))) => tracing::warn!("Failed to load host config, using defaults: {}", e),
            _ => tracing::debug!("No host config found, using defaults"),
        }

        Runtime {
            host: Host::new(config),
            registry: Mutex::new(HandleRegistry::new()),
        }
    })
}

fn registry() -> MutexGuard<'static, HandleRegistry> {
    runtime()
        .registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

thread_local! {
    static LAST_ERROR: RefCell<Option<(Status, CString)>> = const { RefCell::new(None) };
}

fn record<T>(result: &Result<T>) {
    let last = result.as_ref().err().map(|e| {
        let message = CString::new(e.to_string().replace('\0', " ")).unwrap_or_default();
        (e.status(), message)
    });
    LAST_ERROR.with(|slot| *slot.borrow_mut() = last);
}

/// Run one C call: catch panics and record the outcome
fn call<T>(name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!("Panic in {}: {}", name, message);
        Err(ComponentError::Execution(format!(
            "panic in {}: {}",
            name, message
        )))
    });
    if let Err(e) = &result {
        tracing::debug!("{} failed: {}", name, e);
    }
    record(&result);
    result
}

fn status_of(result: Result<()>) -> c_int {
    match result {
        Ok(()) => Status::Ok.code(),
        Err(e) => e.status().code(),
    }
}

fn token_of(handle: *mut c_void) -> Result<Token> {
    if handle.is_null() {
        return Err(ComponentError::InvalidArgument("null handle".to_string()));
    }
    Ok(handle as Token)
}

/// Look up a handle; the registry lock is released before the handle is used
fn lookup(handle: *mut c_void) -> Result<Arc<ComponentHandle>> {
    let token = token_of(handle)?;
    registry().get(token)
}

/// # Safety
///
/// `ptr` must be null or point to a nul-terminated string.
unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(ComponentError::InvalidArgument(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| ComponentError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

/// Create a component from `file_name`, registered as `module_name`, using the
/// class `class_name`. Returns null on failure.
///
/// # Safety
///
/// Each argument must be null or a nul-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cpy_new(
    file_name: *const c_char,
    module_name: *const c_char,
    class_name: *const c_char,
) -> *mut c_void {
    call("cpy_new", || {
        let file_name = str_arg(file_name, "file_name")?;
        let module_name = str_arg(module_name, "module_name")?;
        let class_name = str_arg(class_name, "class_name")?;

        let handle = runtime()
            .host
            .create_handle(file_name, module_name, class_name)?;
        let token = registry().insert(Arc::new(handle))?;
        Ok(token as *mut c_void)
    })
    .unwrap_or(ptr::null_mut())
}

/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`].
#[no_mangle]
pub unsafe extern "C" fn cpy_configure(handle: *mut c_void) -> c_int {
    status_of(call("cpy_configure", || lookup(handle)?.configure()))
}

/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`].
#[no_mangle]
pub unsafe extern "C" fn cpy_run(handle: *mut c_void) -> c_int {
    status_of(call("cpy_run", || lookup(handle)?.run()))
}

/// Snapshot the ports of `handle` into a new array.
///
/// The array stays owned by the handle and is valid until
/// [`cpy_free_ports`], the next `cpy_get` on the same handle, or
/// [`cpy_release`]. An empty table yields a null array of length 0. The
/// out-parameters are written only on success.
///
/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`]; `ports` and
/// `num` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cpy_get(
    handle: *mut c_void,
    ports: *mut *mut RawPort,
    num: *mut usize,
) -> c_int {
    status_of(call("cpy_get", || {
        if ports.is_null() || num.is_null() {
            return Err(ComponentError::InvalidArgument(
                "null output pointer".to_string(),
            ));
        }
        let token = token_of(handle)?;
        let component = registry().get(token)?;

        let table = component.get()?;
        let lease = PortLease::new(&table)?;
        let (array, len) = registry().install_lease(token, lease)?;

        *ports = array;
        *num = len;
        Ok(())
    }))
}

/// Write `num` ports back into `handle`. Nothing is written unless every
/// port names an existing port of the same type. The caller keeps ownership
/// of the array.
///
/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`]; `ports` must
/// point to `num` initialized ports whose names are nul-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn cpy_set(
    handle: *mut c_void,
    ports: *const RawPort,
    num: usize,
) -> c_int {
    status_of(call("cpy_set", || {
        let component = lookup(handle)?;
        let table = raw::table_from_raw(ports, num)?;
        component.set(&table)
    }))
}

/// Free an array returned by [`cpy_get`] early. Null is ignored; any other
/// pointer that is not a live array is logged and ignored.
///
/// Arrays are matched by address, so a stale pointer is only recognized while
/// its address is not reused by a later [`cpy_get`].
///
/// # Safety
///
/// The pointer is compared, never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn cpy_free_ports(ports: *mut RawPort) {
    let _ = call("cpy_free_ports", || {
        if ports.is_null() || registry().release_lease(ports) {
            return Ok(());
        }
        tracing::warn!("cpy_free_ports: {:p} is not a live port array", ports);
        Err(ComponentError::InvalidArgument(format!(
            "{:p} is not a live port array",
            ports
        )))
    });
}

/// Release `handle` and everything it owns. Waits for an operation running
/// on another thread to finish. Releasing twice is reported as
/// use-after-release.
///
/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`].
#[no_mangle]
pub unsafe extern "C" fn cpy_release(handle: *mut c_void) {
    let _ = call("cpy_release", || {
        let token = token_of(handle)?;
        let removed = registry().remove(token);
        match removed {
            Ok(component) => component.release(),
            Err(e) => {
                if e.status() == Status::UseAfterRelease {
                    tracing::error!("cpy_release: handle {:#x} released twice", token);
                }
                Err(e)
            }
        }
    });
}

/// Lifecycle state code of `handle`, or -1 for a value that was never a
/// handle.
///
/// # Safety
///
/// `handle` must be null or a value returned by [`cpy_new`].
#[no_mangle]
pub unsafe extern "C" fn cpy_state(handle: *mut c_void) -> c_int {
    match call("cpy_state", || lookup(handle)) {
        Ok(component) => component.state().code(),
        Err(ComponentError::UseAfterRelease) => LifecycleState::Released.code(),
        Err(_) => -1,
    }
}

/// Status of the last call made on this thread
#[no_mangle]
pub extern "C" fn cpy_last_error_code() -> c_int {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|(status, _)| status.code())
            .unwrap_or(Status::Ok.code())
    })
}

/// Message of the last failed call on this thread, or null if it succeeded.
/// Valid until the next call on this thread.
#[no_mangle]
pub extern "C" fn cpy_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|(_, message)| message.as_ptr())
            .unwrap_or(ptr::null())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_channel() {
        record::<()>(&Err(ComponentError::UnknownPort("ghost".to_string())));
        assert_eq!(cpy_last_error_code(), Status::UnknownPort.code());
        let message = unsafe { CStr::from_ptr(cpy_last_error_message()) };
        assert!(message.to_str().unwrap().contains("ghost"));

        record(&Ok(()));
        assert_eq!(cpy_last_error_code(), Status::Ok.code());
        assert!(cpy_last_error_message().is_null());
    }

    #[test]
    fn test_panics_become_execution_failures() {
        let result: Result<()> = call("test", || panic!("boom"));
        assert_eq!(result.unwrap_err().status(), Status::ExecutionFailure);
        assert_eq!(cpy_last_error_code(), Status::ExecutionFailure.code());
    }

    #[test]
    fn test_null_arguments() {
        unsafe {
            assert!(cpy_new(ptr::null(), ptr::null(), ptr::null()).is_null());
            assert_eq!(cpy_last_error_code(), Status::InvalidArgument.code());

            assert_eq!(
                cpy_configure(ptr::null_mut()),
                Status::InvalidArgument.code()
            );
            assert_eq!(cpy_state(ptr::null_mut()), -1);
            cpy_free_ports(ptr::null_mut());
            assert_eq!(cpy_last_error_code(), Status::Ok.code());
        }
    }
}
