//! PyO3 bindings for registering a Python object as the foreign callback
//!
//! The Python runtime installs its dispatcher once at import time:
//!
//! ```python
//! from foreign_callback._foreign_callback import register_foreign_callback_only_once
//!
//! class PythonCallback:
//!     def of_blob_call(self, payload): ...
//!     def make_scope_symbol(self, payload): return 1
//!
//! register_foreign_callback_only_once(PythonCallback())
//! ```
//!
//! Each event calls the method named after its kind with the event as a JSON string.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

use crate::callback::{CallbackEvent, CallbackHandle, CallbackReply, ForeignCallback};
use crate::error::{CallbackError, CallbackResult};
use crate::log_ffi;
use crate::logging;
use crate::native::{NativeCallbackBridge, RegistrationState};
use crate::registrar::install_callback;

impl From<CallbackError> for PyErr {
    fn from(err: CallbackError) -> PyErr {
        match err {
            CallbackError::InvalidArgument(msg) => PyValueError::new_err(msg),
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }
}

/// [`ForeignCallback`] backed by a Python object
pub struct PyForeignCallback {
    name: String,
    callback: PyObject,
}

impl PyForeignCallback {
    pub fn new(name: impl Into<String>, callback: PyObject) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl ForeignCallback for PyForeignCallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        let kind = event.kind();
        let payload = serde_json::to_string(event)?;

        Python::with_gil(|py| {
            let result = self
                .callback
                .call_method1(py, kind.as_str(), (payload,))
                .map_err(|e| CallbackError::handler_failed(&self.name, e.to_string()))?;

            if kind.expects_symbol() {
                let symbol: i64 = result
                    .extract(py)
                    .map_err(|e| CallbackError::handler_failed(&self.name, e.to_string()))?;
                Ok(CallbackReply::Symbol(symbol))
            } else {
                Ok(CallbackReply::Done)
            }
        })
    }
}

/// Register `callback` as the process-wide foreign callback
///
/// Raises `RuntimeError` if a callback was already registered.
#[pyfunction]
#[pyo3(signature = (callback, name=None))]
fn register_foreign_callback_only_once(callback: PyObject, name: Option<String>) -> PyResult<()> {
    let name = name.unwrap_or_else(|| "python_callback".to_string());
    let handle = CallbackHandle::new(Arc::new(PyForeignCallback::new(name, callback)));

    let installed = install_callback(handle)?;
    log_ffi!(info, "register_foreign_callback",
        component: "python_ffi",
        handler_id: installed.handle.id(),
        newly_registered: installed.newly_registered()
    );
    Ok(())
}

#[pyfunction]
fn is_foreign_callback_registered() -> bool {
    NativeCallbackBridge::global().state() == RegistrationState::Registered
}

/// Registration details as a JSON string, or `None` before registration
#[pyfunction]
fn registration_info() -> PyResult<Option<String>> {
    NativeCallbackBridge::global()
        .registration_info()
        .map(|info| serde_json::to_string(&info).map_err(CallbackError::from))
        .transpose()
        .map_err(PyErr::from)
}

#[pymodule]
fn _foreign_callback(m: &Bound<'_, PyModule>) -> PyResult<()> {
    logging::init_console_only();

    m.add_function(wrap_pyfunction!(register_foreign_callback_only_once, m)?)?;
    m.add_function(wrap_pyfunction!(is_foreign_callback_registered, m)?)?;
    m.add_function(wrap_pyfunction!(registration_info, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::BlobRef;
    use crate::config::DoubleRegistrationPolicy;
    use crate::context::ExecutionContext;
    use crate::registrar::CallbackRegistrar;

    const CALLBACK_SOURCE: &str = r#"
class Callback:
    def __init__(self):
        self.payloads = []

    def of_blob_call(self, payload):
        self.payloads.append(payload)

    def make_scope_symbol(self, payload):
        return 11
"#;

    fn python_callback(py: Python<'_>) -> PyObject {
        let module = PyModule::from_code_bound(py, CALLBACK_SOURCE, "callback.py", "callback")
            .unwrap();
        module.getattr("Callback").unwrap().call0().unwrap().unbind()
    }

    #[test]
    fn test_double_registration_raises_runtime_error() {
        pyo3::prepare_freethreaded_python();
        let context = ExecutionContext::new();
        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Reject);

        let err = Python::with_gil(|py| {
            let first = CallbackHandle::new(Arc::new(PyForeignCallback::new(
                "first",
                python_callback(py),
            )));
            let second = CallbackHandle::new(Arc::new(PyForeignCallback::new(
                "second",
                python_callback(py),
            )));
            CallbackRegistrar::new(first).install(&context, &bridge).unwrap();
            CallbackRegistrar::new(second)
                .install(&context, &bridge)
                .unwrap_err()
        });

        assert!(err.is_double_registration());
        let py_err = PyErr::from(err);
        Python::with_gil(|py| {
            assert!(py_err.is_instance_of::<PyRuntimeError>(py));
            assert!(py_err.to_string().contains("only be registered once"));
        });
    }

    #[test]
    fn test_invalid_argument_raises_value_error() {
        pyo3::prepare_freethreaded_python();
        let py_err = PyErr::from(CallbackError::InvalidArgument("bad".to_string()));
        Python::with_gil(|py| {
            assert!(py_err.is_instance_of::<PyValueError>(py));
        });
    }

    #[test]
    fn test_python_callback_receives_events() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let object = python_callback(py);
            let callback = PyForeignCallback::new("python", object.clone_ref(py));

            let reply = callback
                .handle(&CallbackEvent::MakeScopeSymbol {
                    scope_proto: "scope".to_string(),
                })
                .unwrap();
            assert_eq!(reply, CallbackReply::Symbol(11));

            let reply = callback
                .handle(&CallbackEvent::OfBlobCall {
                    unique_id: 1,
                    blob: BlobRef { of_blob_ptr: 64 },
                })
                .unwrap();
            assert_eq!(reply, CallbackReply::Done);

            let payloads = object.getattr(py, "payloads").unwrap();
            assert_eq!(payloads.bind(py).len().unwrap(), 1);
        });
    }

    #[test]
    fn test_missing_python_method_is_handler_failure() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let callback = PyForeignCallback::new("python", python_callback(py));
            let err = callback
                .handle(&CallbackEvent::RemoveForeignCallback { unique_id: 1 })
                .unwrap_err();
            assert!(matches!(err, CallbackError::HandlerFailed { .. }));
        });
    }
}
