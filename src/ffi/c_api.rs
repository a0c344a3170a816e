//! # C ABI
//!
//! Lets a C/C++ host register a plain function pointer as the foreign
//! callback. Events reach the function as a NUL-terminated JSON document;
//! symbol-producing events write their result through `out_symbol`.

use std::ffi::{c_char, c_void, CString};

use crate::callback::{CallbackEvent, CallbackHandle, CallbackReply, ForeignCallback};
use crate::constants::ffi_status;
use crate::error::{CallbackError, CallbackResult};
use crate::log_ffi;
use crate::native::{NativeCallbackBridge, RegistrationOutcome, RegistrationState};
use crate::registrar::install_callback;

/// Host callback: returns 0 on success, anything else is reported as a handler failure
pub type ForeignCallbackFn =
    extern "C" fn(event_json: *const c_char, user_data: *mut c_void, out_symbol: *mut i64) -> i32;

/// [`ForeignCallback`] backed by a C function pointer
pub struct CForeignCallback {
    name: String,
    func: ForeignCallbackFn,
    // Stored as an address; the host owns the pointee and its thread-safety
    user_data: usize,
}

impl CForeignCallback {
    pub fn new(name: impl Into<String>, func: ForeignCallbackFn, user_data: *mut c_void) -> Self {
        Self {
            name: name.into(),
            func,
            user_data: user_data as usize,
        }
    }
}

impl ForeignCallback for CForeignCallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        let payload = CString::new(serde_json::to_string(event)?)
            .map_err(|e| CallbackError::InvalidArgument(e.to_string()))?;

        let mut symbol: i64 = 0;
        let status = (self.func)(
            payload.as_ptr(),
            self.user_data as *mut c_void,
            &mut symbol as *mut i64,
        );

        if status != ffi_status::OK {
            return Err(CallbackError::handler_failed(
                &self.name,
                format!("C callback returned status {status} for {}", event.kind()),
            ));
        }

        if event.kind().expects_symbol() {
            Ok(CallbackReply::Symbol(symbol))
        } else {
            Ok(CallbackReply::Done)
        }
    }
}

/// Register `func` as the process-wide foreign callback
///
/// Returns `0` when installed, `1` when a callback is already registered and
/// `2` when `func` is null.
#[no_mangle]
pub extern "C" fn fc_register_foreign_callback_only_once(
    func: Option<ForeignCallbackFn>,
    user_data: *mut c_void,
) -> i32 {
    let Some(func) = func else {
        log_ffi!(warn, "register_rejected", reason: "null callback");
        return ffi_status::INVALID_ARGUMENT;
    };

    let handle = CallbackHandle::new(std::sync::Arc::new(CForeignCallback::new(
        "c_api_callback",
        func,
        user_data,
    )));

    match install_callback(handle) {
        Ok(installed) => match installed.outcome {
            RegistrationOutcome::Registered => {
                log_ffi!(info, "register_foreign_callback", handler_id: installed.handle.id());
                ffi_status::OK
            }
            RegistrationOutcome::AlreadyRegistered { .. } => ffi_status::ALREADY_REGISTERED,
        },
        Err(e) if e.is_double_registration() => {
            log_ffi!(error, "register_rejected", error: e.to_string());
            ffi_status::ALREADY_REGISTERED
        }
        Err(e) => {
            log_ffi!(error, "register_failed", error: e.to_string());
            ffi_status::HANDLER_ERROR
        }
    }
}

/// Returns `1` when the process-wide bridge holds a callback, `0` otherwise
#[no_mangle]
pub extern "C" fn fc_is_foreign_callback_registered() -> i32 {
    i32::from(NativeCallbackBridge::global().state() == RegistrationState::Registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::BlobRef;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    extern "C" fn counting_callback(
        event_json: *const c_char,
        user_data: *mut c_void,
        out_symbol: *mut i64,
    ) -> i32 {
        let counter = unsafe { &*(user_data as *const AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);

        let json = unsafe { CStr::from_ptr(event_json) }.to_str().unwrap();
        let event: CallbackEvent = serde_json::from_str(json).unwrap();
        if event.kind().expects_symbol() {
            unsafe { *out_symbol = 77 };
        }
        0
    }

    extern "C" fn failing_callback(
        _event_json: *const c_char,
        _user_data: *mut c_void,
        _out_symbol: *mut i64,
    ) -> i32 {
        5
    }

    #[test]
    fn test_c_callback_receives_json_and_returns_symbol() {
        let counter = AtomicUsize::new(0);
        let callback = CForeignCallback::new(
            "counting",
            counting_callback,
            &counter as *const AtomicUsize as *mut c_void,
        );

        let reply = callback
            .handle(&CallbackEvent::MakeScopeSymbol {
                scope_proto: "scope".to_string(),
            })
            .unwrap();
        assert_eq!(reply, CallbackReply::Symbol(77));

        let reply = callback
            .handle(&CallbackEvent::OfBlobCall {
                unique_id: 1,
                blob: BlobRef { of_blob_ptr: 8 },
            })
            .unwrap();
        assert_eq!(reply, CallbackReply::Done);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nonzero_status_is_handler_failure() {
        let callback = CForeignCallback::new("failing", failing_callback, std::ptr::null_mut());
        let err = callback
            .handle(&CallbackEvent::RemoveForeignCallback { unique_id: 1 })
            .unwrap_err();
        assert!(matches!(err, CallbackError::HandlerFailed { .. }));
        assert!(err.to_string().contains("status 5"));
    }

    #[test]
    fn test_null_callback_is_invalid_argument() {
        assert_eq!(
            fc_register_foreign_callback_only_once(None, std::ptr::null_mut()),
            ffi_status::INVALID_ARGUMENT
        );
    }
}
