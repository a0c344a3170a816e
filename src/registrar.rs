//! # Callback Registrar
//!
//! Installs the foreign callback during initialization: binds the handler
//! into the [`ExecutionContext`] delegation slot and registers it with the
//! [`NativeCallbackBridge`]. A [`CallbackRegistrar`] is consumed by
//! [`CallbackRegistrar::install`], so a registrar value can install at most once;
//! the bridge's one-shot slot covers installs from separate registrars.
//!
//! ## Usage
//!
//! ```rust
//! use foreign_callback::{
//!     BlobCallbackDispatcher, CallbackHandle, CallbackRegistrar, ExecutionContext,
//!     NativeCallbackBridge,
//! };
//! use std::sync::Arc;
//!
//! let context = ExecutionContext::new();
//! let bridge = NativeCallbackBridge::default();
//! let handle = CallbackHandle::new(Arc::new(BlobCallbackDispatcher::new(true)));
//!
//! let installed = CallbackRegistrar::new(handle.clone())
//!     .install(&context, &bridge)
//!     .expect("first install succeeds");
//! assert!(installed.handle.ptr_eq(&handle));
//!
//! let second = CallbackHandle::new(Arc::new(BlobCallbackDispatcher::new(true)));
//! assert!(CallbackRegistrar::new(second).install(&context, &bridge).is_err());
//! ```

use tracing::{error, info, warn};

use crate::callback::CallbackHandle;
use crate::config::DoubleRegistrationPolicy;
use crate::context::ExecutionContext;
use crate::error::{CallbackError, CallbackResult};
use crate::native::{NativeCallbackBridge, RegistrationOutcome, RegistrationState};

/// What an install call left in place
#[derive(Debug, Clone)]
pub struct InstalledCallback {
    /// The handler now held by both the slot and the bridge
    pub handle: CallbackHandle,
    pub outcome: RegistrationOutcome,
}

impl InstalledCallback {
    /// True when this call performed the installation
    pub fn newly_registered(&self) -> bool {
        self.outcome == RegistrationOutcome::Registered
    }
}

/// One-shot installer for a foreign callback handler
#[derive(Debug)]
#[must_use = "a registrar does nothing until `install` is called"]
pub struct CallbackRegistrar {
    handle: CallbackHandle,
}

impl CallbackRegistrar {
    pub fn new(handle: CallbackHandle) -> Self {
        Self { handle }
    }

    /// Bind the handler into `context` and register it with `bridge`
    ///
    /// Fails with `DoubleRegistration` if either side already holds a handler
    /// (reject policy). A failed install modifies neither side. Under the
    /// ignore policy the installed handler is kept and copied into whichever
    /// side is still empty.
    pub fn install(
        self,
        context: &ExecutionContext,
        bridge: &NativeCallbackBridge,
    ) -> CallbackResult<InstalledCallback> {
        let handle = self.handle;

        if let Some(installed) = context.handler() {
            return already_installed(bridge, installed, &handle);
        }

        let outcome = bridge.register_foreign_callback_only_once(handle.clone())?;

        match outcome {
            RegistrationOutcome::Registered => {
                if let Err(rejected) = context.bind(handle.clone()) {
                    // Lost a race against another install on the same context
                    let installed = context.handler().ok_or_else(|| {
                        CallbackError::InvalidArgument("delegation slot vanished".to_string())
                    })?;
                    // An ignored install may have mirrored this same handler into the slot first
                    if installed.ptr_eq(&rejected) {
                        info!(
                            handler_id = %handle.id(),
                            handler_name = %handle.name(),
                            "Foreign callback installed"
                        );
                        return Ok(InstalledCallback { handle, outcome });
                    }
                    error!(
                        installed = %installed.name(),
                        rejected = %rejected.name(),
                        "Delegation slot bound concurrently with bridge registration"
                    );
                    return Err(double_registration(installed, &rejected));
                }

                info!(
                    handler_id = %handle.id(),
                    handler_name = %handle.name(),
                    "Foreign callback installed"
                );
                Ok(InstalledCallback { handle, outcome })
            }
            RegistrationOutcome::AlreadyRegistered { .. } => {
                // Ignore policy: mirror the bridge's handler into an empty slot
                let installed = bridge.handler().cloned().ok_or_else(|| {
                    CallbackError::InvalidArgument("bridge reported a missing handler".to_string())
                })?;
                let _ = context.bind(installed.clone());
                Ok(InstalledCallback {
                    handle: installed,
                    outcome,
                })
            }
        }
    }
}

/// Install `handle` into the process-wide context and bridge
///
/// Must run during initialization, before anything can cause the engine to
/// escalate an event.
pub fn install_callback(handle: CallbackHandle) -> CallbackResult<InstalledCallback> {
    CallbackRegistrar::new(handle).install(ExecutionContext::global(), NativeCallbackBridge::global())
}

fn double_registration(installed: &CallbackHandle, rejected: &CallbackHandle) -> CallbackError {
    CallbackError::DoubleRegistration {
        installed_id: installed.id(),
        installed_name: installed.name().to_string(),
        rejected_name: rejected.name().to_string(),
    }
}

fn already_installed(
    bridge: &NativeCallbackBridge,
    installed: &CallbackHandle,
    rejected: &CallbackHandle,
) -> CallbackResult<InstalledCallback> {
    match bridge.policy() {
        DoubleRegistrationPolicy::Reject => Err(double_registration(installed, rejected)),
        DoubleRegistrationPolicy::Ignore => {
            warn!(
                installed = %installed.name(),
                ignored = %rejected.name(),
                "Delegation slot already bound, keeping the installed handler"
            );
            // Pair an unregistered bridge with the slot's handler so engine events reach it
            if bridge.state() == RegistrationState::Unregistered {
                bridge.register_foreign_callback_only_once(installed.clone())?;
            }
            Ok(InstalledCallback {
                handle: installed.clone(),
                outcome: RegistrationOutcome::AlreadyRegistered {
                    installed_id: installed.id(),
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackEvent, CallbackReply};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn handle(name: &str) -> CallbackHandle {
        CallbackHandle::from_fn(name, |_| Ok(CallbackReply::Done))
    }

    #[test]
    fn test_install_binds_slot_and_bridge() {
        let context = ExecutionContext::new();
        let bridge = NativeCallbackBridge::default();
        let a = handle("a");

        let installed = CallbackRegistrar::new(a.clone())
            .install(&context, &bridge)
            .unwrap();

        assert!(installed.newly_registered());
        assert!(installed.handle.ptr_eq(&a));
        assert!(context.handler().unwrap().ptr_eq(&a));
        assert!(bridge.handler().unwrap().ptr_eq(&a));
        assert_eq!(bridge.registered_count(), 1);
    }

    #[test]
    fn test_second_install_rejected_and_state_unchanged() {
        let context = ExecutionContext::new();
        let bridge = NativeCallbackBridge::default();
        let a = handle("a");
        let b = handle("b");

        CallbackRegistrar::new(a.clone())
            .install(&context, &bridge)
            .unwrap();
        let err = CallbackRegistrar::new(b)
            .install(&context, &bridge)
            .unwrap_err();

        assert!(err.is_double_registration());
        assert!(context.handler().unwrap().ptr_eq(&a));
        assert!(bridge.handler().unwrap().ptr_eq(&a));
        assert_eq!(bridge.registered_count(), 1);
    }

    #[test]
    fn test_fresh_context_against_registered_bridge_stays_empty() {
        let bridge = NativeCallbackBridge::default();
        CallbackRegistrar::new(handle("a"))
            .install(&ExecutionContext::new(), &bridge)
            .unwrap();

        let other = ExecutionContext::new();
        let err = CallbackRegistrar::new(handle("b"))
            .install(&other, &bridge)
            .unwrap_err();

        assert!(err.is_double_registration());
        assert!(!other.is_bound());
    }

    #[test]
    fn test_bound_context_with_fresh_bridge_leaves_bridge_empty() {
        let context = ExecutionContext::new();
        CallbackRegistrar::new(handle("a"))
            .install(&context, &NativeCallbackBridge::default())
            .unwrap();

        let bridge = NativeCallbackBridge::default();
        assert!(CallbackRegistrar::new(handle("b"))
            .install(&context, &bridge)
            .is_err());
        assert_eq!(bridge.state(), RegistrationState::Unregistered);
    }

    #[test]
    fn test_ignore_policy_reports_installed_handler() {
        let context = ExecutionContext::new();
        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Ignore);
        let a = handle("a");

        CallbackRegistrar::new(a.clone())
            .install(&context, &bridge)
            .unwrap();
        let second = CallbackRegistrar::new(handle("b"))
            .install(&context, &bridge)
            .unwrap();

        assert!(!second.newly_registered());
        assert!(second.handle.ptr_eq(&a));
        assert!(context.handler().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_ignore_policy_mirrors_bridge_handler_into_empty_slot() {
        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Ignore);
        let a = handle("a");
        CallbackRegistrar::new(a.clone())
            .install(&ExecutionContext::new(), &bridge)
            .unwrap();

        let context = ExecutionContext::new();
        let installed = CallbackRegistrar::new(handle("b"))
            .install(&context, &bridge)
            .unwrap();

        assert!(installed.handle.ptr_eq(&a));
        assert!(context.handler().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_installed_handler_receives_bridge_events() {
        let context = ExecutionContext::new();
        let bridge = NativeCallbackBridge::default();
        let handle = CallbackHandle::from_fn("symbols", |_| Ok(CallbackReply::Symbol(9)));

        CallbackRegistrar::new(handle).install(&context, &bridge).unwrap();

        let reply = bridge
            .invoke(&CallbackEvent::MakeParallelDescSymbol {
                parallel_conf: "cpu:0".to_string(),
            })
            .unwrap();
        assert_eq!(reply, CallbackReply::Symbol(9));
    }

    #[test]
    fn test_bound_context_pairs_fresh_bridge_under_ignore_policy() {
        let context = ExecutionContext::new();
        let a = CallbackHandle::from_fn("a", |_| Ok(CallbackReply::Symbol(3)));
        CallbackRegistrar::new(a.clone())
            .install(&context, &NativeCallbackBridge::default())
            .unwrap();

        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Ignore);
        let installed = CallbackRegistrar::new(handle("b"))
            .install(&context, &bridge)
            .unwrap();

        assert!(!installed.newly_registered());
        assert!(installed.handle.ptr_eq(&a));
        assert!(bridge.handler().unwrap().ptr_eq(&a));
        let reply = bridge
            .invoke(&CallbackEvent::MakeScopeSymbol {
                scope_proto: "scope".to_string(),
            })
            .unwrap();
        assert_eq!(reply, CallbackReply::Symbol(3));
    }

    #[test]
    fn test_concurrent_installs_under_ignore_policy_never_fail() {
        const THREADS: usize = 4;

        for _ in 0..200 {
            let context = ExecutionContext::new();
            let bridge = Arc::new(NativeCallbackBridge::new(DoubleRegistrationPolicy::Ignore));
            let barrier = Arc::new(Barrier::new(THREADS));

            let workers: Vec<_> = (0..THREADS)
                .map(|i| {
                    let context = context.clone();
                    let bridge = Arc::clone(&bridge);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        let h = handle(&format!("handler-{i}"));
                        barrier.wait();
                        CallbackRegistrar::new(h).install(&context, &bridge)
                    })
                })
                .collect();

            let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

            assert!(results.iter().all(Result::is_ok));
            let newly = results
                .iter()
                .filter(|r| r.as_ref().is_ok_and(InstalledCallback::newly_registered))
                .count();
            assert_eq!(newly, 1);

            let installed = bridge.handler().unwrap();
            assert!(context.handler().unwrap().ptr_eq(installed));
            for result in &results {
                assert!(result.as_ref().unwrap().handle.ptr_eq(installed));
            }
        }
    }
}
