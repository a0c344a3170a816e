//! # Native Callback Bridge
//!
//! The registration point on the engine side. It retains exactly one
//! foreign callback for its lifetime and invokes it whenever the engine needs
//! to escalate an event. A second registration never replaces the first; the
//! configured [`DoubleRegistrationPolicy`] decides whether it fails or is
//! reported as a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::callback::{CallbackEvent, CallbackHandle, CallbackReply};
use crate::config::{ConfigLoader, DoubleRegistrationPolicy};
use crate::error::{CallbackError, CallbackResult};
use crate::log_registration;

static GLOBAL_BRIDGE: OnceLock<NativeCallbackBridge> = OnceLock::new();

/// `Unregistered → Registered`, with no way back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Unregistered,
    Registered,
}

/// Result of a registration attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// This call installed the handler
    Registered,
    /// A handler was already installed and kept (ignore policy only)
    AlreadyRegistered { installed_id: Uuid },
}

/// Snapshot of the installed registration for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub handler_id: Uuid,
    pub handler_name: String,
    pub registered_at: DateTime<Utc>,
    pub invocations: u64,
    pub rejected_attempts: u64,
    pub policy: DoubleRegistrationPolicy,
}

#[derive(Debug)]
struct Registration {
    handle: CallbackHandle,
    registered_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NativeCallbackBridge {
    policy: DoubleRegistrationPolicy,
    registration: OnceLock<Registration>,
    invocations: AtomicU64,
    rejected_attempts: AtomicU64,
}

impl Default for NativeCallbackBridge {
    fn default() -> Self {
        Self::new(DoubleRegistrationPolicy::default())
    }
}

impl NativeCallbackBridge {
    pub fn new(policy: DoubleRegistrationPolicy) -> Self {
        Self {
            policy,
            registration: OnceLock::new(),
            invocations: AtomicU64::new(0),
            rejected_attempts: AtomicU64::new(0),
        }
    }

    /// Process-wide bridge; its policy comes from the loaded configuration
    pub fn global() -> &'static NativeCallbackBridge {
        GLOBAL_BRIDGE.get_or_init(|| {
            let policy = match ConfigLoader::new().load() {
                Ok(config) => config.double_registration_policy,
                Err(e) => {
                    warn!(error = %e, "Failed to load bridge configuration, using default policy");
                    DoubleRegistrationPolicy::default()
                }
            };
            NativeCallbackBridge::new(policy)
        })
    }

    pub fn policy(&self) -> DoubleRegistrationPolicy {
        self.policy
    }

    /// Register `handle` as the sole foreign callback
    ///
    /// The first call installs the handler. Every later call leaves it in
    /// place and either fails with `DoubleRegistration` (reject policy) or
    /// returns [`RegistrationOutcome::AlreadyRegistered`] (ignore policy).
    pub fn register_foreign_callback_only_once(
        &self,
        handle: CallbackHandle,
    ) -> CallbackResult<RegistrationOutcome> {
        let mut installed_now = false;
        let registration = self.registration.get_or_init(|| {
            installed_now = true;
            Registration {
                handle: handle.clone(),
                registered_at: Utc::now(),
            }
        });

        if installed_now {
            log_registration!(info, "foreign_callback_registered",
                handler_id: registration.handle.id(),
                handler_name: registration.handle.name()
            );
            return Ok(RegistrationOutcome::Registered);
        }

        self.rejected_attempts.fetch_add(1, Ordering::Relaxed);
        let installed = &registration.handle;

        match self.policy {
            DoubleRegistrationPolicy::Reject => {
                error!(
                    installed = %installed.name(),
                    rejected = %handle.name(),
                    "Foreign callback registered more than once"
                );
                Err(CallbackError::DoubleRegistration {
                    installed_id: installed.id(),
                    installed_name: installed.name().to_string(),
                    rejected_name: handle.name().to_string(),
                })
            }
            DoubleRegistrationPolicy::Ignore => {
                warn!(
                    installed = %installed.name(),
                    ignored = %handle.name(),
                    "Foreign callback already registered, keeping the installed handler"
                );
                Ok(RegistrationOutcome::AlreadyRegistered {
                    installed_id: installed.id(),
                })
            }
        }
    }

    /// Escalate `event` to the installed handler
    pub fn invoke(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        let registration = self
            .registration
            .get()
            .ok_or(CallbackError::NoHandlerInstalled { kind: event.kind() })?;

        self.invocations.fetch_add(1, Ordering::Relaxed);
        registration.handle.call(event)
    }

    pub fn state(&self) -> RegistrationState {
        if self.registration.get().is_some() {
            RegistrationState::Registered
        } else {
            RegistrationState::Unregistered
        }
    }

    /// Number of handlers held by the bridge (0 or 1)
    pub fn registered_count(&self) -> usize {
        usize::from(self.registration.get().is_some())
    }

    pub fn handler(&self) -> Option<&CallbackHandle> {
        self.registration.get().map(|r| &r.handle)
    }

    pub fn registration_info(&self) -> Option<RegistrationInfo> {
        self.registration.get().map(|r| RegistrationInfo {
            handler_id: r.handle.id(),
            handler_name: r.handle.name().to_string(),
            registered_at: r.registered_at,
            invocations: self.invocations.load(Ordering::Relaxed),
            rejected_attempts: self.rejected_attempts.load(Ordering::Relaxed),
            policy: self.policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::CallbackEventKind;

    fn handle(name: &str) -> CallbackHandle {
        CallbackHandle::from_fn(name, |event| match event {
            CallbackEvent::MakeScopeSymbol { .. } => Ok(CallbackReply::Symbol(1)),
            _ => Ok(CallbackReply::Done),
        })
    }

    fn remove_event() -> CallbackEvent {
        CallbackEvent::RemoveForeignCallback { unique_id: 1 }
    }

    #[test]
    fn test_invoke_before_registration_fails() {
        let bridge = NativeCallbackBridge::default();
        assert_eq!(bridge.state(), RegistrationState::Unregistered);
        assert_eq!(bridge.registered_count(), 0);
        assert!(bridge.registration_info().is_none());

        let result = bridge.invoke(&remove_event());
        assert!(matches!(
            result,
            Err(CallbackError::NoHandlerInstalled {
                kind: CallbackEventKind::RemoveForeignCallback
            })
        ));
    }

    #[test]
    fn test_first_registration_installs_handler() {
        let bridge = NativeCallbackBridge::default();
        let a = handle("a");

        let outcome = bridge.register_foreign_callback_only_once(a.clone()).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Registered);
        assert_eq!(bridge.state(), RegistrationState::Registered);
        assert_eq!(bridge.registered_count(), 1);
        assert!(bridge.handler().unwrap().ptr_eq(&a));

        let reply = bridge
            .invoke(&CallbackEvent::MakeScopeSymbol {
                scope_proto: String::new(),
            })
            .unwrap();
        assert_eq!(reply, CallbackReply::Symbol(1));
        assert_eq!(bridge.registration_info().unwrap().invocations, 1);
    }

    #[test]
    fn test_second_registration_rejected_under_reject_policy() {
        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Reject);
        let a = handle("a");
        bridge.register_foreign_callback_only_once(a.clone()).unwrap();

        let err = bridge
            .register_foreign_callback_only_once(handle("b"))
            .unwrap_err();
        assert!(err.is_double_registration());
        assert!(err.to_string().contains("only be registered once"));

        assert!(bridge.handler().unwrap().ptr_eq(&a));
        assert_eq!(bridge.registered_count(), 1);
        assert_eq!(bridge.registration_info().unwrap().rejected_attempts, 1);
    }

    #[test]
    fn test_same_handler_twice_is_still_rejected() {
        let bridge = NativeCallbackBridge::default();
        let a = handle("a");
        bridge.register_foreign_callback_only_once(a.clone()).unwrap();
        assert!(bridge.register_foreign_callback_only_once(a).is_err());
    }

    #[test]
    fn test_second_registration_ignored_under_ignore_policy() {
        let bridge = NativeCallbackBridge::new(DoubleRegistrationPolicy::Ignore);
        let a = handle("a");
        bridge.register_foreign_callback_only_once(a.clone()).unwrap();

        let outcome = bridge.register_foreign_callback_only_once(handle("b")).unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::AlreadyRegistered {
                installed_id: a.id()
            }
        );
        assert!(bridge.handler().unwrap().ptr_eq(&a));
        assert_eq!(bridge.registered_count(), 1);
    }

    #[test]
    fn test_concurrent_registration_installs_exactly_one() {
        let bridge = NativeCallbackBridge::default();
        let outcomes: Vec<bool> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|i| {
                    let bridge = &bridge;
                    scope.spawn(move || {
                        bridge
                            .register_foreign_callback_only_once(handle(&format!("h{i}")))
                            .is_ok()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(bridge.registered_count(), 1);
        assert_eq!(bridge.registration_info().unwrap().rejected_attempts, 7);
    }

    #[test]
    fn test_registration_info_serializes() {
        let bridge = NativeCallbackBridge::default();
        bridge.register_foreign_callback_only_once(handle("info")).unwrap();
        let json = serde_json::to_value(bridge.registration_info().unwrap()).unwrap();
        assert_eq!(json["handler_name"], "info");
        assert_eq!(json["policy"], "reject");
    }
}
