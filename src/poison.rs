//! Container-level poison flag (§9 redesign note).
//!
//! The original terminates the process from worker context on a fatal
//! error. A worker here has no rollback path either, but instead of exiting
//! it records the failure here; every public entry point checks it first so
//! a mid-stream worker failure surfaces as a well-typed error on the next
//! call instead of taking the process down.

use crate::error::{CoreError, Result};
use std::sync::Mutex;

#[derive(Default)]
pub struct Poison(Mutex<Option<String>>);

impl Poison {
    pub fn new() -> Self {
        Poison(Mutex::new(None))
    }

    /// Records the first fatal error seen; later calls are no-ops so the
    /// earliest failure is what callers see.
    pub fn set(&self, message: impl Into<String>) {
        let mut guard = self.0.lock().unwrap();
        if guard.is_none() {
            *guard = Some(message.into());
        }
    }

    pub fn check(&self) -> Result<()> {
        let guard = self.0.lock().unwrap();
        match guard.as_ref() {
            Some(message) => Err(CoreError::Poisoned(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clean() {
        let poison = Poison::new();
        assert!(poison.check().is_ok());
    }

    #[test]
    fn first_error_sticks() {
        let poison = Poison::new();
        poison.set("boom");
        poison.set("second error is ignored");
        match poison.check() {
            Err(CoreError::Poisoned(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected Poisoned, got {other:?}"),
        }
    }
}
