// Best-effort teardown: every step runs, failures are collected instead of propagated

use crate::error::NativeResult;
use std::panic::{self, AssertUnwindSafe};

/// A teardown step that did not complete cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFailure {
    pub step: &'static str,
    pub message: String,
}

/// Outcome of a best-effort release sequence
#[derive(Debug, Default)]
pub struct ReleaseReport {
    failures: Vec<ReleaseFailure>,
}

impl ReleaseReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one release step. Errors and panics are recorded and logged; the
    /// caller always gets control back so the next step can run.
    pub fn attempt<F>(&mut self, step: &'static str, release: F)
    where
        F: FnOnce() -> NativeResult<()>,
    {
        let message = match panic::catch_unwind(AssertUnwindSafe(release)) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        log::warn!("[release] {} failed: {}", step, message);
        self.failures.push(ReleaseFailure { step, message });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ReleaseFailure] {
        &self.failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;

    #[test]
    fn test_all_steps_run_after_failure() {
        let mut ran = Vec::new();
        let mut report = ReleaseReport::new();

        report.attempt("engine", || {
            ran.push("engine");
            Err(NativeError::Failed("decoder wedged".into()))
        });
        report.attempt("render target", || {
            ran.push("render target");
            Ok(())
        });
        report.attempt("surface", || {
            ran.push("surface");
            Ok(())
        });

        assert_eq!(ran, vec!["engine", "render target", "surface"]);
        assert!(!report.is_clean());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].step, "engine");
    }

    #[test]
    fn test_panicking_step_is_recorded() {
        let mut report = ReleaseReport::new();
        report.attempt("surface", || panic!("surface gone"));
        report.attempt("engine", || Ok(()));

        assert_eq!(report.failures().len(), 1);
        assert!(report.failures()[0].message.contains("surface gone"));
    }

    #[test]
    fn test_clean_report() {
        let mut report = ReleaseReport::new();
        report.attempt("engine", || Ok(()));
        assert!(report.is_clean());
    }
}
