//! A scoped-acquisition undo stack.
//!
//! [`DevelopInstaller`] and the source-build path register a reversible action for
//! every side effect they perform (writing a transient runner script, moving a
//! configuration file aside, creating a scratch directory), and the [`Finalizer`]
//! guarantees those actions run in LIFO order on every exit path, success or failure.
//!
//! [`DevelopInstaller`]: https://docs.rs/distil-installer

use tracing::warn;

/// A LIFO stack of cleanup actions, run on `Drop` regardless of how the scope exits.
///
/// Actions are pushed as they're performed and popped in reverse order, mirroring the
/// acquire/release nesting of the operations they undo.
#[derive(Default)]
pub struct Finalizer {
    actions: Vec<Box<dyn FnOnce() + Send>>,
}

impl Finalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run when this finalizer is dropped.
    pub fn defer(&mut self, action: impl FnOnce() + Send + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Run every registered action now, in LIFO order, and clear the stack so `Drop`
    /// is a no-op afterwards. Useful when the caller wants cleanup to happen before the
    /// end of the enclosing scope.
    pub fn run(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            self.run();
        }
    }
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("pending", &self.actions.len())
            .finish()
    }
}

/// Run `body`, guaranteeing `Finalizer::run` executes afterwards even if `body` panics
/// during unwinding... unless the process aborts. This is a thin convenience wrapper;
/// most callers just let the `Finalizer` go out of scope.
pub fn with_finalizer<T>(body: impl FnOnce(&mut Finalizer) -> T) -> T {
    let mut finalizer = Finalizer::new();
    let result = body(&mut finalizer);
    if !finalizer.actions.is_empty() {
        warn!("finalizer dropped with pending actions; running them now");
    }
    finalizer.run();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn actions_run_in_lifo_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let mut finalizer = Finalizer::new();
            for i in 0..3 {
                let order = order.clone();
                finalizer.defer(move || order.lock().unwrap().push(i));
            }
        }
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn run_executes_immediately_and_is_idempotent() {
        let count = Arc::new(AtomicU32::new(0));
        let mut finalizer = Finalizer::new();
        let counted = count.clone();
        finalizer.defer(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        finalizer.run();
        finalizer.run();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_runs_even_when_body_returns_err() {
        let ran = Arc::new(AtomicU32::new(0));
        let ran_clone = ran.clone();
        let result: Result<(), &str> = with_finalizer(|finalizer| {
            finalizer.defer(move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            });
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
