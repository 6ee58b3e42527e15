//! Gradient recording mode
//!
//! Ops consult [`is_grad_enabled`] before attaching a backward op. Evaluation
//! passes hold a [`NoGradGuard`] for their whole duration; dropping the guard
//! restores the previous mode, including on early return through `?`.

use std::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether ops currently record a tape
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

/// Scoped guard disabling gradient recording
#[must_use = "gradient recording is re-enabled as soon as the guard is dropped"]
pub struct NoGradGuard {
    previous: bool,
}

impl NoGradGuard {
    /// Disable gradient recording until the guard is dropped
    pub fn new() -> Self {
        let previous = GRAD_ENABLED.with(|flag| flag.replace(false));
        Self { previous }
    }
}

impl Default for NoGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoGradGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|flag| flag.set(self.previous));
    }
}

/// Run `f` with gradient recording disabled
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    let _guard = NoGradGuard::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grad_enabled_by_default() {
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_guard_restores_mode() {
        {
            let _guard = NoGradGuard::new();
            assert!(!is_grad_enabled());
        }
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_nested_guards() {
        let outer = NoGradGuard::new();
        {
            let _inner = NoGradGuard::new();
            assert!(!is_grad_enabled());
        }
        assert!(!is_grad_enabled());
        drop(outer);
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_restored_on_early_return() {
        fn fails() -> Result<(), ()> {
            let _guard = NoGradGuard::new();
            Err::<(), ()>(())?;
            Ok(())
        }
        assert!(fails().is_err());
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_no_grad_closure() {
        let inside = no_grad(is_grad_enabled);
        assert!(!inside);
        assert!(is_grad_enabled());
    }
}
