//! Cooperative cancellation.
//!
//! Long-running loops call [`check_cancelled`]; once the token fires, the
//! whole operation unwinds with a [`Cancelled`] payload that is turned back
//! into an `Err` at the API boundary by [`Cancelled::catch`]. No partial
//! result is ever observable.

use std::panic::{self, AssertUnwindSafe};

pub use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

impl Cancelled {
    /// Unwinds the current operation. Does not run the panic hook.
    pub fn throw() -> ! {
        panic::resume_unwind(Box::new(Self))
    }

    /// Runs `f`, converting a [`Cancelled`] unwind into `Err(Cancelled)`.
    /// Any other panic keeps unwinding.
    pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Self> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Ok(value),
            Err(payload) => match payload.downcast::<Self>() {
                Ok(cancelled) => Err(*cancelled),
                Err(payload) => panic::resume_unwind(payload),
            },
        }
    }
}

#[inline]
pub fn check_cancelled(token: &CancellationToken) {
    if token.is_cancelled() {
        Cancelled::throw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_returns_value_when_not_cancelled() {
        let token = CancellationToken::new();
        let result = Cancelled::catch(|| {
            check_cancelled(&token);
            42
        });
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn catch_converts_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let result = Cancelled::catch(|| {
            for _ in 0.. {
                check_cancelled(&token);
            }
        });
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn other_panics_propagate() {
        let _ = Cancelled::catch(|| panic!("boom"));
    }
}
