//! Bounded retry with a fixed delay between attempts.

use std::{fmt, time::Duration};

use thiserror::Error;
use tracing::debug;

use crate::{
    flow::Flow,
    task::{Deferred, IntoOutcome},
};

/// Options for [`Flow::retry`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryOptions {
    /// Delay between a failed attempt and the next one. Zero by default.
    pub wait: Duration,
}

impl RetryOptions {
    /// Waits `delay` between attempts.
    pub fn with_wait(delay: Duration) -> Self {
        RetryOptions { wait: delay }
    }
}

/// The rejection of a [`Flow::retry`] that ran out of attempts.
///
/// Carries the error of the final attempt, so giving up can be told apart from a
/// single failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("retry failed")]
pub struct RetryFailed<E> {
    last: E,
}

impl<E> RetryFailed<E> {
    /// The literal message every exhausted retry carries.
    pub const MESSAGE: &'static str = "retry failed";

    fn new(last: E) -> Self {
        RetryFailed { last }
    }

    /// Returns [`RetryFailed::MESSAGE`].
    pub fn message(&self) -> &'static str {
        Self::MESSAGE
    }

    /// Returns the error of the final attempt.
    pub fn last_error(&self) -> &E {
        &self.last
    }

    /// Splits the rejection into its message and the final attempt's error.
    pub fn into_parts(self) -> (&'static str, E) {
        (Self::MESSAGE, self.last)
    }
}

impl Flow {
    /// Runs `attempt` until it succeeds, at most `count` times.
    ///
    /// `attempt` receives the number of attempts left, including the current one, and
    /// may return a deferred or a plain result. Every attempt starts on a later
    /// scheduler turn, after [`RetryOptions::wait`] for all but the first. Once
    /// `count` attempts have failed the retry rejects with [`RetryFailed`]; a `count`
    /// of zero still makes one attempt.
    ///
    /// Cancelling the returned deferred stops any further attempt.
    pub fn retry<T, E, R, F>(
        &self,
        count: usize,
        mut attempt: F,
        options: RetryOptions,
    ) -> Deferred<T, RetryFailed<E>>
    where
        T: Clone + 'static,
        E: Clone + fmt::Debug + 'static,
        F: FnMut(usize) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        let flow = self.clone();
        self.drive(async move {
            let mut remaining = count;
            let mut delay = Duration::ZERO;
            loop {
                flow.sleep(delay).await;
                match attempt(remaining).into_outcome().settle().await {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        remaining = remaining.saturating_sub(1);
                        if remaining == 0 {
                            debug!(?err, "retry exhausted");
                            return Err(RetryFailed::new(err));
                        }
                        debug!(remaining, "attempt failed, retrying");
                        delay = options.wait;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq)]
    struct Opaque(u8);

    #[test]
    fn failure_holds_errors_without_debug() {
        let failure = RetryFailed::new(Opaque(3));

        assert_eq!(failure.message(), "retry failed");
        assert!(failure.last_error() == &Opaque(3));
        let (message, last) = failure.into_parts();
        assert_eq!(message, RetryFailed::<Opaque>::MESSAGE);
        assert!(last == Opaque(3));
    }
}
