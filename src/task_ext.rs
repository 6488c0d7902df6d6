use std::{fmt, time::Duration};

use crate::{
    chain::ChainStep,
    iterate::{LoopParams, LoopRange},
    join::Task,
    retry::{RetryFailed, RetryOptions},
    task::{Deferred, IntoOutcome},
};

/// Extend `Deferred` with the flow combinators.
///
/// Each method waits for the receiver to resolve, then runs the combinator of the same
/// name on the receiver's flow. The receiver's value is discarded; its failure skips
/// the combinator and is passed on.
pub trait DeferredExt<T, E> {
    fn wait(&self, delay: Duration) -> Deferred<u64, E>;

    fn all<U, I>(&self, tasks: I) -> Deferred<Vec<U>, E>
    where
        U: Clone + 'static,
        I: IntoIterator + 'static,
        I::Item: Into<Task<U, E>>;

    fn earlier<U, I>(&self, tasks: I) -> Deferred<Vec<Option<U>>, E>
    where
        U: Clone + 'static,
        I: IntoIterator + 'static,
        I::Item: Into<Task<U, E>>;

    #[doc(alias = "loop")]
    fn loop_<U, R, F>(&self, range: impl Into<LoopRange>, task: F) -> Deferred<Option<U>, E>
    where
        U: Clone + 'static,
        F: FnMut(i64, &LoopParams<U>) -> R + 'static,
        R: IntoOutcome<U, E>;

    fn repeat<U, F>(&self, count: usize, task: F) -> Deferred<Option<U>, E>
    where
        U: Clone + 'static,
        F: FnMut(usize) -> Result<U, E> + 'static;

    fn chain<U, I>(&self, steps: I) -> Deferred<U, E>
    where
        U: Clone + Default + 'static,
        I: IntoIterator<Item = ChainStep<U, E>> + 'static;

    /// Runs [`Flow::retry`](crate::Flow::retry) once the receiver resolves.
    ///
    /// `exhausted` turns the [`RetryFailed`] of a retry that ran out of attempts back
    /// into `E`, so the receiver's own failure and the retry's share one type.
    fn retry<U, R, F, M>(
        &self,
        count: usize,
        attempt: F,
        options: RetryOptions,
        exhausted: M,
    ) -> Deferred<U, E>
    where
        U: Clone + 'static,
        E: fmt::Debug,
        F: FnMut(usize) -> R + 'static,
        R: IntoOutcome<U, E>,
        M: FnOnce(RetryFailed<E>) -> E + 'static;
}

impl<T, E> DeferredExt<T, E> for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn wait(&self, delay: Duration) -> Deferred<u64, E> {
        let flow = self.flow().clone();
        self.next(move |_| flow.wait(delay))
    }

    fn all<U, I>(&self, tasks: I) -> Deferred<Vec<U>, E>
    where
        U: Clone + 'static,
        I: IntoIterator + 'static,
        I::Item: Into<Task<U, E>>,
    {
        let flow = self.flow().clone();
        self.next(move |_| flow.all(tasks))
    }

    fn earlier<U, I>(&self, tasks: I) -> Deferred<Vec<Option<U>>, E>
    where
        U: Clone + 'static,
        I: IntoIterator + 'static,
        I::Item: Into<Task<U, E>>,
    {
        let flow = self.flow().clone();
        self.next(move |_| flow.earlier(tasks))
    }

    fn loop_<U, R, F>(&self, range: impl Into<LoopRange>, task: F) -> Deferred<Option<U>, E>
    where
        U: Clone + 'static,
        F: FnMut(i64, &LoopParams<U>) -> R + 'static,
        R: IntoOutcome<U, E>,
    {
        let flow = self.flow().clone();
        let range = range.into();
        self.next(move |_| flow.loop_(range, task))
    }

    fn repeat<U, F>(&self, count: usize, task: F) -> Deferred<Option<U>, E>
    where
        U: Clone + 'static,
        F: FnMut(usize) -> Result<U, E> + 'static,
    {
        let flow = self.flow().clone();
        self.next(move |_| flow.repeat(count, task))
    }

    fn chain<U, I>(&self, steps: I) -> Deferred<U, E>
    where
        U: Clone + Default + 'static,
        I: IntoIterator<Item = ChainStep<U, E>> + 'static,
    {
        let flow = self.flow().clone();
        self.next(move |_| flow.chain(steps))
    }

    fn retry<U, R, F, M>(
        &self,
        count: usize,
        attempt: F,
        options: RetryOptions,
        exhausted: M,
    ) -> Deferred<U, E>
    where
        U: Clone + 'static,
        E: fmt::Debug,
        F: FnMut(usize) -> R + 'static,
        R: IntoOutcome<U, E>,
        M: FnOnce(RetryFailed<E>) -> E + 'static,
    {
        let flow = self.flow().clone();
        self.next(move |_| flow.retry(count, attempt, options).map_err(exhausted))
    }
}
