//! Defines `Deferred`, the chainable and cancellable handle every combinator consumes
//! and produces, together with `Resolver` and the `Outcome` of a continuation.
//!
//! A `Deferred` wraps a shared future of `Result<T, E>`. Chaining never mutates the
//! receiver: [`then`](Deferred::then), [`next`](Deferred::next) and
//! [`error`](Deferred::error) each return a new handle, and continuations always run on
//! a later scheduler turn, never inside the call that attached them. A continuation may
//! return a plain `Result` or another `Deferred`; in the second case the new handle
//! settles only once the inner one does.
//!
//! Cancellation is orthogonal to settlement. A handle may carry a canceller installed
//! by the combinator that created it, and [`cancel`](Deferred::cancel) only forwards the
//! request to it. Work that already settled is unaffected; work that is halted stays
//! pending forever, so continuations attached to it never run.
use std::{
    cell::RefCell,
    fmt,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, ready},
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, LocalBoxFuture, Shared},
};
use pin_project_lite::pin_project;
use tracing::debug;

use crate::flow::Flow;

type SharedResult<T, E> = Shared<LocalBoxFuture<'static, Result<T, E>>>;
type Canceller = Rc<dyn Fn()>;

/// A handle over one asynchronous result.
///
/// Cloning a `Deferred` is cheap; clones observe the same settlement and share the
/// same canceller. A `Deferred` is itself a future and can be `.await`ed from any
/// future running on the same host.
#[must_use = "a deferred does nothing observable unless chained, awaited or cancelled"]
pub struct Deferred<T, E> {
    future: SharedResult<T, E>,
    canceller: Option<Canceller>,
    flow: Flow,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn pair(flow: Flow) -> (Resolver<T, E>, Self) {
        let (sender, receiver) = oneshot::channel();
        let future = async move {
            match receiver.await {
                Ok(result) => result,
                // Every resolver was dropped unsettled: the work was cancelled.
                Err(oneshot::Canceled) => future::pending().await,
            }
        }
        .boxed_local()
        .shared();
        let resolver = Resolver {
            sender: Rc::new(RefCell::new(Some(sender))),
        };
        let deferred = Deferred {
            future,
            canceller: None,
            flow,
        };
        (resolver, deferred)
    }

    pub(crate) fn with_canceller(mut self, canceller: impl Fn() + 'static) -> Self {
        self.canceller = Some(Rc::new(canceller));
        self
    }

    /// Returns the flow this handle schedules its continuations on.
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Attaches a success and a failure continuation.
    ///
    /// Exactly one of them runs, on a later turn, with the settled value or reason.
    /// Either may return a `Result` (an `Err` rejects the returned handle) or a
    /// `Deferred` whose settlement the returned handle adopts.
    pub fn then<U, R1, R2, F, G>(&self, on_success: F, on_failure: G) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R1 + 'static,
        G: FnOnce(E) -> R2 + 'static,
        R1: IntoOutcome<U, E>,
        R2: IntoOutcome<U, E>,
    {
        let (resolver, deferred) = self.flow.pending();
        let parent = self.future.clone();
        self.flow.spawn(Forward::new(
            async move {
                let outcome = match parent.await {
                    Ok(value) => on_success(value).into_outcome(),
                    Err(reason) => on_failure(reason).into_outcome(),
                };
                outcome.settle().await
            },
            resolver,
        ));
        deferred
    }

    /// Attaches a success continuation; failures pass through unchanged.
    pub fn next<U, R, F>(&self, on_success: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: IntoOutcome<U, E>,
    {
        self.then(on_success, Err::<U, E>)
    }

    /// Attaches a failure continuation; success values pass through unchanged.
    pub fn error<R, G>(&self, on_failure: G) -> Deferred<T, E>
    where
        G: FnOnce(E) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.then(Ok::<T, E>, on_failure)
    }

    /// Converts the failure reason, leaving success values untouched.
    pub fn map_err<E2, F>(&self, map: F) -> Deferred<T, E2>
    where
        E2: Clone + 'static,
        F: FnOnce(E) -> E2 + 'static,
    {
        let (resolver, deferred) = self.flow.pending();
        let parent = self.future.clone();
        self.flow
            .spawn(Forward::new(async move { parent.await.map_err(map) }, resolver));
        deferred
    }

    /// Requests cancellation of the work behind this handle.
    ///
    /// Only forwards the request to the canceller installed by the combinator that
    /// created the handle; handles produced by chaining carry none, so this is then a
    /// no-op. Cancellation is best-effort: code that is already running is never
    /// interrupted, and work that already settled keeps its result.
    pub fn cancel(&self) {
        if let Some(canceller) = &self.canceller {
            debug!("cancellation requested");
            canceller();
        }
    }

    /// Returns `true` if a canceller is installed on this handle.
    pub fn is_cancellable(&self) -> bool {
        self.canceller.is_some()
    }
}

impl<T, E> Clone for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn clone(&self) -> Self {
        Deferred {
            future: self.future.clone(),
            canceller: self.canceller.clone(),
            flow: self.flow.clone(),
        }
    }
}

impl<T, E> Future for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.poll_unpin(cx)
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("cancellable", &self.canceller.is_some())
            .finish_non_exhaustive()
    }
}

/// The resolve and reject entry points of a [`Deferred`] created with
/// [`Flow::pending`].
///
/// Only the first settlement counts; later calls are ignored and return `false`.
/// Dropping every clone without settling leaves the deferred pending forever.
pub struct Resolver<T, E> {
    sender: Rc<RefCell<Option<oneshot::Sender<Result<T, E>>>>>,
}

impl<T, E> Resolver<T, E> {
    /// Resolves the deferred with `value`.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects the deferred with `reason`.
    pub fn reject(&self, reason: E) -> bool {
        self.settle(Err(reason))
    }

    /// Settles the deferred with `result`. Returns `true` if this call settled it.
    pub fn settle(&self, result: Result<T, E>) -> bool {
        let sender = self.sender.borrow_mut().take();
        match sender {
            Some(sender) => {
                // Nobody may be listening any more; the settlement still happened.
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    /// Returns `true` once the deferred has been settled through any clone.
    pub fn is_settled(&self) -> bool {
        self.sender.borrow().is_none()
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Resolver {
            sender: Rc::clone(&self.sender),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// What a continuation produced: a result now, or a deferred to wait for.
pub enum Outcome<T, E> {
    Ready(Result<T, E>),
    Later(Deferred<T, E>),
}

impl<T, E> Outcome<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Returns `true` if the outcome still has to be waited for.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Later(_))
    }

    pub(crate) async fn settle(self) -> Result<T, E> {
        match self {
            Outcome::Ready(result) => result,
            Outcome::Later(deferred) => deferred.await,
        }
    }
}

/// Conversion into an [`Outcome`], implemented for the values a continuation may
/// return.
pub trait IntoOutcome<T, E> {
    fn into_outcome(self) -> Outcome<T, E>;

    /// Returns `true` if the value is a [`Deferred`] produced by this crate.
    fn is_deferred(&self) -> bool {
        false
    }
}

impl<T, E> IntoOutcome<T, E> for Result<T, E> {
    fn into_outcome(self) -> Outcome<T, E> {
        Outcome::Ready(self)
    }
}

impl<T, E> IntoOutcome<T, E> for Deferred<T, E> {
    fn into_outcome(self) -> Outcome<T, E> {
        Outcome::Later(self)
    }

    fn is_deferred(&self) -> bool {
        true
    }
}

impl<T, E> IntoOutcome<T, E> for Outcome<T, E> {
    fn into_outcome(self) -> Outcome<T, E> {
        self
    }

    fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Later(_))
    }
}

/// Returns `true` if `value` is a [`Deferred`] rather than a plain result.
pub fn is_deferred<T, E>(value: &impl IntoOutcome<T, E>) -> bool {
    value.is_deferred()
}

pin_project! {
    /// Drives a future and settles a resolver with its output.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub(crate) struct Forward<F, T, E> {
        #[pin]
        future: F,
        resolver: Option<Resolver<T, E>>,
    }
}

impl<F, T, E> Forward<F, T, E> {
    pub(crate) fn new(future: F, resolver: Resolver<T, E>) -> Self {
        Forward {
            future,
            resolver: Some(resolver),
        }
    }
}

impl<F, T, E> Future for Forward<F, T, E>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.future.poll(cx));
        if let Some(resolver) = this.resolver.take() {
            resolver.settle(result);
        }
        Poll::Ready(())
    }
}
