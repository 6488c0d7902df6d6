//! Chainable, cancellable deferreds and control-flow combinators over Rust futures.
//!
//! `deferred-flow` builds asynchronous programs out of [`Deferred`] handles: values
//! that settle once with a result or a failure, to which continuations are attached
//! with `next`, `error` and `then`. Continuations always run on a later scheduler turn
//! and may return another deferred, whose settlement is adopted.
//!
//! The crate does not depend on a specific async runtime. Every [`Flow`] is built over
//! a host [`Scheduler`]; [`EventLoop`] is the bundled single-threaded host, and any
//! local executor with a timer can implement the trait instead.
//!
//! Features include:
//! - Factories: [`Flow::pending`], [`Flow::next`], [`Flow::call`], [`Flow::from_future`]
//! - Fan-out: [`Flow::all`] and [`Flow::earlier`], over sequences or keyed maps
//! - Timing and iteration: [`Flow::wait`], [`Flow::loop_`], [`Flow::repeat`]
//! - Recovery: [`Flow::retry`] with a bounded attempt count
//! - Pipelines: [`Flow::chain`] over declarative [`ChainStep`]s
//! - Adapters: [`Flow::connect`] for callback-style functions
//!
//! Cancellation is best-effort. A handle created by a combinator that can stop its own
//! work carries a canceller, and [`Deferred::cancel`] forwards to it; cancelled work
//! stays pending forever.
//!
//! # Example
//! ```
//! # use std::{rc::Rc, time::Duration};
//! # use deferred_flow::{EventLoop, Flow};
//! let event_loop = Rc::new(EventLoop::new());
//! let flow = Flow::new(event_loop.clone());
//!
//! let greeting = flow
//!     .wait::<String>(Duration::from_millis(5))
//!     .next(|_| Ok("hello".to_string()))
//!     .next(|word| Err::<usize, _>(format!("{word} failed")))
//!     .error(|reason| Ok(reason.len()));
//!
//! assert_eq!(event_loop.run_until(&greeting), Some(Ok(12)));
//! ```

pub mod chain;
pub mod connect;
pub mod error;
pub mod flow;
pub mod iterate;
pub mod join;
pub mod mixin;
pub mod retry;
pub mod scheduler;
pub mod task;
pub mod task_ext;
pub mod timing;

pub use chain::{Aggregate, ChainStep, Joined};
pub use connect::{Arg, ConnectOptions, Connected};
pub use error::Error;
pub use flow::Flow;
pub use iterate::{LoopParams, LoopRange, REPEAT_BUDGET};
pub use join::Task;
pub use mixin::{
    AllFn, CallFn, ChainFn, EarlierFn, Entry, LoopFn, Method, Namespace, NextFn, RepeatFn,
    RetryFn, WaitFn,
};
pub use retry::{RetryFailed, RetryOptions};
pub use scheduler::{Callback, EventLoop, Scheduler, TimerId};
pub use task::{Deferred, IntoOutcome, Outcome, Resolver, is_deferred};
pub use task_ext::DeferredExt;
pub use timing::Sleep;
