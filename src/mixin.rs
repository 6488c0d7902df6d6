//! Publishes the combinators of a [`Flow`] under their names.
//!
//! A [`Namespace`] is a name-keyed table of combinators, each bound to the flow that
//! installed it. [`Flow::define`] fills one with the whole [`Method::ALL`] set or a
//! subset of it. Every name maps to an [`Entry`] that exposes only that combinator,
//! so looking up `wait` never hands out a way to loop.
use std::{fmt, hash::Hash, str::FromStr, time::Duration};

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::{
    chain::ChainStep,
    error::Error,
    flow::Flow,
    iterate::{LoopParams, LoopRange},
    join::Task,
    retry::{RetryFailed, RetryOptions},
    task::{Deferred, IntoOutcome},
};

/// The name of a combinator that can be installed on a [`Namespace`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Call,
    Next,
    Then,
    Parallel,
    All,
    Earlier,
    Wait,
    Chain,
    Retry,
    Loop,
    Repeat,
}

impl Method {
    /// Every installable combinator, in installation order.
    pub const ALL: [Method; 11] = [
        Method::Call,
        Method::Next,
        Method::Then,
        Method::Parallel,
        Method::All,
        Method::Earlier,
        Method::Wait,
        Method::Chain,
        Method::Retry,
        Method::Loop,
        Method::Repeat,
    ];

    /// Returns the name the method is defined under.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Call => "call",
            Method::Next => "next",
            Method::Then => "then",
            Method::Parallel => "parallel",
            Method::All => "all",
            Method::Earlier => "earlier",
            Method::Wait => "wait",
            Method::Chain => "chain",
            Method::Retry => "retry",
            Method::Loop => "loop",
            Method::Repeat => "repeat",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == name)
            .ok_or_else(|| Error::UnknownMethod(name.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// [`Flow::call`] bound to a flow.
#[derive(Clone, Debug)]
pub struct CallFn(Flow);

impl CallFn {
    /// Calls [`Flow::call`] on the bound flow.
    pub fn invoke<A, T, E, R, F>(&self, task: F, args: A) -> Deferred<T, E>
    where
        A: 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce(A) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.0.call(task, args)
    }
}

/// [`Flow::next`] bound to a flow. Installed as both `next` and `then`.
#[derive(Clone, Debug)]
pub struct NextFn(Flow);

impl NextFn {
    /// Calls [`Flow::next`] on the bound flow.
    pub fn invoke<T, E, R, F>(&self, task: F) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce() -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.0.next(task)
    }
}

/// [`Flow::all`] bound to a flow. Installed as both `all` and `parallel`.
#[derive(Clone, Debug)]
pub struct AllFn(Flow);

impl AllFn {
    /// Calls [`Flow::all`] on the bound flow.
    pub fn invoke<T, E, I>(&self, tasks: I) -> Deferred<Vec<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        self.0.all(tasks)
    }

    /// Calls [`Flow::all_keyed`] on the bound flow.
    pub fn invoke_keyed<K, T, E, I, V>(&self, tasks: I) -> Deferred<IndexMap<K, T>, E>
    where
        K: Hash + Eq + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = (K, V)>,
        V: Into<Task<T, E>>,
    {
        self.0.all_keyed(tasks)
    }
}

/// [`Flow::earlier`] bound to a flow.
#[derive(Clone, Debug)]
pub struct EarlierFn(Flow);

impl EarlierFn {
    /// Calls [`Flow::earlier`] on the bound flow.
    pub fn invoke<T, E, I>(&self, tasks: I) -> Deferred<Vec<Option<T>>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        self.0.earlier(tasks)
    }

    /// Calls [`Flow::earlier_keyed`] on the bound flow.
    pub fn invoke_keyed<K, T, E, I, V>(&self, tasks: I) -> Deferred<IndexMap<K, T>, E>
    where
        K: Hash + Eq + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = (K, V)>,
        V: Into<Task<T, E>>,
    {
        self.0.earlier_keyed(tasks)
    }
}

/// [`Flow::wait`] bound to a flow.
#[derive(Clone, Debug)]
pub struct WaitFn(Flow);

impl WaitFn {
    /// Calls [`Flow::wait`] on the bound flow.
    pub fn invoke<E>(&self, delay: Duration) -> Deferred<u64, E>
    where
        E: Clone + 'static,
    {
        self.0.wait(delay)
    }
}

/// [`Flow::chain`] bound to a flow.
#[derive(Clone, Debug)]
pub struct ChainFn(Flow);

impl ChainFn {
    /// Calls [`Flow::chain`] on the bound flow.
    pub fn invoke<T, E, I>(&self, steps: I) -> Deferred<T, E>
    where
        T: Clone + Default + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = ChainStep<T, E>>,
    {
        self.0.chain(steps)
    }
}

/// [`Flow::retry`] bound to a flow.
#[derive(Clone, Debug)]
pub struct RetryFn(Flow);

impl RetryFn {
    /// Calls [`Flow::retry`] on the bound flow.
    pub fn invoke<T, E, R, F>(
        &self,
        count: usize,
        attempt: F,
        options: RetryOptions,
    ) -> Deferred<T, RetryFailed<E>>
    where
        T: Clone + 'static,
        E: Clone + fmt::Debug + 'static,
        F: FnMut(usize) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.0.retry(count, attempt, options)
    }
}

/// [`Flow::loop_`] bound to a flow.
#[derive(Clone, Debug)]
pub struct LoopFn(Flow);

impl LoopFn {
    /// Calls [`Flow::loop_`] on the bound flow.
    pub fn invoke<T, E, R, F>(
        &self,
        range: impl Into<LoopRange>,
        task: F,
    ) -> Deferred<Option<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnMut(i64, &LoopParams<T>) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        self.0.loop_(range, task)
    }
}

/// [`Flow::repeat`] bound to a flow.
#[derive(Clone, Debug)]
pub struct RepeatFn(Flow);

impl RepeatFn {
    /// Calls [`Flow::repeat`] on the bound flow.
    pub fn invoke<T, E, F>(&self, count: usize, task: F) -> Deferred<Option<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnMut(usize) -> Result<T, E> + 'static,
    {
        self.0.repeat(count, task)
    }
}

/// One installed combinator.
#[derive(Clone, Debug)]
pub enum Entry {
    Call(CallFn),
    Next(NextFn),
    Then(NextFn),
    Parallel(AllFn),
    All(AllFn),
    Earlier(EarlierFn),
    Wait(WaitFn),
    Chain(ChainFn),
    Retry(RetryFn),
    Loop(LoopFn),
    Repeat(RepeatFn),
}

impl Entry {
    fn bind(method: Method, flow: Flow) -> Self {
        match method {
            Method::Call => Entry::Call(CallFn(flow)),
            Method::Next => Entry::Next(NextFn(flow)),
            Method::Then => Entry::Then(NextFn(flow)),
            Method::Parallel => Entry::Parallel(AllFn(flow)),
            Method::All => Entry::All(AllFn(flow)),
            Method::Earlier => Entry::Earlier(EarlierFn(flow)),
            Method::Wait => Entry::Wait(WaitFn(flow)),
            Method::Chain => Entry::Chain(ChainFn(flow)),
            Method::Retry => Entry::Retry(RetryFn(flow)),
            Method::Loop => Entry::Loop(LoopFn(flow)),
            Method::Repeat => Entry::Repeat(RepeatFn(flow)),
        }
    }

    /// Returns the name this entry is installed under.
    pub fn method(&self) -> Method {
        match self {
            Entry::Call(_) => Method::Call,
            Entry::Next(_) => Method::Next,
            Entry::Then(_) => Method::Then,
            Entry::Parallel(_) => Method::Parallel,
            Entry::All(_) => Method::All,
            Entry::Earlier(_) => Method::Earlier,
            Entry::Wait(_) => Method::Wait,
            Entry::Chain(_) => Method::Chain,
            Entry::Retry(_) => Method::Retry,
            Entry::Loop(_) => Method::Loop,
            Entry::Repeat(_) => Method::Repeat,
        }
    }
}

/// A table of combinators bound to the flow that defined them.
///
/// The typed getters return `None` unless that name was defined.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    entries: IndexMap<Method, Entry>,
}

impl Namespace {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry defined under `method`.
    pub fn get(&self, method: Method) -> Option<&Entry> {
        self.entries.get(&method)
    }

    /// Returns `true` if `method` was defined.
    pub fn contains(&self, method: Method) -> bool {
        self.entries.contains_key(&method)
    }

    /// Iterates over the defined names in the order they were first defined.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.entries.keys().copied()
    }

    /// Returns the number of defined names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `call` entry, if defined.
    pub fn call(&self) -> Option<&CallFn> {
        match self.get(Method::Call)? {
            Entry::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Returns the `next` entry, if defined.
    pub fn next(&self) -> Option<&NextFn> {
        match self.get(Method::Next)? {
            Entry::Next(next) => Some(next),
            _ => None,
        }
    }

    /// Returns the `then` entry, if defined.
    pub fn then(&self) -> Option<&NextFn> {
        match self.get(Method::Then)? {
            Entry::Then(then) => Some(then),
            _ => None,
        }
    }

    /// Returns the `parallel` entry, if defined.
    pub fn parallel(&self) -> Option<&AllFn> {
        match self.get(Method::Parallel)? {
            Entry::Parallel(parallel) => Some(parallel),
            _ => None,
        }
    }

    /// Returns the `all` entry, if defined.
    pub fn all(&self) -> Option<&AllFn> {
        match self.get(Method::All)? {
            Entry::All(all) => Some(all),
            _ => None,
        }
    }

    /// Returns the `earlier` entry, if defined.
    pub fn earlier(&self) -> Option<&EarlierFn> {
        match self.get(Method::Earlier)? {
            Entry::Earlier(earlier) => Some(earlier),
            _ => None,
        }
    }

    /// Returns the `wait` entry, if defined.
    pub fn wait(&self) -> Option<&WaitFn> {
        match self.get(Method::Wait)? {
            Entry::Wait(wait) => Some(wait),
            _ => None,
        }
    }

    /// Returns the `chain` entry, if defined.
    pub fn chain(&self) -> Option<&ChainFn> {
        match self.get(Method::Chain)? {
            Entry::Chain(chain) => Some(chain),
            _ => None,
        }
    }

    /// Returns the `retry` entry, if defined.
    pub fn retry(&self) -> Option<&RetryFn> {
        match self.get(Method::Retry)? {
            Entry::Retry(retry) => Some(retry),
            _ => None,
        }
    }

    /// Returns the `loop` entry, if defined.
    #[doc(alias = "loop")]
    pub fn loop_(&self) -> Option<&LoopFn> {
        match self.get(Method::Loop)? {
            Entry::Loop(looping) => Some(looping),
            _ => None,
        }
    }

    /// Returns the `repeat` entry, if defined.
    pub fn repeat(&self) -> Option<&RepeatFn> {
        match self.get(Method::Repeat)? {
            Entry::Repeat(repeat) => Some(repeat),
            _ => None,
        }
    }
}

impl Flow {
    /// Installs `methods` on `target`, bound to this flow.
    ///
    /// `None` for `methods` installs [`Method::ALL`]. A method that is already
    /// defined is rebound to this flow.
    ///
    /// # Errors
    /// Returns [`Error::NoTarget`] when there is no namespace to install on.
    pub fn define(
        &self,
        target: Option<&mut Namespace>,
        methods: Option<&[Method]>,
    ) -> Result<(), Error> {
        let target = target.ok_or(Error::NoTarget)?;
        for &method in methods.unwrap_or(&Method::ALL) {
            trace!(%method, "defining method");
            target.entries.insert(method, Entry::bind(method, self.clone()));
        }
        Ok(())
    }

    /// Like [`define`](Flow::define), taking method names. Unknown names are skipped.
    pub fn define_names<'a>(
        &self,
        target: Option<&mut Namespace>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), Error> {
        let methods: Vec<Method> = names
            .into_iter()
            .filter_map(|name| match name.parse() {
                Ok(method) => Some(method),
                Err(err) => {
                    warn!(%err, "skipping method");
                    None
                }
            })
            .collect();
        self.define(target, Some(&methods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_display() {
        for method in Method::ALL {
            assert_eq!(method.to_string().parse::<Method>(), Ok(method));
        }
        assert_eq!(Method::Loop.to_string(), "loop");
    }

    #[test]
    fn entries_report_the_name_they_were_bound_to() {
        let flow = Flow::new(std::rc::Rc::new(crate::scheduler::EventLoop::new()));
        for method in Method::ALL {
            assert_eq!(Entry::bind(method, flow.clone()).method(), method);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "register".parse::<Method>(),
            Err(Error::UnknownMethod("register".to_string()))
        );
        assert!("Next".parse::<Method>().is_err(), "Names are case sensitive");
    }
}
