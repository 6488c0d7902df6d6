//! Adapts callback-style functions into functions returning a [`Deferred`].
//!
//! [`Flow::connect`] wraps a function that reports completion through callbacks
//! passed among its arguments. Calling the wrapper builds the argument list (bound
//! leading arguments, then the call's own), splices the success and failure callbacks
//! in at their configured positions, and runs the function on the next scheduler turn.
//! The returned deferred resolves with whatever the success callback receives, or
//! rejects with whatever the failure callback receives.
use std::{fmt, rc::Rc, time::Duration};

use crate::{
    flow::Flow,
    task::{Deferred, Resolver},
};

/// A completion callback handed to a connected function.
pub type Callback<V> = Rc<dyn Fn(Vec<V>)>;

/// One argument of a connected function.
pub enum Arg<A, V, W> {
    /// An ordinary argument.
    Value(A),
    /// Resolves the deferred with the values it is called with.
    Success(Callback<V>),
    /// Rejects the deferred with the values it is called with.
    Failure(Callback<W>),
}

impl<A, V, W> Arg<A, V, W> {
    /// Returns the argument if this is a [`Arg::Value`].
    pub fn value(&self) -> Option<&A> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Takes the argument out of a [`Arg::Value`].
    pub fn into_value(self) -> Option<A> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the callback of a [`Arg::Success`].
    pub fn success(&self) -> Option<&Callback<V>> {
        match self {
            Arg::Success(callback) => Some(callback),
            _ => None,
        }
    }

    /// Returns the callback of a [`Arg::Failure`].
    pub fn failure(&self) -> Option<&Callback<W>> {
        match self {
            Arg::Failure(callback) => Some(callback),
            _ => None,
        }
    }
}

impl<A: fmt::Debug, V, W> fmt::Debug for Arg<A, V, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Success(_) => f.write_str("Success(..)"),
            Arg::Failure(_) => f.write_str("Failure(..)"),
        }
    }
}

/// How [`Flow::connect`] builds the argument list.
#[derive(Clone, Debug)]
pub struct ConnectOptions<A> {
    args: Vec<A>,
    ok: Option<usize>,
    ng: Option<usize>,
}

impl<A> ConnectOptions<A> {
    /// Prepends `args` to the arguments of every call.
    pub fn with_args(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Inserts the success callback at `index`. By default it goes after every argument.
    pub fn success_at(mut self, index: usize) -> Self {
        self.ok = Some(index);
        self
    }

    /// Inserts a failure callback at `index`, counted after the success callback was
    /// inserted. Without one, failures are never reported through the deferred.
    pub fn failure_at(mut self, index: usize) -> Self {
        self.ng = Some(index);
        self
    }
}

impl<A> Default for ConnectOptions<A> {
    fn default() -> Self {
        ConnectOptions {
            args: Vec::new(),
            ok: None,
            ng: None,
        }
    }
}

type Connectable<A, V, W> = Rc<dyn Fn(Vec<Arg<A, V, W>>)>;

/// A callback-style function turned into one that returns a [`Deferred`].
pub struct Connected<A, V, W> {
    flow: Flow,
    function: Connectable<A, V, W>,
    options: ConnectOptions<A>,
}

impl<A, V, W> Connected<A, V, W>
where
    A: Clone + 'static,
    V: Clone + 'static,
    W: Clone + 'static,
{
    /// Calls the wrapped function with `args` on the next scheduler turn.
    ///
    /// Cancelling the returned deferred before that turn keeps the function from
    /// being called.
    pub fn call(&self, args: impl IntoIterator<Item = A>) -> Deferred<Vec<V>, Vec<W>> {
        let (resolver, deferred) = self.flow.pending();
        let list = arrange(
            self.options.args.iter().cloned().chain(args),
            &self.options,
            &resolver,
        );
        let function = Rc::clone(&self.function);
        let timer = self
            .flow
            .scheduler()
            .schedule(Duration::ZERO, Box::new(move || function(list)));
        let scheduler = Rc::clone(self.flow.scheduler());
        deferred.with_canceller(move || scheduler.cancel(timer))
    }
}

impl<A, V, W> fmt::Debug for Connected<A, V, W>
where
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn arrange<A, V, W>(
    args: impl Iterator<Item = A>,
    options: &ConnectOptions<A>,
    resolver: &Resolver<Vec<V>, Vec<W>>,
) -> Vec<Arg<A, V, W>>
where
    V: 'static,
    W: 'static,
{
    let mut list: Vec<Arg<A, V, W>> = args.map(Arg::Value).collect();

    let on_success = resolver.clone();
    let at = options.ok.unwrap_or(list.len()).min(list.len());
    list.insert(
        at,
        Arg::Success(Rc::new(move |values| {
            on_success.resolve(values);
        })),
    );

    if let Some(index) = options.ng {
        let on_failure = resolver.clone();
        let at = index.min(list.len());
        list.insert(
            at,
            Arg::Failure(Rc::new(move |values| {
                on_failure.reject(values);
            })),
        );
    }
    list
}

impl Flow {
    /// Wraps a callback-style function, see the [module docs](crate::connect).
    ///
    /// # Example
    /// ```
    /// # use std::rc::Rc;
    /// # use deferred_flow::{Arg, ConnectOptions, EventLoop, Flow};
    /// let event_loop = Rc::new(EventLoop::new());
    /// let flow = Flow::new(event_loop.clone());
    ///
    /// // add(a, b, callback)
    /// let add = flow.connect(
    ///     |args: Vec<Arg<i32, i32, ()>>| {
    ///         let sum = args.iter().filter_map(Arg::value).sum();
    ///         if let Some(callback) = args.iter().find_map(Arg::success) {
    ///             callback(vec![sum]);
    ///         }
    ///     },
    ///     ConnectOptions::default(),
    /// );
    ///
    /// assert_eq!(event_loop.run_until(&add.call([2, 3])), Some(Ok(vec![5])));
    /// ```
    pub fn connect<A, V, W, F>(
        &self,
        function: F,
        options: ConnectOptions<A>,
    ) -> Connected<A, V, W>
    where
        F: Fn(Vec<Arg<A, V, W>>) + 'static,
    {
        Connected {
            flow: self.clone(),
            function: Rc::new(function),
            options,
        }
    }

    /// Like [`connect`](Flow::connect), with `target` passed to every call as the
    /// invocation context.
    pub fn connect_with<S, A, V, W, F>(
        &self,
        target: Rc<S>,
        function: F,
        options: ConnectOptions<A>,
    ) -> Connected<A, V, W>
    where
        S: ?Sized + 'static,
        F: Fn(&S, Vec<Arg<A, V, W>>) + 'static,
    {
        self.connect(move |args| function(&*target, args), options)
    }
}
