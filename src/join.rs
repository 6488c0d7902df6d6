//! Fan-out combinators: [`Flow::all`] waits for every input, [`Flow::earlier`] for the
//! first one.
//!
//! Both accept any mix of deferreds and zero-argument functions ([`Task`]); functions
//! are started with [`Flow::next`] first. Each comes in a sequence form, whose result
//! keeps input order, and a keyed form over an [`IndexMap`], whose result keeps the
//! keys in insertion order. Cancelling the combined handle cancels every input.
use std::hash::Hash;

use futures::future;
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    flow::Flow,
    task::{Deferred, Forward, IntoOutcome, Outcome},
};

/// An input to a fan-out combinator.
pub enum Task<T, E> {
    /// Work that is already running.
    Deferred(Deferred<T, E>),
    /// Work to start on the next scheduler turn.
    Thunk(Box<dyn FnOnce() -> Outcome<T, E>>),
}

impl<T, E> Task<T, E> {
    /// Wraps a zero-argument function as a task.
    pub fn thunk<R, F>(task: F) -> Self
    where
        F: FnOnce() -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        Task::Thunk(Box::new(move || task().into_outcome()))
    }
}

impl<T, E> From<Deferred<T, E>> for Task<T, E> {
    fn from(deferred: Deferred<T, E>) -> Self {
        Task::Deferred(deferred)
    }
}

impl Flow {
    pub(crate) fn start<T, E>(&self, task: Task<T, E>) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        match task {
            Task::Deferred(deferred) => deferred,
            Task::Thunk(thunk) => self.next(thunk),
        }
    }

    fn start_all<T, E, I>(&self, tasks: I) -> Vec<Deferred<T, E>>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        tasks
            .into_iter()
            .map(|task| self.start(task.into()))
            .collect()
    }

    fn start_keyed<K, T, E, I, V>(&self, tasks: I) -> (Vec<K>, Vec<Deferred<T, E>>)
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = (K, V)>,
        V: Into<Task<T, E>>,
    {
        tasks
            .into_iter()
            .map(|(key, task)| (key, self.start(task.into())))
            .unzip()
    }

    /// Resolves with every input's value, in input order, once all of them resolved.
    ///
    /// Rejects as soon as any input rejects, with that reason; the other inputs keep
    /// running but are no longer waited for. An empty input resolves with an empty
    /// vector.
    pub fn all<T, E, I>(&self, tasks: I) -> Deferred<Vec<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        let handles = self.start_all(tasks);
        let (resolver, deferred) = self.pending();
        self.spawn(Forward::new(future::try_join_all(handles.clone()), resolver));
        deferred.with_canceller(move || handles.iter().for_each(Deferred::cancel))
    }

    /// Same as [`all`](Flow::all).
    pub fn parallel<T, E, I>(&self, tasks: I) -> Deferred<Vec<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        self.all(tasks)
    }

    /// Keyed form of [`all`](Flow::all): resolves with a map holding every key.
    pub fn all_keyed<K, T, E, I, V>(&self, tasks: I) -> Deferred<IndexMap<K, T>, E>
    where
        K: Hash + Eq + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = (K, V)>,
        V: Into<Task<T, E>>,
    {
        let (keys, handles) = self.start_keyed(tasks);
        let (resolver, deferred) = self.pending();
        let joined = future::try_join_all(handles.clone());
        self.spawn(Forward::new(
            async move {
                let values = joined.await?;
                let joined: IndexMap<K, T> = keys.into_iter().zip(values).collect();
                Ok::<_, E>(joined)
            },
            resolver,
        ));
        deferred.with_canceller(move || handles.iter().for_each(Deferred::cancel))
    }

    /// Resolves with the value of the first input to settle.
    ///
    /// The result has one slot per input; only the winner's slot is filled. As soon as
    /// an input resolves, every other input is cancelled. If the first input to settle
    /// rejects, the race rejects with its reason. An empty input resolves with an empty
    /// vector on the next turn.
    ///
    /// # Example
    /// ```
    /// # use std::{rc::Rc, time::Duration};
    /// # use deferred_flow::{EventLoop, Flow};
    /// let event_loop = Rc::new(EventLoop::new());
    /// let flow = Flow::new(event_loop.clone());
    ///
    /// // Time out after 10ms unless the work finishes first.
    /// let work = flow.wait::<()>(Duration::from_secs(5)).next(|_| Ok(0));
    /// let timeout = flow.wait(Duration::from_millis(10)).next(|_| Ok(1));
    /// let race = flow.earlier([timeout, work]);
    ///
    /// assert_eq!(event_loop.run_until(&race), Some(Ok(vec![Some(1), None])));
    /// ```
    pub fn earlier<T, E, I>(&self, tasks: I) -> Deferred<Vec<Option<T>>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Task<T, E>>,
    {
        let handles = self.start_all(tasks);
        if handles.is_empty() {
            return self.next(|| Ok(Vec::new()));
        }
        let len = handles.len();
        let (resolver, deferred) = self.pending();
        let siblings = handles.clone();
        self.spawn(Forward::new(
            async move {
                let (index, value) = race(siblings).await?;
                let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
                slots[index] = Some(value);
                Ok::<_, E>(slots)
            },
            resolver,
        ));
        deferred.with_canceller(move || handles.iter().for_each(Deferred::cancel))
    }

    /// Keyed form of [`earlier`](Flow::earlier): the map holds only the winner's key.
    pub fn earlier_keyed<K, T, E, I, V>(&self, tasks: I) -> Deferred<IndexMap<K, T>, E>
    where
        K: Hash + Eq + Clone + 'static,
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = (K, V)>,
        V: Into<Task<T, E>>,
    {
        let (mut keys, handles) = self.start_keyed(tasks);
        if handles.is_empty() {
            return self.next(|| Ok(IndexMap::new()));
        }
        let (resolver, deferred) = self.pending();
        let siblings = handles.clone();
        self.spawn(Forward::new(
            async move {
                let (index, value) = race(siblings).await?;
                let mut winner = IndexMap::with_capacity(1);
                winner.insert(keys.swap_remove(index), value);
                Ok::<_, E>(winner)
            },
            resolver,
        ));
        deferred.with_canceller(move || handles.iter().for_each(Deferred::cancel))
    }
}

// Waits for the first handle to settle. On success every other handle is cancelled.
async fn race<T, E>(handles: Vec<Deferred<T, E>>) -> Result<(usize, T), E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let siblings = handles.clone();
    let (result, index, _) = future::select_all(handles).await;
    let value = result?;
    debug!(index, "race settled");
    siblings
        .iter()
        .enumerate()
        .filter(|(position, _)| *position != index)
        .for_each(|(_, sibling)| sibling.cancel());
    Ok((index, value))
}
