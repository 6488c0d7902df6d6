//! Declarative pipelines: [`Flow::chain`] composes a list of [`ChainStep`]s left to
//! right into one deferred.

use indexmap::IndexMap;

use crate::{
    flow::Flow,
    join::Task,
    task::{Deferred, IntoOutcome, Outcome},
};

/// A group of tasks a [`ChainStep::Join`] runs with [`Flow::all`].
pub enum Aggregate<T, E> {
    List(Vec<Task<T, E>>),
    Keyed(IndexMap<String, Task<T, E>>),
}

/// The values of an [`Aggregate`], in the same shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Joined<T> {
    List(Vec<T>),
    Keyed(IndexMap<String, T>),
}

/// One step of a [`Flow::chain`].
pub enum ChainStep<T, E> {
    /// Runs on the previous step's value; failures skip it.
    Success(Box<dyn FnOnce(T) -> Outcome<T, E>>),
    /// Runs on the previous step's failure; values skip it.
    Failure(Box<dyn FnOnce(E) -> Outcome<T, E>>),
    /// On the previous step's value, runs every task and collects their values.
    Join {
        tasks: Aggregate<T, E>,
        collect: Box<dyn FnOnce(Joined<T>) -> T>,
    },
}

impl<T: 'static, E: 'static> ChainStep<T, E> {
    /// A step that runs when the chain so far resolved.
    pub fn success<R, F>(step: F) -> Self
    where
        F: FnOnce(T) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        ChainStep::Success(Box::new(move |value| step(value).into_outcome()))
    }

    /// A step that recovers from a rejection; resolved values skip it.
    pub fn failure<R, G>(step: G) -> Self
    where
        G: FnOnce(E) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        ChainStep::Failure(Box::new(move |reason| step(reason).into_outcome()))
    }

    /// Joins `tasks`, turning their values into the chain's value with `From`.
    pub fn join(tasks: Aggregate<T, E>) -> Self
    where
        T: From<Joined<T>>,
    {
        Self::join_with(tasks, |joined| T::from(joined))
    }

    /// Joins `tasks` and converts the joined values with `collect`.
    pub fn join_with(
        tasks: Aggregate<T, E>,
        collect: impl FnOnce(Joined<T>) -> T + 'static,
    ) -> Self {
        ChainStep::Join {
            tasks,
            collect: Box::new(collect),
        }
    }
}

impl Flow {
    /// Builds a pipeline out of `steps`.
    ///
    /// The pipeline starts on the next turn with `T::default()` and feeds every step
    /// the previous one's outcome. A failure skips ahead to the next
    /// [`ChainStep::Failure`], whose return value resumes the pipeline.
    ///
    /// # Example
    /// ```
    /// # use std::rc::Rc;
    /// # use deferred_flow::{ChainStep, EventLoop, Flow};
    /// let event_loop = Rc::new(EventLoop::new());
    /// let flow = Flow::new(event_loop.clone());
    ///
    /// let pipeline = flow.chain([
    ///     ChainStep::success(|_: i32| Ok(1)),
    ///     ChainStep::success(|_: i32| Err("boom")),
    ///     ChainStep::success(|value: i32| Ok(value * 100)),
    ///     ChainStep::failure(|_| Ok(2)),
    ///     ChainStep::success(|value: i32| Ok(value + 1)),
    /// ]);
    ///
    /// assert_eq!(event_loop.run_until(&pipeline), Some(Ok(3)));
    /// ```
    pub fn chain<T, E, I>(&self, steps: I) -> Deferred<T, E>
    where
        T: Clone + Default + 'static,
        E: Clone + 'static,
        I: IntoIterator<Item = ChainStep<T, E>>,
    {
        let mut chain = self.next(|| Ok(T::default()));
        for step in steps {
            chain = match step {
                ChainStep::Success(step) => chain.next(step),
                ChainStep::Failure(step) => chain.error(step),
                ChainStep::Join { tasks, collect } => {
                    let flow = self.clone();
                    chain.next(move |_| {
                        flow.join(tasks)
                            .next(move |joined| Ok(collect(joined)))
                    })
                }
            };
        }
        chain
    }

    /// Runs [`Flow::all`] or [`Flow::all_keyed`] depending on the aggregate's shape.
    pub fn join<T, E>(&self, tasks: Aggregate<T, E>) -> Deferred<Joined<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        match tasks {
            Aggregate::List(tasks) => self.all(tasks).next(|values| Ok(Joined::List(values))),
            Aggregate::Keyed(tasks) => self
                .all_keyed(tasks)
                .next(|values| Ok(Joined::Keyed(values))),
        }
    }
}
