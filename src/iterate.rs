//! Bounded iteration: [`Flow::loop_`] over an index range and [`Flow::repeat`] for a
//! fixed count.
//!
//! Both are driven by one future on the host rather than by recursion, so iteration
//! counts in the tens of thousands never grow the call stack. `loop_` yields to the
//! scheduler after every synchronous iteration; `repeat` runs iterations back-to-back
//! and only yields once [`REPEAT_BUDGET`] of wall-clock time is used up in a turn.
use std::time::{Duration, Instant};

use tracing::trace;

use crate::{
    flow::Flow,
    task::{Deferred, IntoOutcome, Outcome},
};

/// Wall-clock time [`Flow::repeat`] may spend per scheduler turn.
pub const REPEAT_BUDGET: Duration = Duration::from_millis(20);

/// The inclusive index range a [`Flow::loop_`] visits.
///
/// A plain count `n` converts to `0..=n-1`. A step of zero or less is treated as one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRange {
    begin: i64,
    end: i64,
    step: i64,
}

impl LoopRange {
    /// Visits `0..=end` with a step of one.
    pub fn to(end: i64) -> Self {
        LoopRange {
            begin: 0,
            end,
            step: 1,
        }
    }

    /// Visits `count` indices starting at zero.
    pub fn count(count: i64) -> Self {
        Self::to(count.saturating_sub(1))
    }

    /// Sets the first index.
    pub fn begin(mut self, begin: i64) -> Self {
        self.begin = begin;
        self
    }

    /// Sets the distance between visited indices.
    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    fn visits(self) -> Visits {
        Visits {
            next: Some(self.begin),
            end: self.end,
            stride: self.step.max(1),
        }
    }
}

impl From<i64> for LoopRange {
    fn from(count: i64) -> Self {
        LoopRange::count(count)
    }
}

/// The parameters handed to every [`Flow::loop_`] iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopParams<T> {
    pub begin: i64,
    pub end: i64,
    /// The distance to the next index. On the last iteration it is shrunk to
    /// `end - index + 1`.
    pub step: i64,
    /// `true` on the final iteration only.
    pub last: bool,
    /// The value the previous iteration produced, `None` on the first one.
    pub prev: Option<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Visit {
    index: i64,
    last: bool,
    step: i64,
}

// Yields the indices of a loop range. The last visit is the one whose successor
// would pass `end`.
struct Visits {
    next: Option<i64>,
    end: i64,
    stride: i64,
}

impl Iterator for Visits {
    type Item = Visit;

    fn next(&mut self) -> Option<Visit> {
        let index = self.next.filter(|index| *index <= self.end)?;
        let following = index.checked_add(self.stride).filter(|next| *next <= self.end);
        self.next = following;
        Some(match following {
            Some(_) => Visit {
                index,
                last: false,
                step: self.stride,
            },
            None => Visit {
                index,
                last: true,
                step: self.end.saturating_sub(index).saturating_add(1),
            },
        })
    }
}

impl Flow {
    /// Calls `task` once per index of `range`, one iteration per scheduler turn.
    ///
    /// `task` receives the index and the [`LoopParams`]. If it returns a deferred, the
    /// loop waits for it before moving on and rejects right away if it rejects; a
    /// synchronous `Err` rejects the same way. Resolves with the last iteration's
    /// value, or `None` when the range is empty. Cancelling the returned deferred
    /// stops the loop before its next iteration.
    ///
    /// # Example
    /// ```
    /// # use std::rc::Rc;
    /// # use deferred_flow::{EventLoop, Flow, LoopRange};
    /// let event_loop = Rc::new(EventLoop::new());
    /// let flow = Flow::new(event_loop.clone());
    ///
    /// let sum = flow.loop_(LoopRange::to(4).step(2), |index, params| {
    ///     Ok::<_, ()>(params.prev.unwrap_or(0) + index)
    /// });
    ///
    /// assert_eq!(event_loop.run_until(&sum), Some(Ok(Some(6))));
    /// ```
    #[doc(alias = "loop")]
    pub fn loop_<T, E, R, F>(
        &self,
        range: impl Into<LoopRange>,
        mut task: F,
    ) -> Deferred<Option<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnMut(i64, &LoopParams<T>) -> R + 'static,
        R: IntoOutcome<T, E>,
    {
        let range = range.into();
        let flow = self.clone();
        self.drive(async move {
            flow.sleep(Duration::ZERO).await;
            let mut params = LoopParams {
                begin: range.begin,
                end: range.end,
                step: range.step.max(1),
                last: false,
                prev: None,
            };
            let mut result = None;
            for visit in range.visits() {
                trace!(index = visit.index, last = visit.last, "loop iteration");
                params.last = visit.last;
                params.step = visit.step;
                params.prev = result.take();
                match task(visit.index, &params).into_outcome() {
                    Outcome::Ready(value) => {
                        result = Some(value?);
                        flow.sleep(Duration::ZERO).await;
                    }
                    Outcome::Later(deferred) => result = Some(deferred.await?),
                }
            }
            Ok::<_, E>(result)
        })
    }

    /// Calls `task` `count` times with a 0-based counter.
    ///
    /// Iterations run back-to-back within a scheduler turn until [`REPEAT_BUDGET`] is
    /// spent, then the loop yields and resumes on the next turn. Resolves with the last
    /// value, or `None` when `count` is zero; the first `Err` rejects.
    pub fn repeat<T, E, F>(&self, count: usize, mut task: F) -> Deferred<Option<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnMut(usize) -> Result<T, E> + 'static,
    {
        let flow = self.clone();
        self.drive(async move {
            let mut result = None;
            let mut counter = 0;
            loop {
                flow.sleep(Duration::ZERO).await;
                let started = Instant::now();
                loop {
                    if counter >= count {
                        return Ok::<_, E>(result);
                    }
                    result = Some(task(counter)?);
                    counter += 1;
                    if started.elapsed() >= REPEAT_BUDGET {
                        break;
                    }
                }
                trace!(counter, "repeat budget spent, yielding");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visits(range: LoopRange) -> Vec<(i64, bool)> {
        range.visits().map(|visit| (visit.index, visit.last)).collect()
    }

    #[test]
    fn count_visits_every_index_once() {
        assert_eq!(visits(LoopRange::count(3)), vec![(0, false), (1, false), (2, true)]);
        assert_eq!(visits(LoopRange::count(1)), vec![(0, true)]);
        assert!(visits(LoopRange::count(0)).is_empty());
        assert!(visits(LoopRange::count(-4)).is_empty());
    }

    #[test]
    fn stride_landing_on_end() {
        assert_eq!(
            visits(LoopRange::to(4).step(2)),
            vec![(0, false), (2, false), (4, true)]
        );
    }

    #[test]
    fn stride_overshooting_end_marks_last_early() {
        let all: Vec<Visit> = LoopRange::to(5).step(3).visits().collect();
        assert_eq!(
            all,
            vec![
                Visit {
                    index: 0,
                    last: false,
                    step: 3
                },
                Visit {
                    index: 3,
                    last: true,
                    step: 3
                },
            ]
        );
    }

    #[test]
    fn last_step_shrinks_to_reach_end() {
        let last = LoopRange::to(4).step(3).visits().last();
        assert_eq!(
            last,
            Some(Visit {
                index: 3,
                last: true,
                step: 2
            })
        );
    }

    #[test]
    fn begin_after_end_is_empty() {
        assert!(visits(LoopRange::to(2).begin(3)).is_empty());
        assert_eq!(visits(LoopRange::to(0).begin(0)), vec![(0, true)]);
    }

    #[test]
    fn non_positive_step_advances_by_one() {
        assert_eq!(visits(LoopRange::to(1).step(0)), vec![(0, false), (1, true)]);
        assert_eq!(visits(LoopRange::to(1).step(-2)), vec![(0, false), (1, true)]);
    }

    #[test]
    fn index_overflow_ends_the_range() {
        assert_eq!(
            visits(LoopRange::to(i64::MAX).begin(i64::MAX - 1).step(5)),
            vec![(i64::MAX - 1, true)]
        );
    }
}
