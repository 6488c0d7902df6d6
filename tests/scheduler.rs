use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use deferred_flow::{Callback, Flow, LoopRange, Scheduler, TimerId};
use futures::future::LocalBoxFuture;
use tokio::task::{AbortHandle, LocalSet};

// Runs deferreds on a tokio `LocalSet`: timers are sleeping local tasks and
// cancelling one aborts its task.
#[derive(Default)]
struct TokioHost {
    next_id: Cell<u64>,
    timers: Rc<RefCell<HashMap<u64, AbortHandle>>>,
}

impl Scheduler for TokioHost {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let timers = Rc::clone(&self.timers);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            timers.borrow_mut().remove(&id);
            callback();
        });
        self.timers.borrow_mut().insert(id, task.abort_handle());
        TimerId::new(id)
    }

    fn cancel(&self, timer: TimerId) {
        if let Some(task) = self.timers.borrow_mut().remove(&timer.get()) {
            task.abort();
        }
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        let _ = tokio::task::spawn_local(future);
    }
}

fn flow() -> Flow {
    Flow::new(Rc::new(TokioHost::default()))
}

#[tokio::test]
async fn deferreds_settle_on_a_tokio_host() {
    LocalSet::new()
        .run_until(async {
            let flow = flow();
            let result = flow
                .next(|| Ok::<_, String>(2))
                .next(|value| Ok(value * 21))
                .await;
            assert_eq!(result, Ok(42), "Result should be 42");
        })
        .await;
}

#[tokio::test]
async fn timeout_race_on_a_tokio_host() {
    LocalSet::new()
        .run_until(async {
            let flow = flow();
            let work = flow.wait::<()>(Duration::from_secs(10)).next(|_| Ok("work"));
            let timeout = flow.wait(Duration::from_millis(10)).next(|_| Ok("timeout"));

            let slots = flow.earlier([work, timeout]).await;
            assert_eq!(slots, Ok(vec![None, Some("timeout")]), "Timeout should win");
        })
        .await;
}

#[tokio::test]
async fn cancelled_timer_never_fires_on_a_tokio_host() {
    LocalSet::new()
        .run_until(async {
            let flow = flow();
            let ran = Rc::new(Cell::new(false));
            let flag = Rc::clone(&ran);

            let task = flow.next(move || {
                flag.set(true);
                Ok::<_, ()>(())
            });
            task.cancel();
            tokio::time::sleep(Duration::from_millis(10)).await;

            assert!(!ran.get(), "Cancelled task should not run");
        })
        .await;
}

#[tokio::test]
async fn loops_run_on_a_tokio_host() {
    LocalSet::new()
        .run_until(async {
            let flow = flow();
            let sum = flow
                .loop_(LoopRange::count(100), |index, params| {
                    Ok::<_, ()>(params.prev.unwrap_or(0) + index)
                })
                .await;
            assert_eq!(sum, Ok(Some(4950)));
        })
        .await;
}
