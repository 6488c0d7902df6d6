use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use deferred_flow::{DeferredExt, EventLoop, Flow, RetryFailed, RetryOptions};

fn setup() -> (Rc<EventLoop>, Flow) {
    let event_loop = Rc::new(EventLoop::new());
    let flow = Flow::new(event_loop.clone());
    (event_loop, flow)
}

#[test]
fn retry_resolves_once_an_attempt_succeeds() {
    let (event_loop, flow) = setup();
    let attempts = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&attempts);

    let result = flow.retry(
        5,
        move |remaining| {
            record.borrow_mut().push(remaining);
            if record.borrow().len() < 3 {
                Err("not yet")
            } else {
                Ok(42)
            }
        },
        RetryOptions::default(),
    );

    assert_eq!(event_loop.run_until(&result), Some(Ok(42)));
    assert_eq!(*attempts.borrow(), vec![5, 4, 3]);
}

#[test]
fn retry_gives_up_with_the_last_error() {
    let (event_loop, flow) = setup();
    let attempts = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&attempts);

    let result = flow.retry(
        3,
        move |remaining| {
            record.borrow_mut().push(remaining);
            Err::<(), _>(remaining)
        },
        RetryOptions::default(),
    );

    let failure = match event_loop.run_until(&result) {
        Some(Err(failure)) => failure,
        other => panic!("Retry should have failed, got {other:?}"),
    };
    assert_eq!(*attempts.borrow(), vec![3, 2, 1]);
    assert_eq!(failure.message(), RetryFailed::<usize>::MESSAGE);
    assert_eq!(failure.to_string(), "retry failed");
    assert_eq!(failure.last_error(), &1);
    assert_eq!(failure.into_parts(), ("retry failed", 1));
}

#[test]
fn zero_count_still_attempts_once() {
    let (event_loop, flow) = setup();
    let attempts = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&attempts);

    let result = flow.retry(
        0,
        move |_| {
            *counter.borrow_mut() += 1;
            Err::<(), _>("nope")
        },
        RetryOptions::default(),
    );

    assert!(matches!(event_loop.run_until(&result), Some(Err(_))));
    assert_eq!(*attempts.borrow(), 1);
}

#[test]
fn attempts_may_return_deferreds() {
    let (event_loop, flow) = setup();
    let inner = flow.clone();

    let result = flow.retry(
        3,
        move |remaining| {
            inner
                .wait::<String>(Duration::from_millis(1))
                .next(move |_| match remaining {
                    1 => Ok("third time"),
                    _ => Err(format!("{remaining} left")),
                })
        },
        RetryOptions::default(),
    );

    assert_eq!(event_loop.run_until(&result), Some(Ok("third time")));
}

#[test]
fn retry_waits_between_attempts() {
    let (event_loop, flow) = setup();

    let started = Instant::now();
    let result = flow.retry(
        3,
        |_| Err::<(), _>(()),
        RetryOptions::with_wait(Duration::from_millis(10)),
    );
    event_loop.run_until(&result);

    assert!(
        started.elapsed() >= Duration::from_millis(20),
        "Two waits should separate three attempts"
    );
}

#[test]
fn cancel_stops_further_attempts() {
    let (event_loop, flow) = setup();
    let attempts = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&attempts);

    let result = flow.retry(
        10,
        move |_| {
            *counter.borrow_mut() += 1;
            Err::<(), _>(())
        },
        RetryOptions::with_wait(Duration::from_secs(5)),
    );
    let canceller = result.clone();
    let _ = flow
        .wait::<()>(Duration::from_millis(5))
        .next(move |_| {
            canceller.cancel();
            Ok(())
        });

    let started = Instant::now();
    assert_eq!(event_loop.run_until(&result), None);
    assert_eq!(*attempts.borrow(), 1);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "Pending wait should have been cleared"
    );
}

#[test]
fn retry_failure_can_be_mapped_back() {
    let (event_loop, flow) = setup();

    let result = flow
        .retry(2, |remaining| Err::<(), _>(remaining * 10), RetryOptions::default())
        .map_err(|failure| failure.into_parts().1);

    assert_eq!(event_loop.run_until(&result), Some(Err(10)));
}

#[test]
fn maximal_wait_stops_after_the_first_attempt() {
    let (event_loop, flow) = setup();
    let attempts = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&attempts);

    let result = flow.retry(
        3,
        move |_| {
            *counter.borrow_mut() += 1;
            Err::<(), _>(())
        },
        RetryOptions::with_wait(Duration::MAX),
    );

    assert_eq!(event_loop.run_until(&result), None);
    assert_eq!(*attempts.borrow(), 1);

    result.cancel();
    event_loop.run();
    assert_eq!(event_loop.pending_timers(), 0, "Aborted retry should clear its wait");
}

#[test]
fn handle_level_retry_runs_after_the_receiver() {
    let (event_loop, flow) = setup();
    let order = Rc::new(RefCell::new(Vec::new()));
    let (receiver, attempt) = (Rc::clone(&order), Rc::clone(&order));

    let result = flow
        .next(move || {
            receiver.borrow_mut().push(0);
            Ok::<_, usize>(())
        })
        .retry(
            3,
            move |remaining| {
                attempt.borrow_mut().push(remaining);
                if remaining > 2 {
                    Err(remaining)
                } else {
                    Ok("done")
                }
            },
            RetryOptions::default(),
            |failure| failure.into_parts().1,
        );

    assert_eq!(event_loop.run_until(&result), Some(Ok("done")));
    assert_eq!(*order.borrow(), vec![0, 3, 2]);
}

#[test]
fn handle_level_retry_maps_exhaustion_and_passes_failures_on() {
    let (event_loop, flow) = setup();

    let exhausted = flow.next_turn::<String>().retry(
        2,
        |remaining| Err::<(), _>(format!("{remaining} left")),
        RetryOptions::default(),
        |failure| format!("gave up after {}", failure.last_error()),
    );
    assert_eq!(
        event_loop.run_until(&exhausted),
        Some(Err("gave up after 1 left".to_string()))
    );

    let attempted = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&attempted);
    let skipped = flow.next(|| Err::<(), _>("receiver".to_string())).retry(
        2,
        move |_| {
            *flag.borrow_mut() = true;
            Ok::<_, String>(())
        },
        RetryOptions::default(),
        |failure| failure.into_parts().1,
    );
    assert_eq!(event_loop.run_until(&skipped), Some(Err("receiver".to_string())));
    assert!(!*attempted.borrow(), "Failed receiver should skip the retry");
}
