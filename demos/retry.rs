use std::{cell::Cell, rc::Rc, time::Duration};

use deferred_flow::{EventLoop, Flow, RetryOptions};

fn main() {
    let event_loop = Rc::new(EventLoop::new());
    let flow = Flow::new(event_loop.clone());
    let calls = Rc::new(Cell::new(0));

    let counter = Rc::clone(&calls);
    let result = flow.retry(
        5,
        move |remaining| {
            counter.set(counter.get() + 1);
            println!("Attempt {}, {remaining} left", counter.get());
            // Flaky until the third call.
            if counter.get() < 3 {
                Err("connection refused")
            } else {
                Ok("connected")
            }
        },
        RetryOptions::with_wait(Duration::from_millis(100)),
    );

    match event_loop.run_until(&result) {
        Some(Ok(value)) => println!("Result: {value}"),
        Some(Err(failure)) => println!("{failure}: {}", failure.last_error()),
        None => println!("Retry was cancelled"),
    }
}
