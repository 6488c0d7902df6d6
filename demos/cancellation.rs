use std::{rc::Rc, time::Duration};

use deferred_flow::{EventLoop, Flow, LoopRange};

fn main() {
    let event_loop = Rc::new(EventLoop::new());
    let flow = Flow::new(event_loop.clone());

    let looping = flow.loop_(LoopRange::count(1_000_000), |index, _| {
        if index % 1000 == 0 {
            println!("Iteration {index}");
        }
        Ok::<_, ()>(index)
    });

    // Allow the loop to run for a while before cancelling it.
    let canceller = looping.clone();
    let _ = flow.wait::<()>(Duration::from_millis(50)).next(move |_| {
        canceller.cancel();
        println!("Loop cancelled");
        Ok(())
    });

    // A cancelled loop never settles.
    assert_eq!(event_loop.run_until(&looping), None);
}
