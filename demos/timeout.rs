use std::{rc::Rc, time::Duration};

use deferred_flow::{EventLoop, Flow};

fn main() {
    let event_loop = Rc::new(EventLoop::new());
    let flow = Flow::new(event_loop.clone());

    // Work that takes longer than we are willing to wait.
    let work = flow
        .wait::<String>(Duration::from_secs(3))
        .next(|_| Ok("work finished".to_string()));
    let timeout = flow
        .wait(Duration::from_millis(500))
        .next(|_| Ok("timed out".to_string()));

    // Whichever settles first fills its slot, the other one stays empty.
    let race = flow.earlier([work, timeout]).next(|slots| {
        let winner = slots.into_iter().flatten().next().unwrap_or_default();
        println!("{winner}");
        Ok(())
    });

    event_loop.run_until(&race);
}
