use std::{cell::RefCell, rc::Rc, time::Duration};

use deferred_flow::{DeferredExt, EventLoop, Flow, Task};
use indexmap::IndexMap;

fn setup() -> (Rc<EventLoop>, Flow) {
    let event_loop = Rc::new(EventLoop::new());
    let flow = Flow::new(event_loop.clone());
    (event_loop, flow)
}

#[test]
fn all_keeps_input_order() {
    let (event_loop, flow) = setup();

    let slow = flow.wait::<()>(Duration::from_millis(20)).next(|_| Ok(1));
    let fast = flow.next(|| Ok(2));
    let joined = flow.all([slow, fast]);

    assert_eq!(
        event_loop.run_until(&joined),
        Some(Ok(vec![1, 2])),
        "Values should be in input order, not completion order"
    );
}

#[test]
fn all_accepts_thunks() {
    let (event_loop, flow) = setup();

    let joined = flow.all([
        Task::thunk(|| Ok::<_, ()>(1)),
        Task::from(flow.next(|| Ok(2))),
        Task::thunk({
            let flow = flow.clone();
            move || flow.wait(Duration::from_millis(1)).next(|_| Ok(3))
        }),
    ]);

    assert_eq!(event_loop.run_until(&joined), Some(Ok(vec![1, 2, 3])));
}

#[test]
fn all_of_nothing_resolves_empty() {
    let (event_loop, flow) = setup();

    let joined = flow.all(Vec::<Task<i32, ()>>::new());

    assert_eq!(event_loop.run_until(&joined), Some(Ok(vec![])));
}

#[test]
fn all_keyed_of_nothing_resolves_an_empty_map() {
    let (event_loop, flow) = setup();

    let joined = flow.all_keyed(IndexMap::<&str, Task<i32, ()>>::new());

    assert_eq!(event_loop.run_until(&joined), Some(Ok(IndexMap::new())));
}

#[test]
fn all_rejects_with_the_first_rejection() {
    let (event_loop, flow) = setup();

    let joined = flow.parallel([
        flow.wait(Duration::from_millis(20)).next(|_| Ok(1)),
        flow.next(|| Err("boom")),
    ]);

    assert_eq!(event_loop.run_until(&joined), Some(Err("boom")));
}

#[test]
fn all_keyed_keeps_insertion_order() {
    let (event_loop, flow) = setup();
    let mut tasks = IndexMap::new();
    tasks.insert("b", flow.wait::<()>(Duration::from_millis(10)).next(|_| Ok(2)));
    tasks.insert("a", flow.next(|| Ok(1)));

    let joined = flow.all_keyed(tasks);
    let values = event_loop.run_until(&joined).map(|result| {
        result.map(|map| map.into_iter().collect::<Vec<_>>())
    });

    assert_eq!(values, Some(Ok(vec![("b", 2), ("a", 1)])));
}

#[test]
fn cancelling_all_cancels_every_input() {
    let (event_loop, flow) = setup();
    let ran = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&ran);

    let timer = flow.wait::<()>(Duration::from_millis(50));
    let _ = timer.next(move |_| {
        *flag.borrow_mut() = true;
        Ok(())
    });
    let joined = flow.all([timer]);
    joined.cancel();

    assert_eq!(event_loop.run_until(&joined), None);
    assert!(!*ran.borrow(), "Cancelled input should never settle");
}

#[test]
fn earlier_fills_only_the_winner_and_cancels_the_rest() {
    let (event_loop, flow) = setup();

    let slow = flow.wait::<()>(Duration::from_secs(5));
    let fast = flow.wait(Duration::from_millis(5));
    let race = flow.earlier([slow, fast]);

    let slots = event_loop
        .run_until(&race)
        .and_then(Result::ok)
        .unwrap_or_default();
    assert_eq!(slots.len(), 2);
    assert!(slots[0].is_none(), "Loser slot should be empty");
    assert!(slots[1].is_some(), "Winner slot should hold its value");
    assert_eq!(event_loop.pending_timers(), 0, "Loser timer should be cleared");
}

#[test]
fn earlier_rejects_when_the_first_settlement_rejects() {
    let (event_loop, flow) = setup();

    let race = flow.earlier([
        flow.wait(Duration::from_millis(20)).next(|_| Ok(1)),
        flow.next(|| Err("first")),
    ]);

    assert_eq!(event_loop.run_until(&race), Some(Err("first")));
}

#[test]
fn earlier_of_nothing_resolves_empty() {
    let (event_loop, flow) = setup();

    let race = flow.earlier(Vec::<Task<i32, ()>>::new());

    assert_eq!(event_loop.run_until(&race), Some(Ok(vec![])));
}

#[test]
fn earlier_keyed_holds_only_the_winner() {
    let (event_loop, flow) = setup();
    let mut tasks = IndexMap::new();
    tasks.insert("slow", flow.wait::<()>(Duration::from_secs(5)).next(|_| Ok("slow")));
    tasks.insert("fast", flow.next(|| Ok("fast")));

    let race = flow.earlier_keyed(tasks);
    let winner = event_loop
        .run_until(&race)
        .map(|result| result.map(|map| map.into_iter().collect::<Vec<_>>()));

    assert_eq!(winner, Some(Ok(vec![("fast", "fast")])));
}

#[test]
fn cancelling_earlier_cancels_every_input() {
    let (event_loop, flow) = setup();

    let race = flow.earlier([
        flow.wait::<()>(Duration::from_millis(30)),
        flow.wait(Duration::from_millis(40)),
    ]);
    race.cancel();

    assert_eq!(event_loop.run_until(&race), None);
    assert_eq!(event_loop.pending_timers(), 0);
}

#[test]
fn handle_level_all_waits_for_the_receiver() {
    let (event_loop, flow) = setup();
    let order = Rc::new(RefCell::new(Vec::new()));
    let (first, second) = (Rc::clone(&order), Rc::clone(&order));

    let joined = flow
        .next(move || {
            first.borrow_mut().push("receiver");
            Ok::<_, ()>(())
        })
        .all([Task::thunk(move || {
            second.borrow_mut().push("input");
            Ok(1)
        })]);

    assert_eq!(event_loop.run_until(&joined), Some(Ok(vec![1])));
    assert_eq!(*order.borrow(), vec!["receiver", "input"]);
}

#[test]
fn handle_level_wait_resolves_with_elapsed_time() {
    let (event_loop, flow) = setup();

    let waited = flow
        .next_turn::<()>()
        .wait(Duration::from_millis(5))
        .next(|elapsed| Ok(elapsed >= 5));

    assert_eq!(event_loop.run_until(&waited), Some(Ok(true)));
}
