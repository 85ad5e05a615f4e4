use super::*;

fn callback(tag: &str) -> Value {
    Value::from(tag)
}

fn drain(queue: &TimerQueue, until: f64) -> Vec<String> {
    let mut fired = Vec::new();
    while let Some(due) = queue.pop_due(until) {
        fired.push(due.callback.to_js_string());
    }
    queue.settle_clock(until);
    fired
}

#[test]
fn timers_fire_in_due_order_then_registration_order() {
    let queue = TimerQueue::default();
    queue.schedule(callback("late"), 30.0, false, Vec::new());
    queue.schedule(callback("first"), 10.0, false, Vec::new());
    queue.schedule(callback("second"), 10.0, false, Vec::new());

    assert_eq!(drain(&queue, 20.0), ["first", "second"]);
    assert!((queue.now() - 20.0).abs() < f64::EPSILON);
    assert_eq!(queue.pending(), 1);
    assert_eq!(drain(&queue, 40.0), ["late"]);
}

#[test]
fn intervals_rearm_until_cleared() {
    let queue = TimerQueue::default();
    let id = queue.schedule(callback("tick"), 100.0, true, Vec::new());
    assert_eq!(drain(&queue, 350.0), ["tick", "tick", "tick"]);
    queue.clear(id);
    assert!(drain(&queue, 1000.0).is_empty());
}

#[test]
fn zero_delay_interval_cannot_spin() {
    let queue = TimerQueue::default();
    queue.schedule(callback("spin"), 0.0, true, Vec::new());
    assert_eq!(drain(&queue, 2.0).len(), 3);
}

#[test]
fn bad_delays_count_as_zero_and_args_are_kept() {
    let queue = TimerQueue::default();
    queue.schedule(callback("nan"), f64::NAN, false, vec![Value::from(7.0)]);
    let due = queue.pop_due(0.0).unwrap();
    assert_eq!(due.args.len(), 1);
    assert_eq!(due.id, 1);
}

#[test]
fn clear_all_empties_the_queue() {
    let queue = TimerQueue::default();
    queue.schedule(callback("a"), 1.0, false, Vec::new());
    queue.schedule(callback("b"), 1.0, true, Vec::new());
    queue.clear_all();
    assert_eq!(queue.pending(), 0);
}
