use std::cell::RefCell;
use std::rc::Rc;

use citrine_timing::{Timing, TimerEvent, MAX_SLICE_LENGTH};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn handlers_receive_due_events_with_lateness() {
    let timing = Timing::new(2);
    let ev = timing.register_event("vblank");
    let seen: Rc<RefCell<Vec<TimerEvent>>> = Rc::default();
    {
        let seen = Rc::clone(&seen);
        timing
            .set_event_handler(ev, move |_, event| seen.borrow_mut().push(event))
            .unwrap();
    }

    timing.schedule_event(100, ev, 42, 1).unwrap();
    let timer = timing.timer(1).unwrap().clone();
    assert_eq!(timer.borrow().max_slice_length(), 100);

    assert_eq!(timing.advance_timer(&timer, 120), 0);
    timer.borrow_mut().add_ticks(120);
    assert_eq!(timing.advance_timer(&timer, 50), 1);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].userdata, 42);
    assert_eq!(seen[0].cycles_late, 20);
}

#[test]
fn handler_can_reschedule_on_the_advanced_core() {
    let timing = Timing::new(1);
    let ev = timing.register_event("periodic");
    timing
        .set_event_handler(ev, move |timing, event| {
            timing
                .schedule_event(1_000, event.event_type, event.userdata + 1, 0)
                .unwrap();
        })
        .unwrap();
    timing.schedule_event(0, ev, 0, 0).unwrap();

    let timer = timing.timer(0).unwrap().clone();
    assert_eq!(timing.advance_timer(&timer, 1_000), 1);
    assert_eq!(timer.borrow().pending_events(), 1);
    assert_eq!(timer.borrow().next_event_time(), Some(1_000));
    assert_eq!(timer.borrow().max_slice_length(), 1_000);
}

#[test]
fn unschedule_event_spans_every_core() {
    let timing = Timing::new(4);
    let ev = timing.register_event("ev");
    for core in 0..4 {
        timing.schedule_event(10, ev, 7, core).unwrap();
        timing.schedule_event(10, ev, 8, core).unwrap();
    }
    assert_eq!(timing.unschedule_event(ev, 7), 4);
    assert_eq!(timing.remove_event(ev), 4);
    for timer in timing.timers() {
        assert_eq!(timer.borrow().max_slice_length(), MAX_SLICE_LENGTH);
    }
}

proptest! {
    #[test]
    fn consumed_slices_accumulate_exactly(slices in proptest::collection::vec(1u64..50_000, 1..32)) {
        let timing = Timing::new(1);
        let timer = timing.timer(0).unwrap().clone();
        let mut expected = 0u64;
        for slice in slices {
            timing.advance_timer(&timer, slice);
            timer.borrow_mut().add_ticks(slice);
            expected += slice;
            prop_assert_eq!(timer.borrow().ticks(), expected);
        }
    }

    #[test]
    fn max_slice_never_exceeds_the_next_event(delays in proptest::collection::vec(0u64..40_000, 1..16)) {
        let timing = Timing::new(1);
        let ev = timing.register_event("ev");
        for (userdata, delay) in delays.iter().enumerate() {
            timing.schedule_event(*delay, ev, userdata as u64, 0).unwrap();
        }
        let nearest = delays.iter().copied().min().unwrap();
        let timer = timing.timer(0).unwrap();
        prop_assert_eq!(timer.borrow().max_slice_length(), nearest.min(MAX_SLICE_LENGTH));
    }
}
