use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::event::{EventTypeId, PendingEvent, TimerEvent};
use crate::MAX_SLICE_LENGTH;

#[inline]
fn ticks_to_i64(ticks: u64) -> i64 {
    i64::try_from(ticks).unwrap_or(i64::MAX)
}

/// Per-core tick accumulator and slice budget.
///
/// The timer tracks time in three parts:
///
/// ```text
/// ticks()  = executed_ticks + (slice_length - downcount)
/// ```
///
/// - `executed_ticks` is the time retired by previous slices,
/// - `slice_length` is the budget granted by the most recent [`CoreTimer::advance`],
/// - `downcount` is what is left of that budget. CPU engines decrement it through
///   [`CoreTimer::add_ticks`] as they retire cycles and stop once it drops to zero or below; it
///   may go negative when an engine overshoots its budget.
///
/// A core that stops early (for example because a reschedule was requested) leaves part of its
/// budget unused, so its local time falls behind the global clock. The scheduler's catch-up
/// branch is what eventually pulls it forward again.
#[derive(Debug)]
pub struct CoreTimer {
    core: usize,
    executed_ticks: u64,
    slice_length: i64,
    downcount: i64,
    idled_ticks: u64,
    events: BinaryHeap<Reverse<PendingEvent>>,
    next_fifo: u64,
}

impl CoreTimer {
    pub fn new(core: usize) -> Self {
        Self {
            core,
            executed_ticks: 0,
            slice_length: 0,
            downcount: 0,
            idled_ticks: 0,
            events: BinaryHeap::new(),
            next_fifo: 0,
        }
    }

    /// Index of the core that owns this timer.
    pub fn core(&self) -> usize {
        self.core
    }

    /// Current local time of the core, in ticks.
    pub fn ticks(&self) -> u64 {
        let consumed = self.slice_length.saturating_sub(self.downcount).max(0);
        self.executed_ticks.saturating_add(consumed as u64)
    }

    /// Remaining budget of the current slice. Non-positive means the core must stop.
    pub fn downcount(&self) -> i64 {
        self.downcount
    }

    pub fn slice_length(&self) -> u64 {
        self.slice_length.max(0) as u64
    }

    /// Ticks skipped through [`CoreTimer::idle`] since the last [`CoreTimer::advance`].
    pub fn idled_ticks(&self) -> u64 {
        self.idled_ticks
    }

    /// Charges `ticks` retired cycles against the current slice.
    pub fn add_ticks(&mut self, ticks: u64) {
        self.downcount = self.downcount.saturating_sub(ticks_to_i64(ticks));
    }

    /// Skips the rest of the current slice without executing it.
    ///
    /// The slice was bounded by the next pending event when it was granted, so idling moves the
    /// core's local time up to (at most) that event.
    pub fn idle(&mut self) {
        if self.downcount > 0 {
            self.idled_ticks = self.idled_ticks.saturating_add(self.downcount as u64);
            self.downcount = 0;
        }
    }

    /// Retires the current slice and grants a new one of `slice` ticks.
    ///
    /// Returns every pending event whose target time is at or before the retired local time, in
    /// target-time order (FIFO among equal targets). The caller is responsible for dispatching
    /// them; see [`crate::Timing::advance_timer`].
    #[must_use = "fired events must be dispatched"]
    pub fn advance(&mut self, slice: u64) -> Vec<TimerEvent> {
        self.executed_ticks = self.ticks();
        self.slice_length = ticks_to_i64(slice);
        self.downcount = self.slice_length;
        self.idled_ticks = 0;

        let mut fired = Vec::new();
        while let Some(Reverse(next)) = self.events.peek() {
            if next.time > self.executed_ticks {
                break;
            }
            let Some(Reverse(event)) = self.events.pop() else {
                break;
            };
            fired.push(TimerEvent {
                event_type: event.event_type,
                userdata: event.userdata,
                cycles_late: self.executed_ticks - event.time,
            });
        }
        fired
    }

    /// Largest number of ticks this core may run before its next pending event is due.
    ///
    /// Capped at [`MAX_SLICE_LENGTH`], which is also the answer when nothing is scheduled. An
    /// event that is already due yields `0`; it is delivered by the next [`CoreTimer::advance`].
    pub fn max_slice_length(&self) -> u64 {
        match self.events.peek() {
            Some(Reverse(next)) => next.time.saturating_sub(self.ticks()).min(MAX_SLICE_LENGTH),
            None => MAX_SLICE_LENGTH,
        }
    }

    /// Schedules an event `cycles_into_future` ticks after the current local time.
    ///
    /// Returns the absolute target time.
    pub fn schedule(
        &mut self,
        cycles_into_future: u64,
        event_type: EventTypeId,
        userdata: u64,
    ) -> u64 {
        let time = self.ticks().saturating_add(cycles_into_future);
        let fifo = self.next_fifo;
        self.next_fifo += 1;
        self.events.push(Reverse(PendingEvent {
            time,
            fifo,
            event_type,
            userdata,
        }));
        time
    }

    /// Removes pending events of `event_type` carrying `userdata`. Returns how many were removed.
    pub fn unschedule(&mut self, event_type: EventTypeId, userdata: u64) -> usize {
        let before = self.events.len();
        self.events.retain(|Reverse(event)| {
            !(event.event_type == event_type && event.userdata == userdata)
        });
        before - self.events.len()
    }

    /// Removes every pending event of `event_type`. Returns how many were removed.
    pub fn remove_event(&mut self, event_type: EventTypeId) -> usize {
        let before = self.events.len();
        self.events
            .retain(|Reverse(event)| event.event_type != event_type);
        before - self.events.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|Reverse(event)| event.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EV: EventTypeId = EventTypeId(0);

    #[test]
    fn consuming_the_whole_slice_moves_local_time_by_the_slice() {
        let mut timer = CoreTimer::new(0);
        assert!(timer.advance(300).is_empty());
        assert_eq!(timer.ticks(), 0);

        timer.add_ticks(300);
        assert_eq!(timer.ticks(), 300);
        assert_eq!(timer.downcount(), 0);

        assert!(timer.advance(100).is_empty());
        assert_eq!(timer.ticks(), 300);
    }

    #[test]
    fn idle_consumes_remaining_budget() {
        let mut timer = CoreTimer::new(1);
        let _ = timer.advance(500);
        timer.add_ticks(120);
        timer.idle();

        assert_eq!(timer.ticks(), 500);
        assert_eq!(timer.idled_ticks(), 380);
        assert_eq!(timer.downcount(), 0);
    }

    #[test]
    fn overshoot_counts_towards_local_time() {
        let mut timer = CoreTimer::new(0);
        let _ = timer.advance(100);
        timer.add_ticks(130);
        assert_eq!(timer.downcount(), -30);
        assert_eq!(timer.ticks(), 130);

        // Idling with a negative downcount does not rewind time.
        timer.idle();
        assert_eq!(timer.ticks(), 130);
        assert_eq!(timer.idled_ticks(), 0);
    }

    #[test]
    fn early_stop_leaves_the_core_behind() {
        let mut timer = CoreTimer::new(0);
        let _ = timer.advance(1_000);
        timer.add_ticks(250);
        let _ = timer.advance(1_000);
        assert_eq!(timer.ticks(), 250);
    }

    #[test]
    fn max_slice_length_is_bounded_by_next_event() {
        let mut timer = CoreTimer::new(0);
        assert_eq!(timer.max_slice_length(), MAX_SLICE_LENGTH);

        timer.schedule(150, EV, 7);
        timer.schedule(300, EV, 8);
        assert_eq!(timer.max_slice_length(), 150);

        let _ = timer.advance(100);
        timer.add_ticks(100);
        assert_eq!(timer.max_slice_length(), 50);
    }

    #[test]
    fn due_events_fire_in_order_on_advance() {
        let mut timer = CoreTimer::new(0);
        timer.schedule(10, EV, 1);
        timer.schedule(10, EV, 2);
        timer.schedule(5, EV, 3);
        timer.schedule(50, EV, 4);

        let _ = timer.advance(12);
        timer.add_ticks(12);
        let fired = timer.advance(12);

        let order: Vec<u64> = fired.iter().map(|e| e.userdata).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(fired[0].cycles_late, 7);
        assert_eq!(fired[1].cycles_late, 2);
        assert_eq!(timer.pending_events(), 1);
        assert_eq!(timer.next_event_time(), Some(50));
    }

    #[test]
    fn unschedule_matches_type_and_userdata() {
        let other = EventTypeId(1);
        let mut timer = CoreTimer::new(0);
        timer.schedule(10, EV, 1);
        timer.schedule(20, EV, 2);
        timer.schedule(30, other, 1);

        assert_eq!(timer.unschedule(EV, 1), 1);
        assert_eq!(timer.pending_events(), 2);
        assert_eq!(timer.remove_event(other), 1);
        assert_eq!(timer.next_event_time(), Some(20));
    }
}
