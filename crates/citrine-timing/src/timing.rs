use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event::{EventTypeId, TimerEvent};
use crate::timer::CoreTimer;
use crate::units::cycles_to_us;

/// A core timer shared between the [`Timing`] hub and the CPU core that drives it.
pub type SharedCoreTimer = Rc<RefCell<CoreTimer>>;

type EventHandler = Rc<dyn Fn(&Timing, TimerEvent)>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingError {
    #[error("core {core} does not exist (timing was built for {num_cores} cores)")]
    UnknownCore { core: usize, num_cores: usize },

    #[error("event type {0:?} was never registered")]
    UnknownEventType(EventTypeId),
}

/// Global clock, per-core timers and the timed-event registry of one emulation session.
pub struct Timing {
    global_ticks: Cell<u64>,
    timers: Vec<SharedCoreTimer>,
    event_types: RefCell<Vec<String>>,
    handlers: RefCell<HashMap<EventTypeId, EventHandler>>,
}

impl fmt::Debug for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timing")
            .field("global_ticks", &self.global_ticks.get())
            .field("timers", &self.timers)
            .field("event_types", &self.event_types.borrow())
            .finish_non_exhaustive()
    }
}

impl Timing {
    pub fn new(num_cores: usize) -> Self {
        Self {
            global_ticks: Cell::new(0),
            timers: (0..num_cores)
                .map(|core| Rc::new(RefCell::new(CoreTimer::new(core))))
                .collect(),
            event_types: RefCell::new(Vec::new()),
            handlers: RefCell::new(HashMap::new()),
        }
    }

    pub fn num_cores(&self) -> usize {
        self.timers.len()
    }

    /// Global time, in ticks. Only ever advanced by whole synchronized slices.
    pub fn global_ticks(&self) -> u64 {
        self.global_ticks.get()
    }

    pub fn add_to_global_ticks(&self, ticks: u64) {
        self.global_ticks
            .set(self.global_ticks.get().saturating_add(ticks));
    }

    pub fn global_time_us(&self) -> u64 {
        cycles_to_us(self.global_ticks())
    }

    pub fn timer(&self, core: usize) -> Option<&SharedCoreTimer> {
        self.timers.get(core)
    }

    pub fn timers(&self) -> &[SharedCoreTimer] {
        &self.timers
    }

    /// Registers a named event type. Registering an existing name returns the existing type.
    pub fn register_event(&self, name: &str) -> EventTypeId {
        let mut types = self.event_types.borrow_mut();
        if let Some(index) = types.iter().position(|existing| existing == name) {
            return EventTypeId(index as u32);
        }
        types.push(name.to_owned());
        EventTypeId((types.len() - 1) as u32)
    }

    pub fn event_name(&self, event_type: EventTypeId) -> Option<String> {
        self.event_types.borrow().get(event_type.index()).cloned()
    }

    /// Installs the handler invoked for every fired event of `event_type`, replacing any previous
    /// one.
    pub fn set_event_handler<F>(
        &self,
        event_type: EventTypeId,
        handler: F,
    ) -> Result<(), TimingError>
    where
        F: Fn(&Timing, TimerEvent) + 'static,
    {
        self.check_event_type(event_type)?;
        self.handlers
            .borrow_mut()
            .insert(event_type, Rc::new(handler));
        Ok(())
    }

    /// Schedules `event_type` on `core`, `cycles_into_future` ticks after that core's local time.
    ///
    /// Returns the absolute target time on the core's timer.
    pub fn schedule_event(
        &self,
        cycles_into_future: u64,
        event_type: EventTypeId,
        userdata: u64,
        core: usize,
    ) -> Result<u64, TimingError> {
        self.check_event_type(event_type)?;
        let timer = self.timers.get(core).ok_or(TimingError::UnknownCore {
            core,
            num_cores: self.timers.len(),
        })?;
        let time = timer
            .borrow_mut()
            .schedule(cycles_into_future, event_type, userdata);
        tracing::trace!(core, time, event = event_type.index(), userdata, "scheduled event");
        Ok(time)
    }

    /// Removes events of `event_type` carrying `userdata` from every core.
    pub fn unschedule_event(&self, event_type: EventTypeId, userdata: u64) -> usize {
        self.timers
            .iter()
            .map(|timer| timer.borrow_mut().unschedule(event_type, userdata))
            .sum()
    }

    /// Removes every pending event of `event_type` from every core.
    pub fn remove_event(&self, event_type: EventTypeId) -> usize {
        self.timers
            .iter()
            .map(|timer| timer.borrow_mut().remove_event(event_type))
            .sum()
    }

    /// Advances `timer` into a new slice of `slice` ticks and dispatches the events that became
    /// due. Returns how many events fired.
    ///
    /// Handlers run after the timer borrow is released, so they may schedule on any core.
    pub fn advance_timer(&self, timer: &SharedCoreTimer, slice: u64) -> usize {
        let fired = timer.borrow_mut().advance(slice);
        let count = fired.len();
        for event in fired {
            let handler = self.handlers.borrow().get(&event.event_type).cloned();
            match handler {
                Some(handler) => handler(self, event),
                None => tracing::trace!(
                    event = event.event_type.index(),
                    userdata = event.userdata,
                    "fired event has no handler"
                ),
            }
        }
        count
    }

    fn check_event_type(&self, event_type: EventTypeId) -> Result<(), TimingError> {
        if event_type.index() < self.event_types.borrow().len() {
            Ok(())
        } else {
            Err(TimingError::UnknownEventType(event_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_event_dedupes_names() {
        let timing = Timing::new(2);
        let a = timing.register_event("a");
        let b = timing.register_event("b");
        assert_ne!(a, b);
        assert_eq!(timing.register_event("a"), a);
        assert_eq!(timing.event_name(b).as_deref(), Some("b"));
    }

    #[test]
    fn schedule_rejects_unknown_core_and_type() {
        let timing = Timing::new(2);
        let ev = timing.register_event("ev");
        assert_eq!(
            timing.schedule_event(10, ev, 0, 2),
            Err(TimingError::UnknownCore { core: 2, num_cores: 2 })
        );
        assert_eq!(
            timing.schedule_event(10, EventTypeId(9), 0, 0),
            Err(TimingError::UnknownEventType(EventTypeId(9)))
        );
    }

    #[test]
    fn global_ticks_saturate() {
        let timing = Timing::new(1);
        timing.add_to_global_ticks(u64::MAX - 1);
        timing.add_to_global_ticks(10);
        assert_eq!(timing.global_ticks(), u64::MAX);
    }
}
