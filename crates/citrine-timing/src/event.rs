use std::cmp::Ordering;

/// Handle for an event type registered with [`crate::Timing::register_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTypeId(pub(crate) u32);

impl EventTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A timed event that became due while a [`crate::CoreTimer`] was advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub event_type: EventTypeId,
    pub userdata: u64,
    /// How many ticks past its target time the event was delivered.
    pub cycles_late: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingEvent {
    pub time: u64,
    /// Insertion order; breaks ties between events scheduled for the same tick.
    pub fifo: u64,
    pub event_type: EventTypeId,
    pub userdata: u64,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.fifo == other.fifo
    }
}

impl Eq for PendingEvent {}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.fifo).cmp(&(other.time, other.fifo))
    }
}
