use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable, thread-safe handle for asking a running session to reset or shut down.
///
/// Requests are latched and consumed by the scheduling thread after the current round; a request
/// never interrupts a round in progress.
#[derive(Debug, Clone, Default)]
pub struct SessionRequests {
    reset: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl SessionRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn reset_pending(&self) -> bool {
        self.reset.load(Ordering::SeqCst)
    }

    pub fn shutdown_pending(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Takes and clears a pending reset request.
    pub fn take_reset(&self) -> bool {
        self.reset.swap(false, Ordering::SeqCst)
    }

    /// Takes and clears a pending shutdown request.
    pub fn take_shutdown(&self) -> bool {
        self.shutdown.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_taken_once_across_threads() {
        let requests = SessionRequests::new();
        let remote = requests.clone();
        std::thread::spawn(move || {
            remote.request_shutdown();
            remote.request_reset();
        })
        .join()
        .unwrap();

        assert!(requests.shutdown_pending());
        assert!(requests.take_reset());
        assert!(!requests.take_reset());
        assert!(requests.take_shutdown());
        assert!(!requests.shutdown_pending());
    }
}
