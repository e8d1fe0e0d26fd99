//! Cooperative stop flag shared by the jobs a phone starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop token handed to each job at start time. Every clone observes the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every job holding a clone to wind down.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_state() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_set());
        signal.set();
        assert!(observer.is_set());
        observer.clear();
        assert!(!signal.is_set());
    }

    #[test]
    fn set_is_visible_across_threads() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        thread::spawn(move || remote.set()).join().unwrap();
        assert!(signal.is_set());
    }
}
