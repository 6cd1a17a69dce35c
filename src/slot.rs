//! Single-slot, latest-value-wins handoff between a producer thread and the UI.
//!
//! Publishing overwrites whatever the consumer has not taken yet, so a slow UI
//! always renders the newest frame and the producer never blocks.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub struct FrameSlot<T> {
    inner: Arc<SlotInner<T>>,
}

struct SlotInner<T> {
    value: Mutex<SlotState<T>>,
    ready: Condvar,
}

struct SlotState<T> {
    latest: Option<T>,
    published: u64,
    overwritten: u64,
}

impl<T> Clone for FrameSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                value: Mutex::new(SlotState {
                    latest: None,
                    published: 0,
                    overwritten: 0,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Store `value`, replacing any frame not yet taken.
    pub fn publish(&self, value: T) {
        let mut state = self.lock();
        if state.latest.replace(value).is_some() {
            state.overwritten += 1;
        }
        state.published += 1;
        drop(state);
        self.inner.ready.notify_all();
    }

    /// Take the pending value without waiting.
    pub fn take(&self) -> Option<T> {
        self.lock().latest.take()
    }

    /// Wait at most `timeout` for a value.
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(value) = state.latest.take() {
                return Some(value);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = match self.inner.ready.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Drop any pending value.
    pub fn clear(&self) {
        self.lock().latest = None;
    }

    /// Total publishes since creation.
    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Publishes that replaced an untaken value.
    pub fn overwritten(&self) -> u64 {
        self.lock().overwritten
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // A panicking publisher cannot leave the slot half-written.
        self.inner
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_wins() {
        let slot = FrameSlot::new();
        slot.publish(1);
        slot.publish(2);
        slot.publish(3);
        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
        assert_eq!(slot.published(), 3);
        assert_eq!(slot.overwritten(), 2);
    }

    #[test]
    fn wait_take_times_out_when_empty() {
        let slot: FrameSlot<u32> = FrameSlot::new();
        let start = Instant::now();
        assert_eq!(slot.wait_take(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_take_wakes_on_publish_from_other_thread() {
        let slot = FrameSlot::new();
        let producer = slot.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.publish("frame");
        });
        assert_eq!(slot.wait_take(Duration::from_secs(5)), Some("frame"));
        handle.join().unwrap();
    }

    #[test]
    fn clear_discards_pending() {
        let slot = FrameSlot::new();
        slot.publish(7);
        slot.clear();
        assert_eq!(slot.take(), None);
    }
}
