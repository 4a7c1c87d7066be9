//! Bounded concurrency for outgoing REST calls.
//!
//! Every call holds a `RequestSlot` for the duration of its transport
//! round-trip. The slot is returned on drop, so early returns and panics
//! release it too.

use parking_lot::{Condvar, Mutex};

/// Counting semaphore shared by all calls made through one client.
#[derive(Debug)]
pub struct RequestGate {
    capacity: usize,
    in_flight: Mutex<usize>,
    released: Condvar,
}

impl RequestGate {
    /// A gate admitting `capacity` concurrent calls (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock()
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> RequestSlot<'_> {
        let mut in_flight = self.in_flight.lock();
        while *in_flight >= self.capacity {
            self.released.wait(&mut in_flight);
        }
        *in_flight += 1;
        RequestSlot { gate: self }
    }

    fn release(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight -= 1;
        self.released.notify_one();
    }
}

/// A held slot; dropping it frees the slot.
#[must_use = "the slot is released as soon as it is dropped"]
#[derive(Debug)]
pub struct RequestSlot<'a> {
    gate: &'a RequestGate,
}

impl Drop for RequestSlot<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn slots_are_released_on_drop() {
        let gate = RequestGate::new(2);
        let first = gate.acquire();
        let second = gate.acquire();
        assert_eq!(gate.in_flight(), 2);
        drop(first);
        assert_eq!(gate.in_flight(), 1);
        drop(second);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn zero_capacity_admits_one() {
        let gate = RequestGate::new(0);
        assert_eq!(gate.capacity(), 1);
        let _slot = gate.acquire();
        assert_eq!(gate.in_flight(), 1);
    }

    #[test]
    fn slot_is_released_when_holder_panics() {
        let gate = RequestGate::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _slot = gate.acquire();
            panic!("transport blew up");
        }));
        assert!(result.is_err());
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn never_exceeds_capacity() {
        let gate = RequestGate::new(3);
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..12 {
                scope.spawn(|| {
                    let _slot = gate.acquire();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    current.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.in_flight(), 0);
    }
}
