//! One-shot timers scheduled by `C_Timer.After`.

use crate::refs::RefSlot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    pub id: u64,
    /// Bridge clock time at which the timer fires.
    pub due: f64,
    pub callback: RefSlot,
}

/// Pending timers ordered by due time, then scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Vec<Timer>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f64, callback: RefSlot) -> u64 {
        self.next_id += 1;
        let timer = Timer {
            id: self.next_id,
            due,
            callback,
        };
        // stable: equal due times keep scheduling order
        let at = self.pending.partition_point(|t| t.due <= due);
        self.pending.insert(at, timer);
        timer.id
    }

    /// Remove and return every timer due at or before `now`.
    pub fn take_due(&mut self, now: f64) -> Vec<Timer> {
        let split = self.pending.partition_point(|t| t.due <= now);
        self.pending.drain(..split).collect()
    }

    pub fn cancel(&mut self, id: u64) -> Option<RefSlot> {
        let idx = self.pending.iter().position(|t| t.id == id)?;
        Some(self.pending.remove(idx).callback)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.pending.first().map(|t| t.due)
    }

    /// Drop every pending timer, returning their callback refs.
    pub fn drain_all(&mut self) -> Vec<RefSlot> {
        self.pending.drain(..).map(|t| t.callback).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u64) -> RefSlot {
        RefSlot::from_raw(n)
    }

    #[test]
    fn due_timers_come_out_in_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(2.0, r(1));
        queue.schedule(1.0, r(2));
        queue.schedule(1.0, r(3));
        queue.schedule(5.0, r(4));

        let due: Vec<RefSlot> = queue.take_due(2.0).iter().map(|t| t.callback).collect();
        assert_eq!(due, vec![r(2), r(3), r(1)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(5.0));
        assert!(queue.take_due(4.9).is_empty());
    }

    #[test]
    fn cancel_removes_pending_timer() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(1.0, r(7));
        assert_eq!(queue.cancel(id), Some(r(7)));
        assert_eq!(queue.cancel(id), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_all_returns_callbacks() {
        let mut queue = TimerQueue::new();
        queue.schedule(1.0, r(1));
        queue.schedule(0.5, r(2));
        assert_eq!(queue.drain_all(), vec![r(2), r(1)]);
        assert!(queue.is_empty());
    }
}
