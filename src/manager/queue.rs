use std::collections::VecDeque;

/// Admission control: at most `max` items active, the rest wait in FIFO order.
#[derive(Debug)]
pub(crate) struct Admission<T> {
    max: usize,
    bounded: bool,
    active: usize,
    peak: usize,
    waiting: VecDeque<T>,
}

impl<T> Admission<T> {
    /// With `bounded` off every item is admitted at once.
    pub(crate) fn new(max: usize, bounded: bool) -> Self {
        Self {
            max,
            bounded,
            active: 0,
            peak: 0,
            waiting: VecDeque::new(),
        }
    }

    /// Returns the item back when it may start now; otherwise queues it.
    pub(crate) fn submit(&mut self, item: T) -> Option<T> {
        if !self.bounded || self.active < self.max {
            self.activate(1);
            Some(item)
        } else {
            self.waiting.push_back(item);
            None
        }
    }

    /// One active item finished. Returns the waiting items admitted in its
    /// place, oldest first.
    pub(crate) fn finish(&mut self) -> Vec<T> {
        self.active = self.active.saturating_sub(1);
        let free = self.max.saturating_sub(self.active);
        let count = free.min(self.waiting.len());
        let admitted: Vec<T> = self.waiting.drain(..count).collect();
        self.activate(admitted.len());
        admitted
    }

    fn activate(&mut self, count: usize) {
        self.active += count;
        self.peak = self.peak.max(self.active);
    }

    pub(crate) fn active(&self) -> usize {
        self.active
    }

    pub(crate) fn waiting(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.active == 0 && self.waiting.is_empty()
    }
}
