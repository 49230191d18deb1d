//! Bounded transmission window.
//!
//! [`SendWindow`] keeps the fragments that were sent but not yet
//! acknowledged, oldest first.  It never holds more than its capacity:
//! `len() <= capacity()` at all times.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct SendWindow<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> SendWindow<T> {
    /// Create an empty window holding at most `capacity` entries (≥ 1).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append the newest entry.  A full window hands the entry back.
    pub fn push_back(&mut self, entry: T) -> Result<(), T> {
        if self.is_full() {
            return Err(entry);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Newest entry.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.entries.back_mut()
    }

    /// Entry at `position` (0 = oldest).
    pub fn get(&self, position: usize) -> Option<&T> {
        self.entries.get(position)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut()
    }
}
