//! Monotonic counter used for record and error tallies.

/// A single-threaded counter whose first `increment` returns `1`.
///
/// There is no reset: a new counter is a new tally. Swap the field for an
/// `AtomicUsize` if it ever needs to be shared across threads.
#[derive(Debug, Default)]
pub struct Counter {
    count: usize,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the tally and return the new value.
    pub fn increment(&mut self) -> usize {
        self.count += 1;
        self.count
    }

    /// Last value returned by [`Counter::increment`], `0` if never called.
    pub fn value(&self) -> usize {
        self.count
    }
}
