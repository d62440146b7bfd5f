use std::collections::BTreeMap;

/// Releases completions in the order their sequence numbers were issued,
/// holding back any that arrive ahead of an earlier one.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    next_issue: u64,
    next_release: u64,
    held: BTreeMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self {
            next_issue: 0,
            next_release: 0,
            held: BTreeMap::new(),
        }
    }
}

impl<T> ReorderBuffer<T> {
    pub fn issue(&mut self) -> u64 {
        let seq = self.next_issue;
        self.next_issue += 1;
        seq
    }

    /// Record a completion and return everything now releasable, in order.
    pub fn complete(&mut self, seq: u64, value: T) -> Vec<T> {
        if seq < self.next_release || seq >= self.next_issue {
            return Vec::new();
        }
        self.held.insert(seq, value);

        let mut ready = Vec::new();
        while let Some(value) = self.held.remove(&self.next_release) {
            ready.push(value);
            self.next_release += 1;
        }
        ready
    }

    /// Issued but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.next_issue - self.next_release
    }
}
