use std::collections::VecDeque;

pub const STATUS_LOG_CAPACITY: usize = 5;

/// Newest-first list of status lines reported by the controller.
#[derive(Debug, Clone)]
pub struct StatusLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::with_capacity(STATUS_LOG_CAPACITY)
    }
}

impl StatusLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1) + 1),
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push_front(text.into());
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
