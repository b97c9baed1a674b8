//! Priority work queue with age-based expiry.
//!
//! Key properties:
//! - Total ordering on `(priority, id)`: smaller priorities first, equal
//!   priorities in insertion order.
//! - Items remember when they were enqueued so stale work can be dropped
//!   instead of retried forever.
//! - Optional backpressure via a maximum pending length.
//!
//! Vec-backed: queues here hold at most a few hundred tile requests.

use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkQueueFull {
    pub max_len: usize,
}

impl std::fmt::Display for WorkQueueFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "work queue full (max_len={})", self.max_len)
    }
}

impl std::error::Error for WorkQueueFull {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    // Smaller values run earlier; field order gives (priority, id) ordering.
    priority: i32,
    id: WorkId,
}

#[derive(Debug)]
struct Item<T> {
    key: Key,
    payload: T,
    enqueued_at: Time,
}

/// A popped queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<T> {
    pub id: WorkId,
    pub priority: i32,
    pub enqueued_at: Time,
    pub payload: T,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    next_id: u64,
    items: Vec<Item<T>>,
    max_len: Option<usize>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            items: Vec::new(),
            max_len: None,
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, priority: i32, now: Time, payload: T) -> WorkId {
        self.push_unchecked(priority, now, payload)
    }

    pub fn try_push(
        &mut self,
        priority: i32,
        now: Time,
        payload: T,
    ) -> Result<WorkId, WorkQueueFull> {
        if let Some(max_len) = self.max_len
            && self.items.len() >= max_len
        {
            return Err(WorkQueueFull { max_len });
        }
        Ok(self.push_unchecked(priority, now, payload))
    }

    fn push_unchecked(&mut self, priority: i32, now: Time, payload: T) -> WorkId {
        let id = WorkId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.items.push(Item {
            key: Key { priority, id },
            payload,
            enqueued_at: now,
        });
        id
    }

    pub fn cancel(&mut self, id: WorkId) -> Option<T> {
        let idx = self.items.iter().position(|i| i.key.id == id)?;
        Some(self.items.swap_remove(idx).payload)
    }

    /// Changes the priority of a pending item; its insertion rank is kept.
    pub fn set_priority(&mut self, id: WorkId, priority: i32) -> bool {
        match self.items.iter_mut().find(|i| i.key.id == id) {
            Some(item) => {
                item.key.priority = priority;
                true
            }
            None => false,
        }
    }

    /// Removes and returns every item enqueued more than `max_age_s` before `now`.
    pub fn expire(&mut self, now: Time, max_age_s: f64) -> Vec<T> {
        let mut expired = Vec::new();
        let mut idx = 0;
        while idx < self.items.len() {
            if now.since(self.items[idx].enqueued_at) > max_age_s {
                expired.push(self.items.swap_remove(idx).payload);
            } else {
                idx += 1;
            }
        }
        expired
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkId, i32, &T)> {
        self.items.iter().map(|i| (i.key.id, i.key.priority, &i.payload))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn best_index(&self) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| item.key)
            .map(|(idx, _)| idx)
    }

    /// Pops the next (highest priority, then oldest) item.
    pub fn pop_next(&mut self) -> Option<WorkItem<T>> {
        let idx = self.best_index()?;
        Some(self.take(idx))
    }

    fn take(&mut self, idx: usize) -> WorkItem<T> {
        let item = self.items.swap_remove(idx);
        WorkItem {
            id: item.key.id,
            priority: item.key.priority,
            enqueued_at: item.enqueued_at,
            payload: item.payload,
        }
    }
}
