/// Typed observer list plus an optional recorded log.
///
/// Hosts either subscribe callbacks or poll with [`EventBus::drain`]; both see
/// every event in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub frame_index: u64,
    pub payload: E,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Box<dyn FnMut(&Event<E>)>;

pub struct EventBus<E> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback<E>)>,
    events: Vec<Event<E>>,
    record: bool,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
            events: Vec::new(),
            record: true,
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("pending", &self.events.len())
            .field("record", &self.record)
            .finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that only notifies subscribers and keeps no log.
    pub fn without_log() -> Self {
        Self {
            record: false,
            ..Self::default()
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&Event<E>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, frame_index: u64, payload: E) {
        let event = Event {
            frame_index,
            payload,
        };
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
        if self.record {
            self.events.push(event);
        }
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        std::mem::take(&mut self.events)
    }

    /// Detaches every subscriber and drops the log.
    pub fn clear(&mut self) {
        self.subscribers.clear();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn subscribers_see_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = seen.clone();
        bus.subscribe(move |e| sink.borrow_mut().push(e.payload));
        bus.emit(0, 1u32);
        bus.emit(1, 2u32);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(bus.events()[1].frame_index, 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::without_log();
        let c = count.clone();
        let id = bus.subscribe(move |_| *c.borrow_mut() += 1);
        bus.emit(0, "a");
        assert!(bus.unsubscribe(id));
        bus.emit(0, "b");
        assert_eq!(*count.borrow(), 1);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(0, "m");
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.events().is_empty());
    }
}
