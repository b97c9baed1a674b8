use std::collections::BTreeMap;

use foundation::math::precision::stable_total_cmp_f64;
use foundation::time::Time;

/// Cancellable one-shot and periodic timers polled from the frame loop.
///
/// Every suspension point of the engine (debounces, aggregation ticks,
/// cleanup sweeps) is an entry here, so teardown is a single [`Timers::clear`]
/// and no callback can outlive the state it refers to.
///
/// Ordering contract:
/// - `poll` returns due keys by `(deadline, key)`.
#[derive(Debug, Clone)]
pub struct Timers<K> {
    entries: BTreeMap<K, Entry>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Entry {
    deadline: Time,
    period_s: Option<f64>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> Timers<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) a one-shot timer `delay_s` after `now`.
    ///
    /// Re-arming pushes the deadline out, which is what collapses a burst of
    /// signals into one firing.
    pub fn debounce(&mut self, key: K, now: Time, delay_s: f64) {
        self.entries.insert(
            key,
            Entry {
                deadline: now.after(delay_s),
                period_s: None,
            },
        );
    }

    /// (Re)schedules a periodic timer whose first firing is one period from `now`.
    pub fn every(&mut self, key: K, now: Time, period_s: f64) {
        let period_s = period_s.max(1e-3);
        self.entries.insert(
            key,
            Entry {
                deadline: now.after(period_s),
                period_s: Some(period_s),
            },
        );
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.entries.remove(&key).is_some()
    }

    pub fn deadline(&self, key: K) -> Option<Time> {
        self.entries.get(&key).map(|e| e.deadline)
    }

    pub fn period(&self, key: K) -> Option<f64> {
        self.entries.get(&key).and_then(|e| e.period_s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every key due at `now`.
    ///
    /// One-shot timers are removed; periodic timers advance by their period
    /// (skipping missed periods rather than firing a backlog).
    pub fn poll(&mut self, now: Time) -> Vec<K> {
        let mut due: Vec<(Time, K)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline.0 <= now.0)
            .map(|(k, e)| (e.deadline, *k))
            .collect();
        due.sort_by(|(ta, ka), (tb, kb)| stable_total_cmp_f64(ta.0, tb.0).then_with(|| ka.cmp(kb)));

        for (_, key) in &due {
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            match entry.period_s {
                None => {
                    self.entries.remove(key);
                }
                Some(period) => {
                    let mut next = entry.deadline.after(period);
                    if next.0 <= now.0 {
                        next = now.after(period);
                    }
                    entry.deadline = next;
                }
            }
        }

        due.into_iter().map(|(_, k)| k).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::Timers;
    use foundation::time::Time;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
    enum K {
        A,
        B,
    }

    #[test]
    fn debounce_collapses_bursts() {
        let mut t = Timers::new();
        t.debounce(K::A, Time(0.0), 0.1);
        t.debounce(K::A, Time(0.05), 0.1);
        assert!(t.poll(Time(0.12)).is_empty());
        assert_eq!(t.poll(Time(0.16)), vec![K::A]);
        assert_eq!(t.deadline(K::A), None);
    }

    #[test]
    fn periodic_timers_rearm_without_backlog() {
        let mut t = Timers::new();
        t.every(K::B, Time(0.0), 1.0);
        assert_eq!(t.poll(Time(1.0)), vec![K::B]);
        assert_eq!(t.deadline(K::B), Some(Time(2.0)));
        assert_eq!(t.poll(Time(5.5)), vec![K::B]);
        assert_eq!(t.deadline(K::B), Some(Time(6.5)));
    }

    #[test]
    fn due_keys_are_ordered_by_deadline() {
        let mut t = Timers::new();
        t.debounce(K::A, Time(0.0), 0.5);
        t.debounce(K::B, Time(0.0), 0.2);
        assert_eq!(t.poll(Time(1.0)), vec![K::B, K::A]);
    }

    #[test]
    fn cancel_and_clear_detach() {
        let mut t = Timers::new();
        t.every(K::A, Time(0.0), 1.0);
        t.debounce(K::B, Time(0.0), 1.0);
        assert!(t.cancel(K::A));
        assert!(!t.cancel(K::A));
        t.clear();
        assert!(t.poll(Time(10.0)).is_empty());
    }
}
