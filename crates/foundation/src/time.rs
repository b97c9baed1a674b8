use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    pub fn after(self, seconds: f64) -> Self {
        Time(self.0 + seconds)
    }

    /// Seconds elapsed from `earlier` to `self`, never negative.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

/// Source of "now" for everything that ages, debounces or expires.
///
/// Injected rather than read globally so time-dependent behavior is testable.
pub trait Clock {
    fn now(&self) -> Time;
}

/// Monotonic wall clock measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Time {
        Time(self.origin.elapsed().as_secs_f64())
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: Time) -> Self {
        Self {
            now: Rc::new(Cell::new(start.0)),
        }
    }

    pub fn set(&self, t: Time) {
        self.now.set(t.0);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, Time};

    #[test]
    fn since_never_negative() {
        assert_eq!(Time(2.0).since(Time(0.5)), 1.5);
        assert_eq!(Time(0.5).since(Time(2.0)), 0.0);
        assert_eq!(Time::from_millis(250.0), Time(0.25));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new(Time(1.0));
        let b = a.clone();
        a.advance(0.5);
        assert_eq!(b.now(), Time(1.5));
        b.set(Time(10.0));
        assert_eq!(a.now(), Time(10.0));
    }
}
