use foundation::time::Time;

/// Metadata for one host animation frame.
///
/// Frames are stamped with the host's timestamp rather than a fixed timestep:
/// the interval between frames is the raw signal the resource manager adapts to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame (0 for the first frame).
    pub dt_s: f64,
    /// Host time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    pub fn next_at(self, time: Time) -> Self {
        Self {
            index: self.index + 1,
            dt_s: time.since(self.time),
            time,
        }
    }
}

pub const DEFAULT_FRAME_WINDOW: usize = 60;

/// Fixed-size ring of recent inter-frame intervals.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    intervals: Vec<f64>,
    capacity: usize,
    head: usize,
    last: Option<Frame>,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WINDOW)
    }
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            intervals: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            last: None,
        }
    }

    /// Stamps a new frame at `now` and records its interval.
    ///
    /// Non-positive intervals (duplicate callbacks, clock hiccups) advance the
    /// frame index but are not sampled.
    pub fn record(&mut self, now: Time) -> Frame {
        let frame = match self.last {
            None => Frame::first(now),
            Some(prev) => prev.next_at(now),
        };
        if frame.index > 0 && frame.dt_s > 0.0 {
            if self.intervals.len() < self.capacity {
                self.intervals.push(frame.dt_s);
            } else {
                self.intervals[self.head] = frame.dt_s;
            }
            self.head = (self.head + 1) % self.capacity;
        }
        self.last = Some(frame);
        frame
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// FPS derived from the most recent interval.
    pub fn instant_fps(&self) -> Option<f64> {
        let last = self.last?;
        if last.index == 0 || last.dt_s <= 0.0 {
            return None;
        }
        Some(1.0 / last.dt_s)
    }

    /// Recorded intervals in seconds (ring order, not chronological).
    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
        self.head = 0;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, FrameTimer};
    use foundation::time::Time;

    #[test]
    fn next_at_advances_index_and_dt() {
        let f0 = Frame::first(Time(1.0));
        let f1 = f0.next_at(Time(1.5));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.dt_s, 0.5);
    }

    #[test]
    fn ring_keeps_only_capacity_samples() {
        let mut t = FrameTimer::new(3);
        for i in 0..10 {
            t.record(Time(i as f64 * 0.02));
        }
        assert_eq!(t.len(), 3);
        assert!(t.intervals().iter().all(|dt| (dt - 0.02).abs() < 1e-9));
    }

    #[test]
    fn instant_fps_uses_last_interval() {
        let mut t = FrameTimer::default();
        assert_eq!(t.instant_fps(), None);
        t.record(Time(0.0));
        assert_eq!(t.instant_fps(), None);
        t.record(Time(0.025));
        let fps = t.instant_fps().unwrap();
        assert!((fps - 40.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_timestamps_are_not_sampled() {
        let mut t = FrameTimer::default();
        t.record(Time(0.0));
        t.record(Time(0.0));
        assert!(t.is_empty());
    }
}
