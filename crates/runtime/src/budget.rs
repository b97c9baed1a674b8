/// Per-pass budget for cooperative work.
///
/// Budgets are expressed in abstract "work units" (hotspots attached, tile
/// loads started) rather than wall-clock time, so a pass does a bounded amount
/// of work and then yields back to the host frame loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameBudget {
    remaining_units: u32,
    consumed_units: u32,
}

impl FrameBudget {
    pub fn new(units: u32) -> Self {
        Self {
            remaining_units: units,
            consumed_units: 0,
        }
    }

    /// A practically-unbounded budget.
    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn consumed_units(&self) -> u32 {
        self.consumed_units
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units == 0
    }

    /// Attempts to consume `units` from the budget.
    ///
    /// Returns `true` if the budget had enough remaining units.
    pub fn try_consume(&mut self, units: u32) -> bool {
        if self.remaining_units < units {
            return false;
        }
        self.remaining_units -= units;
        self.consumed_units = self.consumed_units.saturating_add(units);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::FrameBudget;

    #[test]
    fn consumes_units() {
        let mut b = FrameBudget::new(3);
        assert!(b.try_consume(2));
        assert_eq!(b.remaining_units(), 1);
        assert!(!b.try_consume(2));
        assert_eq!(b.consumed_units(), 2);
        assert!(b.try_consume(1));
        assert!(b.is_exhausted());
    }
}
