/// Lifecycle of a tile as seen by the engine.
///
/// Queued → Loading → Resident, with Failed as the terminal state of a load
/// that the renderer reported as broken. Evicted tiles have no state.
/// The renderer owns the pixels; these states only mirror its work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResidencyState {
    Queued,
    Loading,
    Resident,
    Failed,
}

impl ResidencyState {
    /// States that count against the renderer's tile cache.
    pub fn occupies_cache(self) -> bool {
        matches!(self, ResidencyState::Resident)
    }

    /// States in which a fresh load request would be redundant.
    pub fn is_pending(self) -> bool {
        matches!(self, ResidencyState::Queued | ResidencyState::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::ResidencyState;

    #[test]
    fn pending_and_occupancy() {
        assert!(ResidencyState::Queued.is_pending());
        assert!(ResidencyState::Loading.is_pending());
        assert!(!ResidencyState::Resident.is_pending());
        assert!(ResidencyState::Resident.occupies_cache());
        assert!(!ResidencyState::Failed.occupies_cache());
    }
}
