/// Generational handle: a dense slot index stamped with the load generation
/// that produced it.
///
/// Datasets are replaced wholesale, so a handle whose generation differs from
/// the live one refers to a slot of a previous load and must not be resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32, u32); // (index, generation)

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn generation(self) -> u32 {
        self.1
    }

    pub fn is_from(self, generation: u32) -> bool {
        self.1 == generation
    }
}

#[cfg(test)]
mod tests {
    use super::Handle;

    #[test]
    fn orders_by_index_then_generation() {
        let mut hs = vec![Handle::new(2, 0), Handle::new(1, 1), Handle::new(1, 0)];
        hs.sort();
        assert_eq!(hs, vec![Handle::new(1, 0), Handle::new(1, 1), Handle::new(2, 0)]);
    }

    #[test]
    fn generation_check() {
        let h = Handle::new(4, 3);
        assert!(h.is_from(3));
        assert!(!h.is_from(2));
        assert_eq!(h.index(), 4);
    }
}
