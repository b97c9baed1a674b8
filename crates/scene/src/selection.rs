use crate::hotspot::HotspotHandle;

/// Membership set over hotspot slot indices, backed by a bitset.
///
/// The set is generation-agnostic; owners reset it when a dataset reloads.
///
/// Ordering contract:
/// - Iteration yields indices in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    words: Vec<u64>,
    len: usize,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_indices(indices: impl IntoIterator<Item = u32>) -> Self {
        let mut s = Self::new();
        for idx in indices {
            s.insert_index(idx);
        }
        s
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, handle: HotspotHandle) -> bool {
        self.contains_index(handle.index())
    }

    pub fn contains_index(&self, index: u32) -> bool {
        let (word, bit) = word_bit(index);
        self.words
            .get(word)
            .is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// Returns `true` if the set changed.
    pub fn insert_index(&mut self, index: u32) -> bool {
        let (word, bit) = word_bit(index);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let w = &mut self.words[word];
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        self.len += 1;
        true
    }

    /// Returns `true` if the set changed.
    pub fn remove_index(&mut self, index: u32) -> bool {
        let (word, bit) = word_bit(index);
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << bit;
        if (*w & mask) == 0 {
            return false;
        }
        *w &= !mask;
        self.len -= 1;
        true
    }

    /// Indices in `self` but not in `other`, ascending.
    pub fn difference(&self, other: &Self) -> Vec<u32> {
        let mut out = Vec::new();
        for (word_idx, w) in self.words.iter().copied().enumerate() {
            let o = other.words.get(word_idx).copied().unwrap_or(0);
            push_bits(&mut out, word_idx, w & !o);
        }
        out
    }

    /// Iterates member indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &w)| {
            let mut bits = w;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros();
                bits &= bits - 1;
                Some(word_idx as u32 * 64 + tz)
            })
        })
    }
}

fn push_bits(out: &mut Vec<u32>, word_idx: usize, mut bits: u64) {
    while bits != 0 {
        let tz = bits.trailing_zeros();
        bits &= bits - 1;
        out.push(word_idx as u32 * 64 + tz);
    }
}

fn word_bit(index: u32) -> (usize, u32) {
    ((index / 64) as usize, index % 64)
}
