/*
 * Priority Bitmap
 *
 * One bit per priority level, bit p set iff level p has a runnable thread.
 * Stored as 64-bit words so "most urgent non-empty level" is a scan of at
 * most four words, each a single trailing_zeros (TZCNT/BSF on x86_64).
 */

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = 4;

/// Fixed-width set of priority levels (up to 256)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityBitmap {
    words: [u64; WORDS],
}

impl PriorityBitmap {
    /// Largest number of levels the bitmap can describe
    pub const CAPACITY: usize = WORD_BITS * WORDS;

    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    pub fn set(&mut self, level: usize) {
        self.words[level / WORD_BITS] |= 1u64 << (level % WORD_BITS);
    }

    pub fn clear(&mut self, level: usize) {
        self.words[level / WORD_BITS] &= !(1u64 << (level % WORD_BITS));
    }

    pub fn test(&self, level: usize) -> bool {
        self.words[level / WORD_BITS] & (1u64 << (level % WORD_BITS)) != 0
    }

    /// Lowest set level (find-first-set)
    pub fn first_set(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * WORD_BITS + w.trailing_zeros() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set levels
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_first() {
        let bm = PriorityBitmap::new();
        assert!(bm.is_empty());
        assert_eq!(bm.first_set(), None);
    }

    #[test]
    fn first_set_crosses_words() {
        let mut bm = PriorityBitmap::new();
        bm.set(200);
        bm.set(70);
        assert_eq!(bm.first_set(), Some(70));
        bm.set(63);
        assert_eq!(bm.first_set(), Some(63));
        bm.clear(63);
        bm.clear(70);
        assert_eq!(bm.first_set(), Some(200));
        assert_eq!(bm.count(), 1);
    }

    #[test]
    fn set_and_clear_are_idempotent() {
        let mut bm = PriorityBitmap::new();
        bm.set(5);
        bm.set(5);
        assert!(bm.test(5));
        assert_eq!(bm.count(), 1);
        bm.clear(5);
        bm.clear(5);
        assert!(!bm.test(5));
        assert!(bm.is_empty());
    }

    #[test]
    fn highest_level_fits() {
        let mut bm = PriorityBitmap::new();
        bm.set(PriorityBitmap::CAPACITY - 1);
        assert_eq!(bm.first_set(), Some(255));
    }
}
