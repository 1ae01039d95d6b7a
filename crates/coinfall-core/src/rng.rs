//! Random source for drop rolls
//!
//! Uses xorshift64: cheap, seedable, and good enough for loot rolls.
//! Seeding it explicitly keeps drop behaviour reproducible in tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Random number generator used for drop chance and amount rolls
#[derive(Debug, Clone)]
pub struct DropRng {
    state: u64,
}

impl DropRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves the zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Seed from the system clock
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::new(nanos)
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `[min, max]`; bounds may be given in either order
    pub fn range_u32(&mut self, min: u32, max: u32) -> u32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi - lo) as u64 + 1;
        lo + (self.next_u64() % span) as u32
    }

    /// Roll a percentage in `1..=100`
    pub fn roll_percent(&mut self) -> u32 {
        self.range_u32(1, 100)
    }
}

impl Default for DropRng {
    fn default() -> Self {
        Self::from_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = DropRng::new(42);
        let mut rng2 = DropRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_range() {
        let mut rng = DropRng::new(7);

        for _ in 0..200 {
            let v = rng.range_u32(10, 20);
            assert!((10..=20).contains(&v));
        }
        for _ in 0..50 {
            assert_eq!(rng.range_u32(3, 3), 3);
            let swapped = rng.range_u32(9, 4);
            assert!((4..=9).contains(&swapped));
        }
    }

    #[test]
    fn test_roll_percent_covers_bounds() {
        let mut rng = DropRng::new(99);
        let rolls: Vec<u32> = (0..5000).map(|_| rng.roll_percent()).collect();
        assert!(rolls.iter().all(|r| (1..=100).contains(r)));
        assert!(rolls.contains(&1));
        assert!(rolls.contains(&100));
    }
}
