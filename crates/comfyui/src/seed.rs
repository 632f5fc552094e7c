//! Seed sources for sampler nodes.
//!
//! Every submission draws a fresh seed so that identical prompts do not
//! produce identical images. The source is a trait so tests can pin it.

use rand::Rng;

/// Smallest seed ever drawn.
pub const MIN_SEED: u64 = 1;

/// Largest seed ever drawn (`u32::MAX - 1`).
pub const MAX_SEED: u64 = u32::MAX as u64 - 1;

/// Supplies the sampler seed for each job.
pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> u64;
}

/// Uniform draw from `MIN_SEED..=MAX_SEED` using the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSeed;

impl SeedSource for RandomSeed {
    fn next_seed(&self) -> u64 {
        rand::rng().random_range(MIN_SEED..=MAX_SEED)
    }
}

/// Always returns the same seed.
#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u64);

impl SeedSource for FixedSeed {
    fn next_seed(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_seed_stays_in_range() {
        let source = RandomSeed;
        for _ in 0..1000 {
            let seed = source.next_seed();
            assert!((MIN_SEED..=MAX_SEED).contains(&seed), "seed {seed} out of range");
        }
    }

    #[test]
    fn random_seed_varies() {
        let source = RandomSeed;
        let first = source.next_seed();
        assert!((0..32).any(|_| source.next_seed() != first));
    }

    #[test]
    fn fixed_seed_repeats() {
        let source = FixedSeed(77);
        assert_eq!(source.next_seed(), 77);
        assert_eq!(source.next_seed(), 77);
    }
}
