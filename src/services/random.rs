//! Deterministic pseudo-random data for tests.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

// Concrete, seedable PRNG so fixtures are identical across runs and machines.
type FixtureRng = Xoshiro256StarStar;

/// Returns `length` bytes determined entirely by `seed`.
pub fn random_array(seed: u64, length: usize) -> Vec<u8> {
    let mut rng = FixtureRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; length];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Stateless service handing out seeded byte arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomServices;

impl RandomServices {
    pub fn random_array(&self, seed: u64, length: usize) -> Vec<u8> {
        random_array(seed, length)
    }
}
