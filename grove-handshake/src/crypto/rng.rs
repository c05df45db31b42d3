// SPDX-License-Identifier: MIT OR Apache-2.0

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator using the ChaCha algorithm.
///
/// Callers own the generator exclusively and pass it as `&mut` into every operation which needs
/// fresh key material.
#[derive(Debug)]
pub struct Rng(rand_chacha::ChaCha20Rng);

impl Default for Rng {
    fn default() -> Self {
        Self(rand_chacha::ChaCha20Rng::from_os_rng())
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    /// Derives the generator from a fixed seed, making every draw reproducible.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self(rand_chacha::ChaCha20Rng::from_seed(seed))
    }
}

impl Rng {
    pub fn random_array<const N: usize>(&mut self) -> Result<[u8; N], RngError> {
        let mut out = [0u8; N];
        self.0
            .try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }

    pub fn random_vec(&mut self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut out = vec![0u8; len];
        self.0
            .try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn seeded_draws_are_reproducible() {
        let mut rng_1 = Rng::from_seed([7; 32]);
        let mut rng_2 = Rng::from_seed([7; 32]);
        assert_eq!(
            rng_1.random_vec(64).unwrap(),
            rng_2.random_vec(64).unwrap()
        );
        assert_eq!(
            rng_1.random_array::<32>().unwrap(),
            rng_2.random_array::<32>().unwrap()
        );
    }

    #[test]
    fn consecutive_draws_differ() {
        let mut rng = Rng::from_seed([7; 32]);
        assert_ne!(rng.random_vec(32).unwrap(), rng.random_vec(32).unwrap());
    }
}
