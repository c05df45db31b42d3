// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic building blocks: Diffie-Hellman key material and randomness.
pub mod x25519;

mod rng;

pub use rng::{Rng, RngError};
