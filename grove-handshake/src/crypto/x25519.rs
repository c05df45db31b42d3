// SPDX-License-Identifier: MIT OR Apache-2.0

//! X25519 key material used for the Diffie-Hellman half of the handshake: ephemeral pre-keys,
//! update keys and ratchet paths. Key agreement itself happens in the surrounding key-derivation
//! tree, this module only carries and encodes the keys.
use std::fmt;
use std::io::{Read, Write};

use thiserror::Error;

use crate::crypto::{Rng, RngError};

/// Size of X25519 public keys.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of X25519 secret keys.
pub const SECRET_KEY_SIZE: usize = 32;

/// Secret half of an X25519 keypair.
#[derive(Clone)]
pub struct SecretKey(x25519_dalek::StaticSecret);

impl SecretKey {
    /// Generates a fresh secret key from the given randomness source.
    pub fn generate(rng: &mut Rng) -> Result<Self, RngError> {
        Ok(Self(x25519_dalek::StaticSecret::from(
            rng.random_array::<SECRET_KEY_SIZE>()?,
        )))
    }

    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }

    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material
        f.write_str("SecretKey(..)")
    }
}

/// Public half of an X25519 keypair.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(x25519_dalek::PublicKey);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = X25519Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = value
            .try_into()
            .map_err(|_| X25519Error::InvalidKeyLength(value.len(), PUBLIC_KEY_SIZE))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl tls_codec::Size for PublicKey {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        PUBLIC_KEY_SIZE
    }
}

impl tls_codec::Serialize for PublicKey {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        writer
            .write_all(self.as_bytes())
            .map_err(|err| tls_codec::Error::EncodingError(err.to_string()))?;
        Ok(PUBLIC_KEY_SIZE)
    }
}

impl tls_codec::Deserialize for PublicKey {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        bytes
            .read_exact(&mut key)
            .map_err(|_| tls_codec::Error::EndOfStream)?;
        Ok(Self::from_bytes(key))
    }
}

/// Error types for X25519 key material.
#[derive(Debug, Error)]
pub enum X25519Error {
    /// Invalid number of bytes for a public key.
    #[error("invalid x25519 key length {0} bytes, expected {1} bytes")]
    InvalidKeyLength(usize, usize),
}
