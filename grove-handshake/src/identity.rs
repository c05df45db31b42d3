// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 identity keys and signatures.
//!
//! Every group member is identified by the public half of an Ed25519 keypair; handshake messages
//! and pre-key bundles are signed with the private half. The Merkle roster tree is built over
//! these public keys.
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use ed25519_dalek::{Signer, Verifier};
use thiserror::Error;

use crate::crypto::{Rng, RngError};

/// Size of Ed25519 public keys.
pub const PUBLIC_KEY_SIZE: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Size of Ed25519 private keys.
pub const PRIVATE_KEY_SIZE: usize = ed25519_dalek::SECRET_KEY_LENGTH;

/// Size of Ed25519 signatures.
pub const SIGNATURE_SIZE: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Private Ed25519 key used for signing.
#[derive(Clone)]
pub struct PrivateKey(ed25519_dalek::SigningKey);

impl PrivateKey {
    /// Generates a fresh private key from the given randomness source.
    pub fn generate(rng: &mut Rng) -> Result<Self, RngError> {
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(
            &rng.random_array::<PRIVATE_KEY_SIZE>()?,
        )))
    }

    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Signs the given bytes with this key.
    pub fn sign(&self, bytes: &[u8]) -> Signature {
        Signature(self.0.sign(bytes))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.write_str("PrivateKey(..)")
    }
}

/// Public Ed25519 key identifying a group member.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Result<Self, IdentityError> {
        Ok(Self(ed25519_dalek::VerifyingKey::from_bytes(&bytes)?))
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

    /// Checks that `signature` was created over `bytes` by the private half of this key.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.0.verify(bytes, &signature.0).is_ok()
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength(value.len(), PUBLIC_KEY_SIZE))?;
        Self::from_bytes(bytes)
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
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
        Self::from_bytes(key)
            .map_err(|_| tls_codec::Error::DecodingError("invalid identity key".into()))
    }
}

/// Ed25519 signature over a handshake message or pre-key bundle.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(&bytes))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SIGNATURE_SIZE] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidSignatureLength(value.len(), SIGNATURE_SIZE))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

/// Error types for identity key material.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Invalid number of bytes for a public or private key.
    #[error("invalid identity key length {0} bytes, expected {1} bytes")]
    InvalidKeyLength(usize, usize),

    /// Invalid number of bytes for a signature.
    #[error("invalid signature length {0} bytes, expected {1} bytes")]
    InvalidSignatureLength(usize, usize),

    /// Key string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in key string")]
    InvalidHexEncoding(#[from] hex::FromHexError),

    /// Handle errors from the `ed25519` crate.
    #[error(transparent)]
    Ed25519(#[from] ed25519_dalek::ed25519::Error),
}
