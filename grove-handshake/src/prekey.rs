// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-key bundles: the published key material which lets others bring a user into a group
//! ([`UserPreKey`]) and the per-epoch snapshot of a group's cryptographic state which every
//! handshake message carries ([`GroupPreKey`]).
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tls_codec::{Deserialize as TlsDeserialize, Serialize as TlsSerialize, Size};

use crate::codec;
use crate::crypto::x25519;
use crate::crypto::{Rng, RngError};
use crate::identity;
use crate::identity::Signature;
use crate::merkle::MerklePath;

/// A user's bootstrap bundle: a fresh ephemeral DH key bound to their identity key by a
/// self-signature.
///
/// The bundle is created once, published, and never mutated afterwards; receivers either verify
/// it or discard it. The signature covers the canonical encoding of the two keys, that is the
/// full encoding with the trailing signature field stripped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreKey {
    pre_key: x25519::PublicKey,
    identity_key: identity::PublicKey,
    signature: Option<Signature>,
}

impl UserPreKey {
    /// Assembles a bundle from already-existing parts, for example one received from a peer.
    pub fn new(
        pre_key: x25519::PublicKey,
        identity_key: identity::PublicKey,
        signature: Option<Signature>,
    ) -> Self {
        Self {
            pre_key,
            identity_key,
            signature,
        }
    }

    /// Generates a fresh ephemeral DH keypair and signs the bundle with `identity_key`.
    ///
    /// Returns the ephemeral secret key next to the bundle; the caller keeps the secret half to
    /// later complete the key agreement with whoever used the bundle.
    pub fn generate(
        identity_key: &identity::PrivateKey,
        rng: &mut Rng,
    ) -> Result<(x25519::SecretKey, UserPreKey), PreKeyError> {
        let ephemeral_key = x25519::SecretKey::generate(rng)?;
        let mut bundle = Self {
            pre_key: ephemeral_key.public_key(),
            identity_key: identity_key.public_key(),
            signature: None,
        };
        let to_be_signed = bundle.to_be_signed()?;
        bundle.signature = Some(identity_key.sign(&to_be_signed));
        Ok((ephemeral_key, bundle))
    }

    pub fn pre_key(&self) -> &x25519::PublicKey {
        &self.pre_key
    }

    pub fn identity_key(&self) -> &identity::PublicKey {
        &self.identity_key
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Checks the bundle's self-signature against its embedded identity key.
    pub fn verify(&self) -> Result<(), PreKeyError> {
        let signature = self.signature.as_ref().ok_or(PreKeyError::MissingSignature)?;
        let to_be_signed = self.to_be_signed()?;
        if !self.identity_key.verify(&to_be_signed, signature) {
            return Err(PreKeyError::InvalidSignature);
        }
        Ok(())
    }

    /// The exact byte range covered by the self-signature: the canonical encoding with the
    /// trailing signature field stripped.
    fn to_be_signed(&self) -> Result<Vec<u8>, tls_codec::Error> {
        let mut bytes = self.tls_serialize_detached()?;
        let signature_field = codec::signature_field_len(self.signature.as_ref());
        bytes.truncate(bytes.len() - signature_field);
        Ok(bytes)
    }
}

impl tls_codec::Size for UserPreKey {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.pre_key.tls_serialized_len()
            + self.identity_key.tls_serialized_len()
            + codec::signature_field_len(self.signature.as_ref())
    }
}

impl tls_codec::Serialize for UserPreKey {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        let mut written = self.pre_key.tls_serialize(writer)?;
        written += self.identity_key.tls_serialize(writer)?;
        written += codec::write_signature(writer, self.signature.as_ref())?;
        Ok(written)
    }
}

impl tls_codec::Deserialize for UserPreKey {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let pre_key = x25519::PublicKey::tls_deserialize(bytes)?;
        let identity_key = identity::PublicKey::tls_deserialize(bytes)?;
        let signature = codec::read_signature(bytes)?;

        Ok(Self {
            pre_key,
            identity_key,
            signature,
        })
    }
}

/// A point-in-time snapshot of a group's cryptographic state, embedded by value into every
/// handshake message at send time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPreKey {
    /// Epoch this snapshot belongs to.
    pub epoch: u32,

    /// Application-chosen identifier of the group.
    #[serde(
        serialize_with = "crate::serde::serialize_hex",
        deserialize_with = "crate::serde::deserialize_hex"
    )]
    pub group_id: Vec<u8>,

    /// Number of members in the roster at this epoch.
    pub group_size: u32,

    /// DH key against which the next epoch's update secret is agreed.
    pub update_key: x25519::PublicKey,

    /// Frontier of the identity roster tree; never empty.
    pub identity_frontier: MerklePath,

    /// Frontier of the key-derivation tree; never empty.
    pub ratchet_frontier: Vec<x25519::PublicKey>,
}

impl tls_codec::Size for GroupPreKey {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.epoch.tls_serialized_len()
            + codec::variable_bytes_len(self.group_id.len())
            + self.group_size.tls_serialized_len()
            + self.update_key.tls_serialized_len()
            + self.identity_frontier.tls_serialized_len()
            + codec::element_sequence_len(&self.ratchet_frontier)
    }
}

impl tls_codec::Serialize for GroupPreKey {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        if self.identity_frontier.is_empty() || self.ratchet_frontier.is_empty() {
            return Err(tls_codec::Error::EncodingError(
                "group pre-key frontiers must contain at least one node".into(),
            ));
        }

        let mut written = self.epoch.tls_serialize(writer)?;
        written += codec::write_variable_bytes(writer, &self.group_id)?;
        written += self.group_size.tls_serialize(writer)?;
        written += self.update_key.tls_serialize(writer)?;
        written += self.identity_frontier.tls_serialize(writer)?;
        written += codec::write_element_sequence(writer, &self.ratchet_frontier)?;
        Ok(written)
    }
}

impl tls_codec::Deserialize for GroupPreKey {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let epoch = u32::tls_deserialize(bytes)?;
        let group_id = codec::read_variable_bytes(bytes)?;
        let group_size = u32::tls_deserialize(bytes)?;
        let update_key = x25519::PublicKey::tls_deserialize(bytes)?;
        let identity_frontier = MerklePath::tls_deserialize(bytes)?;
        let ratchet_frontier: Vec<x25519::PublicKey> = codec::read_element_sequence(bytes)?;

        if identity_frontier.is_empty() || ratchet_frontier.is_empty() {
            return Err(tls_codec::Error::DecodingError(
                "group pre-key frontiers must contain at least one node".into(),
            ));
        }

        Ok(Self {
            epoch,
            group_id,
            group_size,
            update_key,
            identity_frontier,
            ratchet_frontier,
        })
    }
}

/// Error types for pre-key bundles.
#[derive(Debug, Error)]
pub enum PreKeyError {
    /// The bundle carries no signature at all.
    #[error("pre-key bundle is not signed")]
    MissingSignature,

    /// The self-signature does not match the bundle's identity key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The bundle could not be encoded for signing.
    #[error(transparent)]
    Codec(#[from] tls_codec::Error),

    /// Key generation ran out of randomness.
    #[error(transparent)]
    Rng(#[from] RngError),
}

#[cfg(test)]
mod tests {
    use tls_codec::Serialize as TlsSerialize;

    use crate::crypto::x25519;
    use crate::crypto::Rng;
    use crate::identity::PrivateKey;
    use crate::merkle::{MerkleNode, MerklePath};

    use super::{GroupPreKey, PreKeyError, UserPreKey};

    fn sample_group_pre_key(rng: &mut Rng) -> GroupPreKey {
        let update_key = x25519::SecretKey::generate(rng).unwrap().public_key();
        let ratchet_key = x25519::SecretKey::generate(rng).unwrap().public_key();
        GroupPreKey {
            epoch: 7,
            group_id: b"garden".to_vec(),
            group_size: 4,
            update_key,
            identity_frontier: MerklePath::new(vec![MerkleNode::from_leaf(b"roster")]),
            ratchet_frontier: vec![ratchet_key],
        }
    }

    #[test]
    fn generate_and_verify() {
        let mut rng = Rng::from_seed([1; 32]);
        let identity_key = PrivateKey::generate(&mut rng).unwrap();

        let (ephemeral_key, bundle) = UserPreKey::generate(&identity_key, &mut rng).unwrap();
        assert_eq!(&ephemeral_key.public_key(), bundle.pre_key());
        assert_eq!(&identity_key.public_key(), bundle.identity_key());
        bundle.verify().unwrap();
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mut rng = Rng::from_seed([2; 32]);
        let identity_key = PrivateKey::generate(&mut rng).unwrap();
        let (_, bundle) = UserPreKey::generate(&identity_key, &mut rng).unwrap();

        // Same keys, signature by the wrong identity
        let wrong_signer = PrivateKey::generate(&mut rng).unwrap();
        let forged = UserPreKey::new(
            *bundle.pre_key(),
            *bundle.identity_key(),
            Some(wrong_signer.sign(b"anything")),
        );
        assert!(matches!(
            forged.verify(),
            Err(PreKeyError::InvalidSignature)
        ));

        let unsigned = UserPreKey::new(*bundle.pre_key(), *bundle.identity_key(), None);
        assert!(matches!(
            unsigned.verify(),
            Err(PreKeyError::MissingSignature)
        ));
    }

    #[test]
    fn user_pre_key_roundtrip() {
        let mut rng = Rng::from_seed([3; 32]);
        let identity_key = PrivateKey::generate(&mut rng).unwrap();
        let (_, bundle) = UserPreKey::generate(&identity_key, &mut rng).unwrap();

        let encoded = crate::codec::encode(&bundle).unwrap();
        assert_eq!(encoded, bundle.tls_serialize_detached().unwrap());

        let decoded: UserPreKey = crate::codec::decode(&encoded).unwrap();
        assert_eq!(decoded, bundle);
        decoded.verify().unwrap();

        // Decoding a re-encoding reproduces the exact bytes
        assert_eq!(crate::codec::encode(&decoded).unwrap(), encoded);
    }

    #[test]
    fn group_pre_key_roundtrip() {
        let mut rng = Rng::from_seed([4; 32]);
        let group_pre_key = sample_group_pre_key(&mut rng);

        let encoded = crate::codec::encode(&group_pre_key).unwrap();
        let decoded: GroupPreKey = crate::codec::decode(&encoded).unwrap();
        assert_eq!(decoded, group_pre_key);
        assert_eq!(crate::codec::encode(&decoded).unwrap(), encoded);
    }

    #[test]
    fn empty_frontiers_are_rejected() {
        let mut rng = Rng::from_seed([5; 32]);

        let mut group_pre_key = sample_group_pre_key(&mut rng);
        group_pre_key.identity_frontier = MerklePath::default();
        assert!(crate::codec::encode(&group_pre_key).is_err());

        let mut group_pre_key = sample_group_pre_key(&mut rng);
        group_pre_key.ratchet_frontier = Vec::new();
        assert!(crate::codec::encode(&group_pre_key).is_err());

        // Craft bytes with an empty ratchet frontier: take a valid encoding and truncate the
        // trailing sequence down to its empty length header
        let group_pre_key = sample_group_pre_key(&mut rng);
        let mut encoded = crate::codec::encode(&group_pre_key).unwrap();
        encoded.truncate(encoded.len() - 32);
        let header_at = encoded.len() - 2;
        encoded[header_at..].copy_from_slice(&[0, 0]);
        assert!(crate::codec::decode::<GroupPreKey>(&encoded).is_err());
    }
}
