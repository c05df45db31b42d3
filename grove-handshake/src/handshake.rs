// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handshake envelope: one signed, self-authenticating message per group operation.
//!
//! A [`Handshake`] wraps exactly one [`HandshakeBody`] variant together with the sender's
//! [`GroupPreKey`] snapshot, their position in the roster, a Merkle copath proving roster
//! membership of their identity key and a signature over everything else in the message. The
//! envelope has no internal state machine: it is populated field by field, signed once and from
//! then on only encoded, decoded or verified.
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tls_codec::{Deserialize as TlsDeserialize, Serialize as TlsSerialize, Size};

use crate::codec;
use crate::crypto::x25519;
use crate::identity;
use crate::identity::Signature;
use crate::merkle::{MerkleError, MerkleNode, MerklePath};
use crate::prekey::{GroupPreKey, UserPreKey};

/// Discriminant in front of every encoded handshake body.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    tls_codec::TlsSerialize,
    tls_codec::TlsDeserialize,
    tls_codec::TlsSize,
)]
#[repr(u8)]
pub enum HandshakeType {
    None = 0,
    UserAdd = 1,
    GroupAdd = 2,
    Update = 3,
    Delete = 4,
}

impl TryFrom<u8> for HandshakeType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HandshakeType::None),
            1 => Ok(HandshakeType::UserAdd),
            2 => Ok(HandshakeType::GroupAdd),
            3 => Ok(HandshakeType::Update),
            4 => Ok(HandshakeType::Delete),
            _ => Err("unknown handshake message type"),
        }
    }
}

/// A new member announces themselves to the group with the DH keys along their path into the
/// key-derivation tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAdd {
    /// Never empty.
    pub add_path: Vec<x25519::PublicKey>,
}

/// A current member sponsors a new one, using the new member's published pre-key bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAdd {
    pub pre_key: UserPreKey,
}

/// A member rotates the DH keys along their path in the key-derivation tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Never empty.
    pub path: Vec<x25519::PublicKey>,
}

/// A member removes the member at roster index `deleted`, rotating their own path at the same
/// time so the removed member loses access to the next epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delete {
    pub deleted: u32,

    /// Never empty.
    pub path: Vec<x25519::PublicKey>,
}

impl tls_codec::Size for UserAdd {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        codec::element_sequence_len(&self.add_path)
    }
}

impl tls_codec::Serialize for UserAdd {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        write_key_path(writer, &self.add_path)
    }
}

impl tls_codec::Deserialize for UserAdd {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        Ok(Self {
            add_path: read_key_path(bytes)?,
        })
    }
}

impl tls_codec::Size for GroupAdd {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.pre_key.tls_serialized_len()
    }
}

impl tls_codec::Serialize for GroupAdd {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        self.pre_key.tls_serialize(writer)
    }
}

impl tls_codec::Deserialize for GroupAdd {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        Ok(Self {
            pre_key: UserPreKey::tls_deserialize(bytes)?,
        })
    }
}

impl tls_codec::Size for Update {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        codec::element_sequence_len(&self.path)
    }
}

impl tls_codec::Serialize for Update {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        write_key_path(writer, &self.path)
    }
}

impl tls_codec::Deserialize for Update {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        Ok(Self {
            path: read_key_path(bytes)?,
        })
    }
}

impl tls_codec::Size for Delete {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.deleted.tls_serialized_len() + codec::element_sequence_len(&self.path)
    }
}

impl tls_codec::Serialize for Delete {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        let mut written = self.deleted.tls_serialize(writer)?;
        written += write_key_path(writer, &self.path)?;
        Ok(written)
    }
}

impl tls_codec::Deserialize for Delete {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let deleted = u32::tls_deserialize(bytes)?;
        let path = read_key_path(bytes)?;
        Ok(Self { deleted, path })
    }
}

/// Writes a ratchet path, rejecting empty ones.
fn write_key_path<W: Write>(
    writer: &mut W,
    path: &[x25519::PublicKey],
) -> Result<usize, tls_codec::Error> {
    if path.is_empty() {
        return Err(tls_codec::Error::EncodingError(
            "key path must contain at least one key".into(),
        ));
    }
    codec::write_element_sequence(writer, path)
}

/// Reads a ratchet path, rejecting empty ones.
fn read_key_path<R: Read>(bytes: &mut R) -> Result<Vec<x25519::PublicKey>, tls_codec::Error> {
    let path: Vec<x25519::PublicKey> = codec::read_element_sequence(bytes)?;
    if path.is_empty() {
        return Err(tls_codec::Error::DecodingError(
            "key path must contain at least one key".into(),
        ));
    }
    Ok(path)
}

/// The operation a handshake message announces.
///
/// The variant set is closed: it is fixed by the protocol version, every variant maps to exactly
/// one [`HandshakeType`] discriminant and decoding dispatches over that table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeBody {
    None,
    UserAdd(UserAdd),
    GroupAdd(GroupAdd),
    Update(Update),
    Delete(Delete),
}

impl HandshakeBody {
    /// The discriminant this body encodes behind.
    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            HandshakeBody::None => HandshakeType::None,
            HandshakeBody::UserAdd(_) => HandshakeType::UserAdd,
            HandshakeBody::GroupAdd(_) => HandshakeType::GroupAdd,
            HandshakeBody::Update(_) => HandshakeType::Update,
            HandshakeBody::Delete(_) => HandshakeType::Delete,
        }
    }

    fn inner_len(&self) -> usize {
        match self {
            HandshakeBody::None => 0,
            HandshakeBody::UserAdd(body) => body.tls_serialized_len(),
            HandshakeBody::GroupAdd(body) => body.tls_serialized_len(),
            HandshakeBody::Update(body) => body.tls_serialized_len(),
            HandshakeBody::Delete(body) => body.tls_serialized_len(),
        }
    }
}

impl tls_codec::Size for HandshakeBody {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.handshake_type().tls_serialized_len()
            + codec::BODY_LENGTH_HEADER_SIZE
            + self.inner_len()
    }
}

impl tls_codec::Serialize for HandshakeBody {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        let mut written = self.handshake_type().tls_serialize(writer)?;
        written += codec::write_body_length(writer, self.inner_len())?;
        written += match self {
            HandshakeBody::None => 0,
            HandshakeBody::UserAdd(body) => body.tls_serialize(writer)?,
            HandshakeBody::GroupAdd(body) => body.tls_serialize(writer)?,
            HandshakeBody::Update(body) => body.tls_serialize(writer)?,
            HandshakeBody::Delete(body) => body.tls_serialize(writer)?,
        };
        Ok(written)
    }
}

impl tls_codec::Deserialize for HandshakeBody {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let message_type = match HandshakeType::try_from(u8::tls_deserialize(bytes)?) {
            Ok(message_type) => message_type,
            Err(error) => return Err(tls_codec::Error::DecodingError(error.to_string())),
        };

        // Decode the variant from exactly the declared number of bytes
        let inner_length = codec::read_body_length(bytes)?;
        let mut inner = vec![0u8; inner_length];
        bytes
            .read_exact(&mut inner)
            .map_err(|_| tls_codec::Error::EndOfStream)?;
        let mut inner = inner.as_slice();

        let body = match message_type {
            HandshakeType::None => HandshakeBody::None,
            HandshakeType::UserAdd => HandshakeBody::UserAdd(UserAdd::tls_deserialize(&mut inner)?),
            HandshakeType::GroupAdd => {
                HandshakeBody::GroupAdd(GroupAdd::tls_deserialize(&mut inner)?)
            }
            HandshakeType::Update => HandshakeBody::Update(Update::tls_deserialize(&mut inner)?),
            HandshakeType::Delete => HandshakeBody::Delete(Delete::tls_deserialize(&mut inner)?),
        };

        if !inner.is_empty() {
            return Err(tls_codec::Error::DecodingError(format!(
                "handshake body left {} undecoded bytes",
                inner.len()
            )));
        }
        Ok(body)
    }
}

/// A signed, self-authenticating message announcing one group operation.
///
/// Construction is two-phase: populate every field except `signature`, then call [`sign`]. The
/// signature covers the canonical encoding of the whole message with the trailing signature
/// field stripped, so receivers can recover the signed byte range from the encoding alone.
///
/// [`sign`]: Handshake::sign
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// The operation this message announces.
    pub body: HandshakeBody,

    /// Snapshot of the group's cryptographic state at the sender's epoch.
    pub pre_key: GroupPreKey,

    /// The sender's position in the roster; always below `pre_key.group_size`.
    pub signer_index: u32,

    /// Copath of the sender's identity key in the roster tree.
    pub identity_proof: MerklePath,

    /// The sender's identity key; filled in by [`Handshake::sign`].
    pub identity_key: identity::PublicKey,

    /// Signature over everything above; `None` until the message is signed.
    pub signature: Option<Signature>,
}

impl Handshake {
    /// Signs the message with the sender's identity key, completing the two-phase build.
    ///
    /// Stores the public half of `identity_key` in the message, encodes the message with an
    /// empty signature field, strips that placeholder and signs the remaining prefix.
    pub fn sign(&mut self, identity_key: &identity::PrivateKey) -> Result<(), HandshakeError> {
        self.identity_key = identity_key.public_key();
        self.signature = None;

        let to_be_signed = self.to_be_signed()?;
        self.signature = Some(identity_key.sign(&to_be_signed));
        Ok(())
    }

    /// Checks the message's self-signature and, if `identity_root` is given, that the embedded
    /// identity key is part of the roster with that root.
    ///
    /// Passing `None` skips the membership check; that is only appropriate while the message
    /// itself establishes the roster, for example directly after an add operation.
    pub fn verify(&self, identity_root: Option<&MerkleNode>) -> Result<(), HandshakeError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(HandshakeError::MissingSignature)?;

        let to_be_signed = self.to_be_signed()?;
        if !self.identity_key.verify(&to_be_signed, signature) {
            return Err(HandshakeError::InvalidSignature);
        }

        if self.signer_index >= self.pre_key.group_size {
            return Err(HandshakeError::SignerIndexOutOfRange(
                self.signer_index,
                self.pre_key.group_size,
            ));
        }

        if let Some(identity_root) = identity_root {
            let leaf = MerkleNode::from_leaf(self.identity_key.as_bytes());
            let root = self.identity_proof.copath_root(
                self.signer_index,
                self.pre_key.group_size,
                leaf,
            )?;
            if &root != identity_root {
                return Err(HandshakeError::InclusionCheckFailed);
            }
        }

        Ok(())
    }

    /// The roster root defined by this message's own pre-key snapshot.
    ///
    /// Receivers use this as the next expected `identity_root` once they accept a handshake
    /// which changed the roster.
    pub fn identity_root(&self) -> Result<MerkleNode, MerkleError> {
        self.pre_key.identity_frontier.frontier_root()
    }

    /// The exact byte range covered by the signature: the canonical encoding with the trailing
    /// signature field stripped.
    fn to_be_signed(&self) -> Result<Vec<u8>, tls_codec::Error> {
        let mut bytes = self.tls_serialize_detached()?;
        let signature_field = codec::signature_field_len(self.signature.as_ref());
        bytes.truncate(bytes.len() - signature_field);
        Ok(bytes)
    }
}

impl tls_codec::Size for Handshake {
    #[inline]
    fn tls_serialized_len(&self) -> usize {
        self.body.tls_serialized_len()
            + self.pre_key.tls_serialized_len()
            + self.signer_index.tls_serialized_len()
            + self.identity_proof.tls_serialized_len()
            + self.identity_key.tls_serialized_len()
            + codec::signature_field_len(self.signature.as_ref())
    }
}

impl tls_codec::Serialize for Handshake {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, tls_codec::Error> {
        let mut written = self.body.tls_serialize(writer)?;
        written += self.pre_key.tls_serialize(writer)?;
        written += self.signer_index.tls_serialize(writer)?;
        written += self.identity_proof.tls_serialize(writer)?;
        written += self.identity_key.tls_serialize(writer)?;
        written += codec::write_signature(writer, self.signature.as_ref())?;
        Ok(written)
    }
}

impl tls_codec::Deserialize for Handshake {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, tls_codec::Error> {
        let body = HandshakeBody::tls_deserialize(bytes)?;
        let pre_key = GroupPreKey::tls_deserialize(bytes)?;
        let signer_index = u32::tls_deserialize(bytes)?;
        let identity_proof = MerklePath::tls_deserialize(bytes)?;
        let identity_key = identity::PublicKey::tls_deserialize(bytes)?;
        let signature = codec::read_signature(bytes)?;

        Ok(Self {
            body,
            pre_key,
            signer_index,
            identity_proof,
            identity_key,
            signature,
        })
    }
}

/// Error types for handshake signing and verification.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The message carries no signature at all.
    #[error("handshake is not signed")]
    MissingSignature,

    /// The self-signature does not match the embedded identity key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The claimed roster position does not exist at the message's epoch.
    #[error("signer index {0} out of range for group of size {1}")]
    SignerIndexOutOfRange(u32, u32),

    /// The membership proof does not lead to the expected roster root.
    #[error("membership inclusion check failed")]
    InclusionCheckFailed,

    /// The message could not be encoded for signing or verification.
    #[error(transparent)]
    Codec(#[from] tls_codec::Error),

    /// The membership proof itself was unusable.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
}
