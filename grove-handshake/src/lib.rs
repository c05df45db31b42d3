// SPDX-License-Identifier: MIT OR Apache-2.0

//! `grove-handshake` provides the authenticated handshake messages of a tree-based continuous
//! group key-agreement protocol: the data types group members exchange to add and remove members
//! and to rotate their keys, together with the canonical binary encoding and the
//! signing/verification logic which makes every message self-authenticating.
//!
//! ## Messages
//!
//! A [`Handshake`] announces exactly one group operation, expressed as one of five
//! [`HandshakeBody`] variants: a no-op, a new member announcing themselves ([`UserAdd`]), a
//! current member sponsoring a new one ([`GroupAdd`]), a key rotation ([`Update`]) or a member
//! removal ([`Delete`]). Next to the operation itself the message carries a [`GroupPreKey`]
//! snapshot of the group's cryptographic state at the sender's epoch, the sender's position in
//! the roster, a Merkle copath proving that the sender's identity key is part of the roster, and
//! a signature over everything else in the message.
//!
//! Deciding _when_ to send which operation and how to apply an accepted one is the job of the
//! surrounding group state machine; this crate only encodes, signs and verifies self-contained
//! messages. All operations are synchronous, pure functions over their inputs. Nothing here
//! performs I/O.
//!
//! ## Wire format
//!
//! Messages encode in the TLS presentation language via [`tls_codec`]: big-endian integers,
//! length-prefixed opaque fields and a one-byte discriminant in front of every polymorphic body.
//! The encoding is canonical, the same message always encodes to the same bytes, and decoding
//! rejects any input which does not round-trip byte-for-byte.
//!
//! Because the signature is part of the encoded message but cannot sign itself, messages are
//! built in two phases: all fields except the signature are populated, the message is encoded
//! with an empty signature field and the trailing bytes of that placeholder are stripped before
//! signing. Verification recovers the same byte range by stripping the signature field from the
//! received encoding.
//!
//! ## Roster proofs
//!
//! Group membership is tracked in a Merkle tree over the members' identity keys. A
//! [`merkle::MerkleTree`] yields the roster root, per-member copaths and the frontier which is
//! embedded into every [`GroupPreKey`]; [`Handshake::verify`] recomputes the root from the
//! sender's copath to check that the claimed identity key is part of the roster the receiver
//! trusts.
pub mod codec;
pub mod crypto;
pub mod handshake;
pub mod identity;
pub mod merkle;
pub mod prekey;
mod serde;

pub use codec::{CodecError, decode, encode};
pub use crypto::{Rng, RngError};
pub use handshake::{
    Delete, GroupAdd, Handshake, HandshakeBody, HandshakeError, HandshakeType, Update, UserAdd,
};
pub use merkle::{MerkleError, MerkleNode, MerklePath, MerkleTree};
pub use prekey::{GroupPreKey, PreKeyError, UserPreKey};
