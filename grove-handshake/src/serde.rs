// SPDX-License-Identifier: MIT OR Apache-2.0

//! `serde` support for key and node types: hex strings in human-readable formats (JSON), raw
//! bytes otherwise.
//!
//! This layer exists for application-level concerns like key storage or debugging tools; the
//! canonical wire format of handshake messages is the TLS encoding in [`crate::codec`].
use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf as SerdeByteBuf, Bytes as SerdeBytes};

use crate::crypto::x25519;
use crate::identity;
use crate::identity::IdentityError;
use crate::merkle::{MerkleError, MerkleNode};

/// Helper method for `serde` to serialize bytes into a hex string when using a human readable
/// encoding, otherwise it serializes the bytes directly.
pub(crate) fn serialize_hex<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if serializer.is_human_readable() {
        hex::serde::serialize(value, serializer)
    } else {
        SerdeBytes::new(value).serialize(serializer)
    }
}

/// Helper method for `serde` to deserialize from a hex string into bytes when using a human
/// readable encoding, otherwise it deserializes the bytes directly.
pub(crate) fn deserialize_hex<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        hex::serde::deserialize(deserializer)
    } else {
        let bytes = <SerdeByteBuf>::deserialize(deserializer)?;
        Ok(bytes.to_vec())
    }
}

impl Serialize for x25519::PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(self.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for x25519::PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: x25519::X25519Error| serde::de::Error::custom(err.to_string()))
    }
}

impl Serialize for x25519::SecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for x25519::SecretKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        let bytes: [u8; x25519::SECRET_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "invalid x25519 key length {} bytes, expected {} bytes",
                bytes.len(),
                x25519::SECRET_KEY_SIZE
            ))
        })?;
        Ok(x25519::SecretKey::from_bytes(bytes))
    }
}

impl Serialize for identity::PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(self.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for identity::PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: IdentityError| serde::de::Error::custom(err.to_string()))
    }
}

impl Serialize for identity::PrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for identity::PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        let bytes: [u8; identity::PRIVATE_KEY_SIZE] =
            bytes.as_slice().try_into().map_err(|_| {
                serde::de::Error::custom(format!(
                    "invalid identity key length {} bytes, expected {} bytes",
                    bytes.len(),
                    identity::PRIVATE_KEY_SIZE
                ))
            })?;
        Ok(identity::PrivateKey::from_bytes(bytes))
    }
}

impl Serialize for identity::Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for identity::Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: IdentityError| serde::de::Error::custom(err.to_string()))
    }
}

impl Serialize for MerkleNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(self.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for MerkleNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: MerkleError| serde::de::Error::custom(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::identity::PrivateKey;
    use crate::merkle::MerkleNode;

    #[test]
    fn public_key_hex_in_json() {
        let mut rng = Rng::from_seed([1; 32]);
        let public_key = PrivateKey::generate(&mut rng).unwrap().public_key();

        let json = serde_json::to_string(&public_key).unwrap();
        assert_eq!(json, format!("\"{}\"", public_key.to_hex()));

        let decoded: crate::identity::PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, public_key);
    }

    #[test]
    fn merkle_node_roundtrip() {
        let node = MerkleNode::from_leaf(b"leaf");
        let json = serde_json::to_string(&node).unwrap();
        let decoded: MerkleNode = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn signature_roundtrip() {
        let mut rng = Rng::from_seed([2; 32]);
        let private_key = PrivateKey::generate(&mut rng).unwrap();
        let signature = private_key.sign(b"payload");

        let json = serde_json::to_string(&signature).unwrap();
        let decoded: crate::identity::Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, signature);
    }
}
