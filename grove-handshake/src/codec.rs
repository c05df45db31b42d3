// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical binary encoding and decoding of handshake data types.
//!
//! All wire types in this crate implement the [`tls_codec`] traits by hand; this module holds the
//! shared building blocks (length-prefixed opaque fields, length-prefixed element sequences and
//! the three-byte body length) plus the [`encode`] and [`decode`] entry points. Encoding is
//! deterministic and decoding is strict: every length header must match its payload exactly and
//! [`decode`] rejects trailing input.
use std::io::{Read, Write};

use thiserror::Error;
use tls_codec::{Deserialize, Serialize, Size};

use crate::identity::{SIGNATURE_SIZE, Signature};

/// Byte-width of the length header in front of every variable-length field.
pub(crate) const LENGTH_HEADER_SIZE: usize = 2;

/// Byte-width of the length header in front of a handshake body.
pub(crate) const BODY_LENGTH_HEADER_SIZE: usize = 3;

/// Serializes a value into its canonical byte encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(value.tls_serialize_detached()?)
}

/// Deserializes a value from its canonical byte encoding.
///
/// The whole input must belong to the value; leftover bytes are rejected.
pub fn decode<T: Deserialize>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut remaining = bytes;
    let value = T::tls_deserialize(&mut remaining)?;
    if !remaining.is_empty() {
        return Err(CodecError::TrailingBytes(remaining.len()));
    }
    Ok(value)
}

/// An error occurred while encoding or decoding a handshake data type.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying TLS codec rejected the value or the input bytes.
    #[error(transparent)]
    Tls(#[from] tls_codec::Error),

    /// A value was decoded but did not consume the whole input.
    #[error("{0} trailing bytes after decoded value")]
    TrailingBytes(usize),
}

/// Writes an opaque byte field with a two-byte length header.
pub(crate) fn write_variable_bytes<W: Write>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<usize, tls_codec::Error> {
    let header = u16::try_from(bytes.len()).map_err(|_| tls_codec::Error::InvalidVectorLength)?;
    let written = header.tls_serialize(writer)?;
    writer
        .write_all(bytes)
        .map_err(|err| tls_codec::Error::EncodingError(err.to_string()))?;
    Ok(written + bytes.len())
}

/// Reads an opaque byte field with a two-byte length header.
pub(crate) fn read_variable_bytes<R: Read>(bytes: &mut R) -> Result<Vec<u8>, tls_codec::Error> {
    let length = u16::tls_deserialize(bytes)? as usize;
    let mut payload = vec![0u8; length];
    bytes
        .read_exact(&mut payload)
        .map_err(|_| tls_codec::Error::EndOfStream)?;
    Ok(payload)
}

/// Serialized byte length of an opaque field holding `payload_len` bytes.
pub(crate) fn variable_bytes_len(payload_len: usize) -> usize {
    LENGTH_HEADER_SIZE + payload_len
}

/// Writes a sequence of fixed-size elements with a two-byte length header counting the payload
/// bytes, not the elements.
pub(crate) fn write_element_sequence<W: Write, T: Serialize + Size>(
    writer: &mut W,
    elements: &[T],
) -> Result<usize, tls_codec::Error> {
    let payload_len: usize = elements
        .iter()
        .map(Size::tls_serialized_len)
        .sum();
    let header = u16::try_from(payload_len).map_err(|_| tls_codec::Error::InvalidVectorLength)?;
    let mut written = header.tls_serialize(writer)?;
    for element in elements {
        written += element.tls_serialize(writer)?;
    }
    Ok(written)
}

/// Reads a sequence of fixed-size elements with a two-byte length header.
///
/// The declared payload length must hold a whole number of elements; a partial trailing element
/// is a decode error.
pub(crate) fn read_element_sequence<R: Read, T: Deserialize>(
    bytes: &mut R,
) -> Result<Vec<T>, tls_codec::Error> {
    let payload = read_variable_bytes(bytes)?;
    let mut remaining = payload.as_slice();
    let mut elements = Vec::new();
    while !remaining.is_empty() {
        elements.push(T::tls_deserialize(&mut remaining)?);
    }
    Ok(elements)
}

/// Serialized byte length of an element sequence.
pub(crate) fn element_sequence_len<T: Size>(elements: &[T]) -> usize {
    LENGTH_HEADER_SIZE
        + elements
            .iter()
            .map(Size::tls_serialized_len)
            .sum::<usize>()
}

/// Writes the three-byte length header in front of a handshake body.
pub(crate) fn write_body_length<W: Write>(
    writer: &mut W,
    length: usize,
) -> Result<usize, tls_codec::Error> {
    if length >= 1 << 24 {
        return Err(tls_codec::Error::InvalidVectorLength);
    }
    let bytes = (length as u32).to_be_bytes();
    writer
        .write_all(&bytes[1..])
        .map_err(|err| tls_codec::Error::EncodingError(err.to_string()))?;
    Ok(BODY_LENGTH_HEADER_SIZE)
}

/// Reads the three-byte length header in front of a handshake body.
pub(crate) fn read_body_length<R: Read>(bytes: &mut R) -> Result<usize, tls_codec::Error> {
    let mut header = [0u8; BODY_LENGTH_HEADER_SIZE];
    bytes
        .read_exact(&mut header)
        .map_err(|_| tls_codec::Error::EndOfStream)?;
    Ok(u32::from_be_bytes([0, header[0], header[1], header[2]]) as usize)
}

/// Writes a signature field; a not-yet-computed signature encodes as a zero-length field.
pub(crate) fn write_signature<W: Write>(
    writer: &mut W,
    signature: Option<&Signature>,
) -> Result<usize, tls_codec::Error> {
    match signature {
        Some(signature) => write_variable_bytes(writer, &signature.to_bytes()),
        None => write_variable_bytes(writer, &[]),
    }
}

/// Reads a signature field; only empty or exactly signature-sized payloads are accepted.
pub(crate) fn read_signature<R: Read>(
    bytes: &mut R,
) -> Result<Option<Signature>, tls_codec::Error> {
    let payload = read_variable_bytes(bytes)?;
    if payload.is_empty() {
        return Ok(None);
    }
    let payload: [u8; SIGNATURE_SIZE] = payload.try_into().map_err(|payload: Vec<u8>| {
        tls_codec::Error::DecodingError(format!(
            "invalid signature length {} bytes, expected {} bytes",
            payload.len(),
            SIGNATURE_SIZE
        ))
    })?;
    Ok(Some(Signature::from_bytes(payload)))
}

/// Serialized byte length of a signature field.
pub(crate) fn signature_field_len(signature: Option<&Signature>) -> usize {
    match signature {
        Some(_) => LENGTH_HEADER_SIZE + SIGNATURE_SIZE,
        None => LENGTH_HEADER_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CodecError, decode, read_body_length, read_element_sequence, read_variable_bytes,
        write_body_length, write_element_sequence, write_variable_bytes,
    };

    #[test]
    fn variable_bytes_roundtrip() {
        for payload in [vec![], vec![42], vec![7; 512]] {
            let mut bytes = Vec::new();
            let written = write_variable_bytes(&mut bytes, &payload).unwrap();
            assert_eq!(written, bytes.len());
            assert_eq!(bytes.len(), 2 + payload.len());
            let decoded = read_variable_bytes(&mut bytes.as_slice()).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn variable_bytes_rejects_truncated_payload() {
        // Header promises four bytes, only three follow
        let bytes = [0, 4, 1, 2, 3];
        assert!(read_variable_bytes(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn element_sequence_roundtrip() {
        let elements: Vec<u32> = vec![1, 2, 3];
        let mut bytes = Vec::new();
        write_element_sequence(&mut bytes, &elements).unwrap();
        assert_eq!(bytes.len(), 2 + 3 * 4);
        let decoded: Vec<u32> = read_element_sequence(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, elements);
    }

    #[test]
    fn element_sequence_rejects_partial_element() {
        // Five payload bytes cannot hold a whole number of u32 elements
        let bytes = [0, 5, 0, 0, 0, 1, 9];
        assert!(read_element_sequence::<_, u32>(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn body_length_roundtrip() {
        for length in [0usize, 1, 255, 65_536, (1 << 24) - 1] {
            let mut bytes = Vec::new();
            write_body_length(&mut bytes, length).unwrap();
            assert_eq!(bytes.len(), 3);
            assert_eq!(read_body_length(&mut bytes.as_slice()).unwrap(), length);
        }
    }

    #[test]
    fn body_length_rejects_oversized_value() {
        let mut bytes = Vec::new();
        assert!(write_body_length(&mut bytes, 1 << 24).is_err());
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let result = decode::<u16>(&[0, 1, 99]);
        assert!(matches!(result, Err(CodecError::TrailingBytes(1))));
    }
}
