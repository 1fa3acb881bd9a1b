//! # Document Codec
//!
//! Boundary over the `bson` crate. Documents keep field insertion order in both
//! directions, which matters because the first field of a command names it.
//!
//! Each encoded document starts with its own little-endian `i32` total length,
//! so a run of documents is split by walking those length prefixes before any
//! document is handed to the parser.

use bson::Document;

use crate::error::{constants, ProtocolError, Result};

/// Smallest valid encoded document: length prefix plus terminating NUL.
pub const MIN_DOCUMENT_LEN: usize = 5;

/// Encode a document to its binary form.
pub fn encode(document: &Document) -> Result<Vec<u8>> {
    Ok(bson::to_vec(document)?)
}

/// Append the encoded form of `document` to `dst`.
pub fn encode_into(document: &Document, dst: &mut Vec<u8>) -> Result<()> {
    document.to_writer(dst)?;
    Ok(())
}

/// Decode exactly one document occupying all of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    let len = document_len(bytes)?;
    if len != bytes.len() {
        return Err(ProtocolError::malformed(constants::ERR_TRUNCATED_DOCUMENT));
    }
    let mut reader = bytes;
    Ok(Document::from_reader(&mut reader)?)
}

/// Decode a back-to-back sequence of documents filling all of `bytes`.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Document>> {
    decode_all_sized(bytes).map(|(docs, _)| docs)
}

/// Like [`decode_all`], also returning the encoded size of the largest document.
pub fn decode_all_sized(bytes: &[u8]) -> Result<(Vec<Document>, usize)> {
    let mut docs = Vec::new();
    let mut largest = 0;
    let mut rest = bytes;
    while !rest.is_empty() {
        let len = document_len(rest)?;
        let (head, tail) = rest.split_at(len);
        docs.push(decode(head)?);
        largest = largest.max(len);
        rest = tail;
    }
    Ok((docs, largest))
}

/// Read and check the length prefix of the document at the front of `bytes`.
pub fn document_len(bytes: &[u8]) -> Result<usize> {
    let prefix: [u8; 4] = bytes
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ProtocolError::malformed(constants::ERR_TRUNCATED_DOCUMENT))?;
    let len = i32::from_le_bytes(prefix);
    let len = usize::try_from(len)
        .map_err(|_| ProtocolError::malformed(constants::ERR_DOCUMENT_TOO_SHORT))?;
    if len < MIN_DOCUMENT_LEN {
        return Err(ProtocolError::malformed(constants::ERR_DOCUMENT_TOO_SHORT));
    }
    if len > bytes.len() {
        return Err(ProtocolError::malformed(constants::ERR_TRUNCATED_DOCUMENT));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn decode_all_preserves_order_and_count() {
        let first = doc! { "insert": "users", "ordered": true };
        let second = doc! { "z": 1, "a": 2, "m": 3 };
        let mut bytes = encode(&first).unwrap();
        encode_into(&second, &mut bytes).unwrap();

        let docs = decode_all(&bytes).unwrap();
        assert_eq!(docs, vec![first, second]);
        let keys: Vec<&str> = docs[1].keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn sized_decode_reports_largest_document() {
        let small = encode(&doc! { "a": 1 }).unwrap();
        let large = encode(&doc! { "name": "a much longer value than the first" }).unwrap();
        let mut bytes = small.clone();
        bytes.extend_from_slice(&large);
        bytes.extend_from_slice(&small);

        let (docs, largest) = decode_all_sized(&bytes).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(largest, large.len());
        assert_eq!(decode_all_sized(&[]).unwrap().1, 0);
    }

    #[test]
    fn empty_input_has_no_documents() {
        assert!(decode_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_document_is_malformed() {
        let bytes = encode(&doc! { "ping": 1 }).unwrap();
        let result = decode_all(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn tiny_length_prefix_is_rejected() {
        let result = decode_all(&[4, 0, 0, 0, 0]);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn corrupt_body_surfaces_codec_error() {
        // Valid length prefix, unknown element type 0x20.
        let bytes = [8u8, 0, 0, 0, 0x20, b'a', 0, 0];
        assert!(decode(&bytes).is_err());
    }
}
