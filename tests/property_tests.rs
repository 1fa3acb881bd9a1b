//! Property-based tests using proptest
//!
//! These tests validate decoding invariants across a wide range of randomly
//! generated requests, and that arbitrary bytes are rejected without panics.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bson::Document;
use docwire::core::frame::{Frame, HEADER_LEN};
use docwire::protocol::op_msg::{self, DocumentSequence};
use docwire::protocol::{op_insert, op_query};
use proptest::prelude::*;

fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec(("[a-z]{1,6}", any::<i32>()), 0..12).prop_map(|fields| {
        let mut doc = Document::new();
        for (key, value) in fields {
            doc.insert(key, value);
        }
        doc
    })
}

// Property: OP_QUERY fields survive encode/decode
proptest! {
    #[test]
    fn prop_op_query_fields_preserved(
        db in "[a-z]{1,8}",
        collection in "[a-z$]{1,8}",
        skip in any::<i32>(),
        ret in any::<i32>(),
        query in document_strategy(),
    ) {
        let namespace = format!("{db}.{collection}");
        let frame = op_query::encode_request(1, &namespace, skip, ret, &query).unwrap();
        let request = op_query::decode(1, &frame.body).unwrap();

        prop_assert_eq!(request.meta.namespace.as_deref(), Some(namespace.as_str()));
        prop_assert_eq!(request.meta.database.as_deref(), Some(db.as_str()));
        prop_assert_eq!(request.meta.num_to_skip, Some(skip));
        prop_assert_eq!(request.meta.num_to_return, Some(ret));
        prop_assert_eq!(request.meta.is_command, collection == "$cmd");
        prop_assert_eq!(request.query, query);
    }
}

// Property: OP_MSG body keys keep wire order and sequences land last
proptest! {
    #[test]
    fn prop_op_msg_key_order(
        body in document_strategy(),
        docs in prop::collection::vec(document_strategy(), 0..5),
    ) {
        let seq = DocumentSequence { identifier: "zz_items".to_string(), documents: docs.clone() };
        let frame = op_msg::encode_request(1, 0, &body, &[seq]).unwrap();
        let request = op_msg::decode(1, &frame.body).unwrap();

        let mut keys: Vec<&str> = body.keys().map(String::as_str).collect();
        keys.push("zz_items");
        let decoded: Vec<&str> = request.query.keys().map(String::as_str).collect();
        prop_assert_eq!(decoded, keys);
        prop_assert_eq!(request.query.get_array("zz_items").unwrap().len(), docs.len());
    }
}

// Property: every reply's length field equals its size on the wire
proptest! {
    #[test]
    fn prop_reply_length_matches(result in document_strategy(), request_id in any::<i32>()) {
        let msg = op_msg::encode_reply(&result, request_id, 1).unwrap();
        let legacy = op_query::encode_reply(std::slice::from_ref(&result), request_id, 2).unwrap();

        for reply in [msg, legacy] {
            let frame = Frame::from_bytes(&reply, usize::MAX).unwrap();
            prop_assert_eq!(frame.header.length as usize, reply.len());
            prop_assert_eq!(reply.len(), HEADER_LEN + frame.body.len());
            prop_assert_eq!(frame.header.response_to, request_id);
        }
    }
}

// Property: batch inserts keep every document in order
proptest! {
    #[test]
    fn prop_op_insert_batch_preserved(docs in prop::collection::vec(document_strategy(), 1..8)) {
        let frame = op_insert::encode_request(1, 0, "db.c", &docs).unwrap();
        let request = op_insert::decode(1, &frame.body).unwrap();

        prop_assert_eq!(&request.query, &docs[0]);
        prop_assert_eq!(&request.meta.extra_documents[..], &docs[1..]);
    }
}

// Property: arbitrary bodies never panic any decoder
proptest! {
    #[test]
    fn prop_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = op_msg::decode(1, &bytes);
        let _ = op_query::decode(1, &bytes);
        let _ = op_insert::decode(1, &bytes);
        let _ = op_query::decode_reply(&bytes);
        let _ = Frame::from_bytes(&bytes, 1024 * 1024);
    }
}
