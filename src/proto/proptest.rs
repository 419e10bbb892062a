//! Property-Based Tests for the Wire Codec
//!
//! # Test Properties
//!
//! 1. **Roundtrip**: decode(encode(frame)) = frame within the configured limits
//! 2. **Limit Enforcement**: declared lengths above the limits never decode
//! 3. **Incremental Decoding**: any split of a valid stream decodes identically

#![cfg(test)]

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;

use super::{
    decode_request, decode_response, encode_request, encode_response, FrameLimits, ProtocolError,
    Request, Response, Status,
};

// =============================================================================
// Property Strategies
// =============================================================================

const MAX_KEY: u16 = 256;
const MAX_VALUE: u32 = 2048;

fn limits() -> FrameLimits {
    FrameLimits::new(MAX_KEY, MAX_VALUE)
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=MAX_KEY as usize)
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=MAX_VALUE as usize)
}

fn request_strategy() -> impl Strategy<Value = Request> {
    prop_oneof![
        key_strategy().prop_map(|k| Request::get(k)),
        (key_strategy(), value_strategy()).prop_map(|(k, v)| Request::set(k, v)),
    ]
}

fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![Just(Status::Ok), Just(Status::NotFound), Just(Status::Error)]
}

// =============================================================================
// Roundtrip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: a request within limits survives encode/decode unchanged.
    #[test]
    fn prop_request_roundtrip(req in request_strategy()) {
        let mut buf = BytesMut::new();
        encode_request(&req, &mut buf)?;
        prop_assert_eq!(buf.len(), req.encoded_len());

        let decoded = decode_request(&mut buf, &limits())?;
        prop_assert_eq!(decoded, Some(req));
        prop_assert!(buf.is_empty());
    }

    /// Property: a response within limits survives encode/decode unchanged.
    #[test]
    fn prop_response_roundtrip(status in status_strategy(), value in value_strategy()) {
        let res = Response { status, value: Bytes::from(value) };
        let mut buf = BytesMut::new();
        encode_response(&res, &mut buf)?;

        let decoded = decode_response(&mut buf, MAX_VALUE)?;
        prop_assert_eq!(decoded, Some(res));
        prop_assert!(buf.is_empty());
    }

    /// Property: feeding a request stream one chunk at a time yields the same frames.
    #[test]
    fn prop_incremental_decode(
        reqs in prop::collection::vec(request_strategy(), 1..5),
        chunk in 1usize..64,
    ) {
        let mut wire = BytesMut::new();
        for req in &reqs {
            encode_request(req, &mut wire)?;
        }

        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(req) = decode_request(&mut buf, &limits())? {
                decoded.push(req);
            }
        }

        prop_assert_eq!(decoded, reqs);
        prop_assert!(buf.is_empty());
    }
}

// =============================================================================
// Limit Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: keys longer than the decoder limit are always rejected.
    #[test]
    fn prop_oversized_key_rejected(extra in 1usize..64) {
        let req = Request::get(vec![b'k'; MAX_KEY as usize + extra]);
        let mut buf = BytesMut::new();
        encode_request(&req, &mut buf)?;

        let result = decode_request(&mut buf, &limits());
        let is_key_too_large = matches!(result, Err(ProtocolError::KeyTooLarge { .. }));
        prop_assert!(is_key_too_large);
    }

    /// Property: any op byte other than GET/SET is rejected.
    #[test]
    fn prop_invalid_op_rejected(op in any::<u8>().prop_filter("valid op", |b| *b != 0x01 && *b != 0x02)) {
        let mut buf = BytesMut::from(&[op, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_request(&mut buf, &limits());
        let is_invalid_op = matches!(result, Err(ProtocolError::InvalidOp(b)) if b == op);
        prop_assert!(is_invalid_op);
    }
}
