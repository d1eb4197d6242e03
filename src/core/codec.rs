//! Encoding and decoding of transaction messages.
//!
//! The free functions operate on complete frames: `decode_request` demands
//! exactly the fixed request size and `encode_response` emits the full
//! header-plus-body layout. Partial buffers are the framing layer's concern;
//! [`TransactionCodec`] and [`EndpointCodec`] integrate with
//! `tokio_util::codec::Framed` and accumulate bytes per connection until a
//! complete frame is available.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::wire::{
    Operation, Request, Response, Status, ACK_BODY_LEN, AUTHORITY_ID, KEY_BODY_LEN,
    REQUEST_HEADER_LEN, REQUEST_LEN, RESPONSE_HEADER_LEN, RESPONSE_MAGIC,
};
use crate::core::wire::{KeyMaterial, AUTH_KEY_LEN, ENC_KEY_LEN, SECRET_LEN, SEED_LEN};
use crate::error::{EnrollError, Result};

/// Decode a complete request frame.
///
/// # Errors
/// Fails if `buf` is not exactly [`REQUEST_LEN`] bytes or the operation code
/// is unknown.
pub fn decode_request(buf: &[u8]) -> Result<Request> {
    if buf.len() != REQUEST_LEN {
        return Err(EnrollError::MalformedRequest {
            expected: REQUEST_LEN,
            found: buf.len(),
        });
    }

    let mut cur = buf;
    cur.advance(REQUEST_HEADER_LEN);
    let device_id = cur.get_u16_le();
    let operation = Operation::try_from(cur.get_u16_le())?;
    let mut secret = [0u8; SECRET_LEN];
    cur.copy_to_slice(&mut secret);

    Ok(Request {
        device_id,
        operation,
        secret,
    })
}

/// Encode a response into its deterministic little-endian layout.
///
/// The body length field always equals the actual encoded body size.
pub fn encode_response(resp: &Response) -> Bytes {
    let body_len = resp.body_len();
    let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LEN + body_len);

    buf.put_slice(&RESPONSE_MAGIC);
    buf.put_u16_le(resp.device_id);
    buf.put_u16_le(AUTHORITY_ID);
    buf.put_u16_le(body_len as u16);

    buf.put_u16_le(resp.device_id);
    buf.put_i16_le(resp.status as i16);
    if let Some(keys) = &resp.keys {
        buf.put_slice(&keys.enc_key);
        buf.put_slice(&keys.seed);
        buf.put_slice(&keys.auth_key);
    }

    buf.freeze()
}

/// Decode a complete response frame, header included.
///
/// # Errors
/// Fails on a bad magic tag, a body length field that does not match one of
/// the two body shapes, or a frame whose size disagrees with its header.
pub fn decode_response(buf: &[u8]) -> Result<Response> {
    if buf.len() < RESPONSE_HEADER_LEN {
        return Err(EnrollError::MalformedResponse(format!(
            "truncated header: {} bytes",
            buf.len()
        )));
    }

    let mut cur = buf;
    let mut magic = [0u8; 2];
    cur.copy_to_slice(&mut magic);
    if magic != RESPONSE_MAGIC {
        return Err(EnrollError::MalformedResponse(format!(
            "bad magic tag: {magic:02x?}"
        )));
    }

    let _header_device_id = cur.get_u16_le();
    let _sender_id = cur.get_u16_le();
    let body_len = cur.get_u16_le() as usize;
    if body_len != cur.remaining() {
        return Err(EnrollError::MalformedResponse(format!(
            "body length field {body_len} disagrees with {} body bytes",
            cur.remaining()
        )));
    }

    let device_id = cur.get_u16_le();
    let status = Status::try_from(cur.get_i16_le())?;
    let keys = match body_len {
        ACK_BODY_LEN => None,
        KEY_BODY_LEN => {
            let mut enc_key = [0u8; ENC_KEY_LEN];
            let mut seed = [0u8; SEED_LEN];
            let mut auth_key = [0u8; AUTH_KEY_LEN];
            cur.copy_to_slice(&mut enc_key);
            cur.copy_to_slice(&mut seed);
            cur.copy_to_slice(&mut auth_key);
            Some(KeyMaterial {
                enc_key,
                seed,
                auth_key,
            })
        }
        other => {
            return Err(EnrollError::MalformedResponse(format!(
                "unsupported body length: {other}"
            )))
        }
    };

    Ok(Response {
        device_id,
        status,
        keys,
    })
}

/// Server-side codec: frames incoming requests, encodes outgoing responses.
pub struct TransactionCodec;

impl Decoder for TransactionCodec {
    type Item = Request;
    type Error = EnrollError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>> {
        if src.len() < REQUEST_LEN {
            src.reserve(REQUEST_LEN - src.len());
            return Ok(None);
        }
        let frame = src.split_to(REQUEST_LEN);
        decode_request(&frame).map(Some)
    }
}

impl Encoder<Response> for TransactionCodec {
    type Error = EnrollError;

    fn encode(&mut self, resp: Response, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&encode_response(&resp));
        Ok(())
    }
}

/// Endpoint-side codec: encodes requests, frames incoming responses.
///
/// Used by [`crate::transport::local::connect`] and by integration tests to
/// speak the protocol from the device side.
pub struct EndpointCodec;

impl Encoder<Request> for EndpointCodec {
    type Error = EnrollError;

    fn encode(&mut self, req: Request, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(REQUEST_LEN);
        dst.put_bytes(0, REQUEST_HEADER_LEN);
        dst.put_u16_le(req.device_id);
        dst.put_u16_le(req.operation as u16);
        dst.put_slice(&req.secret);
        Ok(())
    }
}

impl Decoder for EndpointCodec {
    type Item = Response;
    type Error = EnrollError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>> {
        if src.len() < RESPONSE_HEADER_LEN {
            return Ok(None);
        }
        let body_len = u16::from_le_bytes([src[6], src[7]]) as usize;
        if body_len != ACK_BODY_LEN && body_len != KEY_BODY_LEN {
            return Err(EnrollError::MalformedResponse(format!(
                "unsupported body length: {body_len}"
            )));
        }
        let total = RESPONSE_HEADER_LEN + body_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.split_to(total);
        decode_response(&frame).map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn request_bytes(device_id: u16, op: u16, secret: &[u8; SECRET_LEN]) -> Vec<u8> {
        let mut buf = vec![0u8; REQUEST_HEADER_LEN];
        buf.extend_from_slice(&device_id.to_le_bytes());
        buf.extend_from_slice(&op.to_le_bytes());
        buf.extend_from_slice(secret);
        buf
    }

    #[test]
    fn decode_valid_register_request() {
        let secret = [0x5Au8; SECRET_LEN];
        let buf = request_bytes(7, 0, &secret);

        let req = decode_request(&buf).expect("well-formed request");
        assert_eq!(req.device_id, 7);
        assert_eq!(req.operation, Operation::Register);
        assert_eq!(req.secret, secret);
    }

    #[test]
    fn decode_request_ignores_reserved_header() {
        let secret = [0u8; SECRET_LEN];
        let mut buf = request_bytes(9, 1, &secret);
        buf[..REQUEST_HEADER_LEN].copy_from_slice(&[0xFF; REQUEST_HEADER_LEN]);

        let req = decode_request(&buf).expect("reserved bytes are opaque");
        assert_eq!(req.device_id, 9);
        assert_eq!(req.operation, Operation::Deregister);
    }

    #[test]
    fn decode_request_rejects_wrong_size() {
        let result = decode_request(&[0u8; REQUEST_LEN - 1]);
        assert!(matches!(
            result,
            Err(EnrollError::MalformedRequest { found, .. }) if found == REQUEST_LEN - 1
        ));

        let result = decode_request(&[0u8; REQUEST_LEN + 4]);
        assert!(matches!(result, Err(EnrollError::MalformedRequest { .. })));
    }

    #[test]
    fn decode_request_rejects_unknown_operation() {
        let buf = request_bytes(7, 9, &[0u8; SECRET_LEN]);
        let result = decode_request(&buf);
        assert!(matches!(result, Err(EnrollError::UnknownOperation(9))));
    }

    #[test]
    fn encode_rejection_golden_bytes() {
        let bytes = encode_response(&Response::rejection(7));
        assert_eq!(
            &bytes[..],
            &[
                0x53, 0x43, // "SC"
                0x07, 0x00, // device id
                0x01, 0x00, // sender id
                0x04, 0x00, // body length
                0x07, 0x00, // device id
                0xFF, 0xFF, // status -1
            ]
        );
    }

    #[test]
    fn encode_registration_grant_layout() {
        let keys = KeyMaterial {
            enc_key: [0x11; ENC_KEY_LEN],
            seed: [0x22; SEED_LEN],
            auth_key: [0x33; AUTH_KEY_LEN],
        };
        let bytes = encode_response(&Response::registered(7, keys));

        assert_eq!(bytes.len(), RESPONSE_HEADER_LEN + KEY_BODY_LEN);
        assert_eq!(&bytes[..2], b"SC");
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), KEY_BODY_LEN as u16);
        // body: id, status, then enc key / seed / auth key
        assert_eq!(i16::from_le_bytes([bytes[10], bytes[11]]), 0);
        assert_eq!(&bytes[12..28], &[0x11; ENC_KEY_LEN][..]);
        assert_eq!(&bytes[28..60], &[0x22; SEED_LEN][..]);
        assert_eq!(&bytes[60..124], &[0x33; AUTH_KEY_LEN][..]);
    }

    #[test]
    fn response_roundtrip_both_shapes() {
        let ack = Response::deregistered(12);
        let decoded = decode_response(&encode_response(&ack)).expect("ack decodes");
        assert_eq!(decoded.device_id, 12);
        assert_eq!(decoded.status, Status::Deregister);
        assert!(decoded.keys.is_none());

        let keys = KeyMaterial {
            enc_key: [1; ENC_KEY_LEN],
            seed: [2; SEED_LEN],
            auth_key: [3; AUTH_KEY_LEN],
        };
        let grant = Response::registered(12, keys.clone());
        let decoded = decode_response(&encode_response(&grant)).expect("grant decodes");
        assert_eq!(decoded.status, Status::Register);
        assert_eq!(decoded.keys, Some(keys));
    }

    #[test]
    fn decode_response_rejects_bad_magic() {
        let mut bytes = encode_response(&Response::rejection(7)).to_vec();
        bytes[0] = 0x58;
        assert!(matches!(
            decode_response(&bytes),
            Err(EnrollError::MalformedResponse(_))
        ));
    }

    #[test]
    fn decode_response_rejects_length_disagreement() {
        let mut bytes = encode_response(&Response::rejection(7)).to_vec();
        bytes[6] = 0x06; // claim 6 body bytes while 4 follow
        assert!(matches!(
            decode_response(&bytes),
            Err(EnrollError::MalformedResponse(_))
        ));
    }

    #[test]
    fn transaction_codec_accumulates_partial_frames() {
        let secret = [0x77u8; SECRET_LEN];
        let wire = request_bytes(3, 0, &secret);
        let mut codec = TransactionCodec;
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&wire[..40]);
        assert!(codec.decode(&mut buf).expect("partial is not an error").is_none());

        buf.extend_from_slice(&wire[40..]);
        let req = codec
            .decode(&mut buf)
            .expect("complete frame decodes")
            .expect("frame present");
        assert_eq!(req.device_id, 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn transaction_codec_decodes_back_to_back_frames() {
        let wire = request_bytes(3, 0, &[0u8; SECRET_LEN]);
        let mut codec = TransactionCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire);
        buf.extend_from_slice(&wire);

        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn endpoint_codec_roundtrips_a_request() {
        let req = Request {
            device_id: 21,
            operation: Operation::Deregister,
            secret: [0xAB; SECRET_LEN],
        };
        let mut buf = BytesMut::new();
        EndpointCodec.encode(req, &mut buf).expect("encode");
        assert_eq!(buf.len(), REQUEST_LEN);

        let decoded = decode_request(&buf).expect("server side decodes it");
        assert_eq!(decoded.device_id, 21);
        assert_eq!(decoded.operation, Operation::Deregister);
        assert_eq!(decoded.secret, [0xAB; SECRET_LEN]);
    }

    #[test]
    fn endpoint_codec_waits_for_full_body() {
        let keys = KeyMaterial {
            enc_key: [1; ENC_KEY_LEN],
            seed: [2; SEED_LEN],
            auth_key: [3; AUTH_KEY_LEN],
        };
        let wire = encode_response(&Response::registered(5, keys));
        let mut codec = EndpointCodec;
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&wire[..20]);
        assert!(codec.decode(&mut buf).expect("waiting").is_none());

        buf.extend_from_slice(&wire[20..]);
        let resp = codec.decode(&mut buf).expect("decodes").expect("present");
        assert_eq!(resp.device_id, 5);
        assert!(resp.keys.is_some());
    }
}
