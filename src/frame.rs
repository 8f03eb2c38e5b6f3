//! Outer frame codec: the 4-byte `(key_id, payload_len)` header, block
//! padding, CRC-16 placement, and the AES-CBC encrypt/decrypt boundary.
//! Fragmented/coalesced TCP reads are handled by [`FrameDecoder`], which
//! drains as many complete frames as its buffer holds and leaves any
//! partial tail for the next read.

use crate::crc;
use crate::crypto::{self, KEY_LEN};
use crate::result::{VdsError, VdsResult};

const HEADER_LEN: usize = 4;
const MIN_PAYLOAD_LEN: usize = 48;

/// A frame drained off the wire: the `key_id` from its header and its
/// payload, still ciphertext if `key_id != 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub key_id: u16,
    pub payload: Vec<u8>,
}

/// Accumulates bytes read from a socket and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pops the next complete frame out of the buffer, if one is fully
    /// present. Leaves the buffer untouched (waiting for more data) when
    /// the header or its declared payload is incomplete.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let key_id = u16::from_be_bytes([self.buf[0], self.buf[1]]);
        let payload_len = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
        let total_len = HEADER_LEN + payload_len;
        if self.buf.len() < total_len {
            return None;
        }

        let frame_bytes: Vec<u8> = self.buf.drain(0..total_len).collect();
        Some(RawFrame {
            key_id,
            payload: frame_bytes[HEADER_LEN..].to_vec(),
        })
    }
}

/// Zero-pads `data` so its length is a multiple of 16 bytes and at least
/// [`MIN_PAYLOAD_LEN`]. Minimum takes precedence over the rounding-up step.
fn pad(data: &mut Vec<u8>) {
    let len = data.len();
    let rem = len % 16;
    let mut diff = if rem == 0 { 0 } else { 16 - rem };
    if len + diff < MIN_PAYLOAD_LEN {
        diff = MIN_PAYLOAD_LEN - len;
    }
    data.extend(std::iter::repeat(0u8).take(diff));
}

/// Pads, CRCs and (if `key` is given and `key_id != 0`) encrypts
/// `plaintext`, then prepends the outer header. `plaintext` is the
/// complete IK frame body (`tc|crc|rc|ik|pk|l|records`).
pub fn encode_frame(key_id: u16, key: Option<&[u8; KEY_LEN]>, mut plaintext: Vec<u8>) -> VdsResult<Vec<u8>> {
    pad(&mut plaintext);
    crc::set_crc16(&mut plaintext);

    let payload = match key {
        Some(k) if key_id != 0 => crypto::encrypt(k, &plaintext)?,
        _ => plaintext,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&key_id.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decrypts (if applicable) and CRC-verifies a [`RawFrame`]'s payload,
/// returning the plaintext IK frame body. Returns [`VdsError::Crc`] on a
/// verification failure — the caller drops the single frame without
/// tearing down the connection.
pub fn decode_payload(raw: &RawFrame, key: Option<&[u8; KEY_LEN]>) -> VdsResult<Vec<u8>> {
    let plaintext = match key {
        Some(k) if raw.key_id != 0 => crypto::decrypt(k, &raw.payload)?,
        _ => raw.payload.clone(),
    };
    if !crc::check_crc16(&plaintext) {
        return Err(VdsError::Crc);
    }
    Ok(plaintext)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pads_to_minimum_forty_eight() {
        let mut data = vec![0u8; 14];
        pad(&mut data);
        assert_eq!(data.len(), 48);
    }

    #[test]
    fn pads_up_to_next_multiple_of_sixteen_above_minimum() {
        let mut data = vec![0u8; 53];
        pad(&mut data);
        assert_eq!(data.len(), 64);
    }

    #[test]
    fn already_aligned_and_above_minimum_is_untouched() {
        let mut data = vec![0u8; 64];
        pad(&mut data);
        assert_eq!(data.len(), 64);
    }

    #[test]
    fn unencrypted_round_trip() {
        let plaintext = vec![0xABu8; 14];
        let wire = encode_frame(0, None, plaintext).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);
        let raw = decoder.next_frame().unwrap();
        assert_eq!(raw.key_id, 0);
        let decoded = decode_payload(&raw, None).unwrap();
        assert!(crc::check_crc16(&decoded));
    }

    #[test]
    fn encrypted_round_trip() {
        let key = [0x5Au8; KEY_LEN];
        let plaintext = vec![0x11u8; 20];
        let wire = encode_frame(7, Some(&key), plaintext).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);
        let raw = decoder.next_frame().unwrap();
        assert_eq!(raw.key_id, 7);
        let decoded = decode_payload(&raw, Some(&key)).unwrap();
        assert!(crc::check_crc16(&decoded));
    }

    #[test]
    fn decoder_waits_on_partial_header() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 0x01]);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn decoder_waits_on_partial_payload() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 0x00, 0x00, 0x30]); // declares 48 bytes, none follow
        decoder.feed(&[0u8; 20]);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn decoder_drains_coalesced_frames_and_keeps_partial_tail() {
        let wire_a = encode_frame(0, None, vec![1u8; 14]).unwrap();
        let wire_b = encode_frame(0, None, vec![2u8; 14]).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire_a);
        decoder.feed(&wire_b);
        decoder.feed(&[0x00, 0x00]); // partial tail of a third header

        let first = decoder.next_frame().unwrap();
        let second = decoder.next_frame().unwrap();
        assert_ne!(first.payload, second.payload);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn crc_mismatch_is_reported_without_panicking() {
        let mut wire = encode_frame(0, None, vec![0u8; 14]).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);
        let raw = decoder.next_frame().unwrap();
        assert!(matches!(decode_payload(&raw, None), Err(VdsError::Crc)));
    }
}
