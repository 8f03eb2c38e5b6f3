//! The VdS 2465 CRC-16 variant: a 16-bit end-around-carry sum of big-endian
//! word pairs, one's complemented, with the 2-byte CRC field at offset 4
//! excluded from the sum during both computation and verification.

/// Minimum length of a buffer that can carry a CRC field.
const CRC_FIELD_OFFSET: usize = 4;

/// Sums `data` as big-endian 16-bit words, skipping the word at
/// [`CRC_FIELD_OFFSET`] (the CRC field itself), and returns
/// `(one's-complement accumulator, word found at the CRC field offset)`.
fn accumulate(data: &[u8]) -> (u16, u16) {
    let mut crc: u32 = 0;
    let mut field = 0u16;
    let len = data.len();

    let mut pos = 0;
    while pos < len {
        let hi = data[pos];
        let lo = if pos + 1 == len { 0 } else { data[pos + 1] };
        let word = u16::from_be_bytes([hi, lo]);

        if pos == CRC_FIELD_OFFSET {
            field = word;
        } else {
            crc += word as u32;
            if crc > 0xffff {
                crc &= 0xffff;
                crc += 1;
            }
        }

        pos += 2;
    }

    (!(crc as u16), field)
}

/// Computes the CRC-16 of `data` and writes it into the 2-byte field at
/// offset 4, big-endian.
pub fn set_crc16(data: &mut [u8]) {
    let (crc, _) = accumulate(data);
    data[CRC_FIELD_OFFSET..CRC_FIELD_OFFSET + 2].copy_from_slice(&crc.to_be_bytes());
}

/// Verifies the CRC-16 field at offset 4 against the rest of `data`.
/// Buffers shorter than 6 bytes (no room for a CRC field) never verify.
pub fn check_crc16(data: &[u8]) -> bool {
    if data.len() < 6 {
        return false;
    }
    let (calculated, received) = accumulate(data);
    if calculated != received {
        tracing::debug!(
            calculated = format!("{calculated:04X}"),
            received = format!("{received:04X}"),
            "CRC mismatch"
        );
    }
    calculated == received
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_then_check_round_trips() {
        let mut buf = vec![0u8; 48];
        buf[0..4].copy_from_slice(&0x11223344u32.to_be_bytes());
        buf[10] = 1;
        buf[11] = 1;
        set_crc16(&mut buf);
        assert!(check_crc16(&buf));
    }

    #[test]
    fn crc_depends_only_on_bytes_outside_crc_field() {
        let mut buf = vec![0u8; 48];
        buf[0..4].copy_from_slice(&0xdeadbeefu32.to_be_bytes());
        set_crc16(&mut buf);
        let original_crc = u16::from_be_bytes([buf[4], buf[5]]);

        // scribbling over the CRC field and recomputing should reproduce
        // the same value, since the field itself is excluded from the sum.
        buf[4] = 0xAA;
        buf[5] = 0xBB;
        let (recomputed, _) = accumulate(&buf);
        assert_eq!(recomputed, original_crc);
    }

    #[test]
    fn altered_crc_field_fails_verification() {
        let mut buf = vec![0u8; 48];
        buf[10] = 3;
        set_crc16(&mut buf);
        let mut corrupted = buf.clone();
        let word = u16::from_be_bytes([corrupted[4], corrupted[5]]);
        let bumped = word.wrapping_add(1);
        corrupted[4..6].copy_from_slice(&bumped.to_be_bytes());
        assert!(!check_crc16(&corrupted));
    }

    #[test]
    fn odd_length_buffer_zero_pads_final_byte() {
        let mut buf = vec![1u8, 2, 3, 4, 0, 0, 7];
        set_crc16(&mut buf);
        assert!(check_crc16(&buf));
    }

    #[test]
    fn too_short_buffer_never_verifies() {
        assert!(!check_crc16(&[0u8; 5]));
    }
}
