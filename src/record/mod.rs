//! The record ("Satz") layer: the TLV records carried inside an IK4
//! payload, and their interpretation into domain events / acknowledgements.

pub mod interpret;
pub mod tables;
pub mod types;

use chrono::{Datelike, Local, Timelike};

/// A single decoded TLV record: `[sl][type][...sl body bytes...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub typ: u8,
    pub body: Vec<u8>,
}

impl Record {
    pub fn new(typ: u8, body: impl Into<Vec<u8>>) -> Self {
        Self {
            typ,
            body: body.into(),
        }
    }

    /// Encodes this record on the wire: `[sl][type][body]`, where `sl` is
    /// the body length. Bodies longer than 255 bytes cannot be represented
    /// and are truncated defensively — the protocol has no record that
    /// large.
    pub fn encode(&self) -> Vec<u8> {
        let sl = self.body.len().min(u8::MAX as usize) as u8;
        let mut out = Vec::with_capacity(2 + sl as usize);
        out.push(sl);
        out.push(self.typ);
        out.extend_from_slice(&self.body[..sl as usize]);
        out
    }
}

/// Decodes a sequence of records out of an IK4 payload: at offset 0
/// `sl = byte[0]`, `type = byte[1]`, body is the next `sl` bytes, and the
/// cursor advances by `2 + sl`. A truncated header or body stops parsing
/// at the anomaly point; already-parsed records are kept.
pub fn decode_records(data: &[u8]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + 2 <= data.len() {
        let sl = data[offset] as usize;
        let typ = data[offset + 1];
        let body_start = offset + 2;
        let body_end = body_start + sl;

        if body_end > data.len() {
            break;
        }

        records.push(Record::new(typ, data[body_start..body_end].to_vec()));
        offset = body_end;
    }

    records
}

/// Decodes a packed-decimal identity number: for each byte, low nibble then
/// high nibble; a nibble equal to `0xF` terminates that half without
/// producing a digit.
pub fn decode_identity(body: &[u8]) -> String {
    let mut out = String::new();
    for &b in body {
        let low = b & 0x0F;
        let high = (b >> 4) & 0x0F;
        if low != 0xF {
            out.push_str(&low.to_string());
        }
        if high != 0xF {
            out.push_str(&high.to_string());
        }
    }
    out
}

/// Encodes a decimal identity string into the packed-decimal form
/// [`decode_identity`] inverts. Digits are packed two per byte, low nibble
/// first; an odd trailing digit's high nibble is terminated with `0xF`.
pub fn encode_identity(identity: &str) -> Vec<u8> {
    let digits: Vec<u8> = identity
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();

    digits
        .chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0xF);
            low | (high << 4)
        })
        .collect()
}

/// Builds the 9-byte wire encoding of a type-`0x50` time record
/// (`[sl=7][0x50][yy_lo][yy_hi][mm][dd][HH][MM][SS]`) for the current local
/// time, used as the body of test-message acknowledgements.
pub fn time_record_now() -> Vec<u8> {
    let now = Local::now();
    time_record_at(
        now.year(),
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
}

fn time_record_at(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Vec<u8> {
    let yy_lo = (year % 100) as u8;
    let yy_hi = (year / 100) as u8;
    Record::new(
        types::TIME,
        vec![yy_lo, yy_hi, month, day, hour, minute, second],
    )
    .encode()
}

/// Formats a decoded `0x50` time record body as `dd.mm.yyyy, HH:MM:SS`, the
/// same presentation the original's `parse_vds_payload` produces for
/// `entstehungszeit`.
pub fn format_time_context(body: &[u8]) -> Option<String> {
    if body.len() < 7 {
        return None;
    }
    let year = body[0] as i32 + body[1] as i32 * 100;
    let (month, day, hour, minute, second) = (body[2], body[3], body[4], body[5], body[6]);
    chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
        .map(|dt| dt.format("%d.%m.%Y, %H:%M:%S").to_string())
}

/// Encodes a server→panel output-control command: type `0x02` with
/// `addr_ext`-style semantics baked in.
pub fn encode_output_command(device: u8, area: u8, address: u8, state_on: bool) -> Vec<u8> {
    let geraet_bereich = ((device << 4) & 0xF0) | (area & 0x0F);
    Record::new(
        types::MESSAGE,
        vec![
            geraet_bereich,
            address,
            0x00,
            0x02,
            if state_on { 0x00 } else { 0x80 },
        ],
    )
    .encode()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_decode_skips_terminator_nibble() {
        // 0x12 -> low=2,high=1 ; 0x34 -> low=4,high=3 ; 0x5F -> low=0xF terminates, high=5
        let body = [0x12, 0x34, 0x5F];
        assert_eq!(decode_identity(&body), "21435".to_string());
    }

    #[test]
    fn identity_decode_of_empty_input_is_empty() {
        assert_eq!(decode_identity(&[]), "");
    }

    #[test]
    fn identity_round_trips_through_encode() {
        let identity = "123456789";
        let encoded = encode_identity(identity);
        assert_eq!(decode_identity(&encoded), identity);
    }

    #[test]
    fn identity_decode_never_emits_out_of_range_digits() {
        // every nibble 0x0..=0xF is exercised; 0xA..=0xE must never surface
        // as digits (the source treats them as "can't happen" but the
        // decoder must not panic or emit garbage for them either).
        for b in 0u8..=0xFF {
            let s = decode_identity(&[b]);
            assert!(s.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn decode_records_reads_length_prefixed_tlv() {
        let data = [0x08, 0x56, 0x12, 0x34, 0x56, 0x78, 0x90, 0xFF, 0xFF, 0xFF, 0x00, 0x40];
        let records = decode_records(&data);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].typ, 0x56);
        assert_eq!(records[0].body.len(), 8);
        assert_eq!(records[1].typ, 0x40);
        assert_eq!(records[1].body.len(), 0);
    }

    #[test]
    fn decode_records_stops_at_truncated_body() {
        let data = [0x05, 0x02, 0x01, 0x02]; // claims sl=5 but only 2 bytes follow
        let records = decode_records(&data);
        assert!(records.is_empty());
    }

    #[test]
    fn decode_records_keeps_already_parsed_records_on_anomaly() {
        let mut data = vec![0x00, 0x40]; // sl=0, well-formed
        data.extend_from_slice(&[0x05, 0x02, 0x01]); // truncated second record
        let records = decode_records(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].typ, 0x40);
    }

    #[test]
    fn encode_decode_record_round_trips() {
        let record = Record::new(0x02, vec![0x11, 0x05, 0x00, 0x01, 0x22]);
        let encoded = record.encode();
        let decoded = decode_records(&encoded);
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn time_record_uses_seven_byte_sl() {
        let buf = time_record_now();
        assert_eq!(buf[0], 7);
        assert_eq!(buf[1], types::TIME);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn time_context_formats_as_expected() {
        let body = [25, 0, 12, 31, 23, 59, 58]; // 2025-12-31 23:59:58
        let formatted = format_time_context(&body).unwrap();
        assert_eq!(formatted, "31.12.2025, 23:59:58");
    }

    #[test]
    fn output_command_encodes_device_area_address_state() {
        let ack = encode_output_command(1, 1, 5, true);
        // sl=5, type=0x02, body=[0x11, 0x05, 0x00, 0x02, 0x00]
        assert_eq!(ack, vec![5, 0x02, 0x11, 0x05, 0x00, 0x02, 0x00]);
        let off = encode_output_command(1, 1, 5, false);
        assert_eq!(off.last(), Some(&0x80));
    }
}
