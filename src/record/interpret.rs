//! Two-pass interpretation of a decoded IK4 payload: pass 1 gathers context
//! (identity, time, area name, manufacturer, priority, transport service,
//! telegram counter) and binds the connection's identity; pass 2 walks the
//! same records again and emits action events (message/status/error/test/
//! features), attaching the context gathered in pass 1. A single IK4 frame
//! can carry an identity record before the message record it identifies,
//! so the message event must already know the identity — hence two passes.

use std::collections::HashMap;

use crate::config::DeviceConfig;
use crate::event::{MessageKind, MonitoringKind, Quelle, RecordContext, VdsEvent, Zustand};

use super::{decode_identity, decode_records, format_time_context, tables, time_record_now, types};

#[derive(Debug, Default)]
pub struct InterpretOutcome {
    pub events: Vec<VdsEvent>,
    /// Raw TLV bytes to enqueue for transmission in a subsequent IK4.
    pub acks: Vec<Vec<u8>>,
    /// Set when an identity record named a device not present in the
    /// configuration table; the caller must disconnect.
    pub unknown_identity: Option<String>,
    /// Set when an identity record matched a configured device, so the
    /// caller can update its own bound `device_config`/`identity` fields.
    pub bound_device: Option<(String, u16)>,
    /// Set when a type-0x40 test record was seen, so the caller can notify
    /// the liveness monitor that this identity reported in.
    pub test_message_received: bool,
}

/// Interprets one IK4 payload. `identity` is the connection's
/// currently-bound identity (if any), read to attach to events whose
/// record type doesn't itself carry one; `key_id_rec` is the key_id last
/// seen on the outer frame header, used only to detect and log a mismatch
/// against the matched device's configured key_id.
pub fn interpret_payload(
    data: &[u8],
    devices: &[DeviceConfig],
    identity: Option<&str>,
    key_id_rec: u16,
) -> InterpretOutcome {
    let records = decode_records(data);
    let mut outcome = InterpretOutcome::default();
    let mut context = RecordContext::default();
    let mut bound_identity = identity.map(|s| s.to_string());

    for record in &records {
        match record.typ {
            types::IDENTITY => {
                let decoded = decode_identity(&record.body);
                tracing::info!(identity = %decoded, "identity record received");

                match devices.iter().find(|d| d.identity == decoded) {
                    Some(dev) => {
                        if dev.key_id != key_id_rec {
                            tracing::warn!(
                                identity = %decoded,
                                received = key_id_rec,
                                expected = dev.key_id,
                                "key_id mismatch"
                            );
                        }
                        outcome.bound_device = Some((decoded.clone(), dev.key_id));
                        bound_identity = Some(decoded.clone());
                        outcome.events.push(VdsEvent::Connected {
                            identity: decoded,
                            key_id: key_id_rec,
                        });
                    }
                    None => {
                        tracing::warn!(identity = %decoded, "unknown identity");
                        outcome.unknown_identity = Some(decoded);
                        return outcome;
                    }
                }
            }
            types::MANUFACTURER => {
                context.manufacturer = iso8859_1_nul_trimmed(&record.body);
            }
            types::AREA_NAME => {
                context.area_name = iso8859_1_nul_trimmed(&record.body)
                    .map(|s| s.replace('\r', " ").trim().to_string());
            }
            types::TIME => {
                context.entstehungszeit = format_time_context(&record.body);
            }
            types::PRIORITY => {
                context.priority = record.body.first().copied();
            }
            types::TRANSPORT_SERVICE => {
                if let Some(&id) = record.body.first() {
                    context.transport_service = Some(tables::transport_service_name(id));
                }
            }
            types::TELEGRAM_COUNTER => {
                if record.body.len() >= 5 {
                    let counter = u32::from_be_bytes([
                        record.body[1],
                        record.body[2],
                        record.body[3],
                        record.body[4],
                    ]);
                    context.telegram_counter = Some(counter);
                }
            }
            _ => {}
        }
    }

    for record in &records {
        match record.typ {
            t if types::is_message_like(t) => {
                interpret_message(record, t, bound_identity.as_deref(), key_id_rec, &context, &mut outcome);
            }
            types::ERROR => {
                if record.body.len() >= 2 {
                    let code = record.body[1];
                    let text = tables::error_text(code);
                    tracing::warn!(identity = ?bound_identity, code, %text, "VdS error record");
                    outcome.events.push(VdsEvent::Error {
                        identity: bound_identity.clone(),
                        code,
                        text,
                    });
                }
            }
            types::TEST => {
                outcome.test_message_received = true;
                outcome.events.push(VdsEvent::Status {
                    identity: bound_identity.clone(),
                    key_id: key_id_rec,
                    msg: "Testmeldung".to_string(),
                    context: context.clone(),
                });
                let mut ack = vec![0u8, types::TEST_ACK];
                ack.extend_from_slice(&time_record_now());
                outcome.acks.push(ack);
            }
            types::MANUFACTURER => {
                outcome.events.push(VdsEvent::ManufacturerUpdate {
                    identity: bound_identity.clone(),
                    manufacturer: context.manufacturer.clone(),
                });
            }
            types::AREA_NAME => {
                outcome.events.push(VdsEvent::AreaUpdate {
                    identity: bound_identity.clone(),
                    area_name: context.area_name.clone(),
                });
            }
            types::FEATURES => {
                if let Some(features) = decode_features(&record.body) {
                    if !features.is_empty() {
                        outcome.events.push(VdsEvent::FeaturesUpdate {
                            identity: bound_identity.clone(),
                            features,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    outcome
}

fn interpret_message(
    record: &super::Record,
    typ: u8,
    identity: Option<&str>,
    key_id_rec: u16,
    context: &RecordContext,
    outcome: &mut InterpretOutcome,
) {
    if record.body.len() < 5 {
        return;
    }
    let body = &record.body;
    let device = (body[0] >> 4) & 0x0F;
    let area = body[0] & 0x0F;
    let address = body[1];
    let addr_ext = body[3];
    let code = body[4];

    let kind = if typ == types::STATUS_STATUS {
        MessageKind::Status
    } else {
        MessageKind::Meldung
    };

    let msg_text = if body.len() > 10 {
        iso8859_1_nul_trimmed(&body[5..])
            .filter(|s| s.chars().count() > 2 && s.chars().any(|c| c.is_alphanumeric()))
    } else {
        None
    };

    let (quelle, zustand) = match addr_ext {
        1 => (
            Some(Quelle::Eingang),
            Some(if code < 128 { Zustand::Ein } else { Zustand::Aus }),
        ),
        2 => (
            Some(Quelle::Ausgang),
            Some(if code < 128 { Zustand::Ein } else { Zustand::Aus }),
        ),
        _ => (None, None),
    };

    outcome.events.push(VdsEvent::Alarm {
        identity: identity.map(|s| s.to_string()),
        key_id: key_id_rec,
        device,
        area,
        address,
        code,
        text: tables::message_text(code),
        kind,
        quelle,
        zustand,
        msg_text,
        context: context.clone(),
    });

    if typ == types::MESSAGE {
        let mut ack_body = vec![record.body.len() as u8, types::MESSAGE_ACK];
        ack_body.extend_from_slice(&record.body);
        outcome.acks.push(ack_body);
    }
}

/// ISO-8859-1 decode with leading/trailing NUL bytes stripped (mirrors
/// Python's `bytes.strip(b'\x00')`; embedded NULs are preserved).
fn iso8859_1_nul_trimmed(bytes: &[u8]) -> Option<String> {
    let trimmed = match bytes.iter().position(|&b| b != 0) {
        Some(start) => {
            let end = bytes.iter().rposition(|&b| b != 0).unwrap() + 1;
            &bytes[start..end]
        }
        None => return None,
    };
    Some(trimmed.iter().map(|&b| b as char).collect())
}

/// Decodes a `0x59` device-features record: a leading byte then an inner
/// TLV list `[l, t, i, ...]` of mac/imei/sim/rufnummer per path (1=Erstweg,
/// 2=Zweitweg).
fn decode_features(body: &[u8]) -> Option<HashMap<String, String>> {
    let mut features = HashMap::new();
    let mut offset = 1usize;

    while offset + 3 <= body.len() {
        let l_sub = body[offset] as usize;
        let t_sub = body[offset + 1];
        let i_sub = body[offset + 2];

        if l_sub < 3 || offset + l_sub > body.len() {
            break;
        }
        let val_bytes = &body[offset + 3..offset + l_sub];
        if let Some(val) = iso8859_1_nul_trimmed(val_bytes) {
            let label = match t_sub {
                0 => "MAC",
                1 => "IMEI",
                2 => "SIM-Kartennummer",
                3 => "Rufnummer",
                0xFF => "herstellerspezifisch",
                _ => "Unknown",
            };
            let path = if i_sub == 1 { "Erstweg" } else { "Zweitweg" };
            features.insert(format!("{label}-{path}"), val);
        }
        offset += l_sub;
    }

    Some(features)
}

/// Builds the two liveness-synthesised events for an overdue device.
pub fn overdue_events(
    identity: &str,
    last_contact: String,
    interval_minutes: u32,
    minutes_overdue: u32,
) -> [VdsEvent; 2] {
    [
        VdsEvent::Monitoring {
            identity: identity.to_string(),
            kind: MonitoringKind::Overdue {
                last_contact,
                interval_minutes,
                minutes_overdue,
            },
        },
        VdsEvent::Alarm {
            identity: Some(identity.to_string()),
            key_id: 0,
            device: 0,
            area: 0,
            address: 0,
            code: 54,
            text: tables::message_text(54),
            kind: MessageKind::Meldung,
            quelle: Some(Quelle::Eingang),
            zustand: Some(Zustand::Ein),
            msg_text: None,
            context: RecordContext::default(),
        },
    ]
}

/// Builds the two liveness-synthesised events for a recovered device.
pub fn recovered_events(identity: &str, last_contact: String) -> [VdsEvent; 2] {
    [
        VdsEvent::Monitoring {
            identity: identity.to_string(),
            kind: MonitoringKind::Recovered { last_contact },
        },
        VdsEvent::Alarm {
            identity: Some(identity.to_string()),
            key_id: 0,
            device: 0,
            area: 0,
            address: 0,
            code: 182,
            text: tables::message_text(182),
            kind: MessageKind::Meldung,
            quelle: Some(Quelle::Eingang),
            zustand: Some(Zustand::Aus),
            msg_text: None,
            context: RecordContext::default(),
        },
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    fn device(identity: &str, key_id: u16) -> DeviceConfig {
        DeviceConfig {
            identity: identity.to_string(),
            encrypted: key_id != 0,
            key_id,
            key_hex: Some("00112233445566778899aabbccddeeff".chars().take(32).collect()),
            test_interval_minutes: 0,
            vds_device: 1,
            vds_area: 1,
        }
    }

    #[test]
    fn identity_then_test_message_emits_connected_then_status() {
        let devices = vec![device("123456789", 0)];
        let mut data = vec![];
        // packed-decimal "123456789": low nibble then high nibble per byte,
        // 0xF9 terminates the trailing odd digit's high nibble.
        data.extend_from_slice(&super::super::Record::new(
            types::IDENTITY,
            vec![0x21, 0x43, 0x65, 0x87, 0xF9],
        ).encode());
        data.extend_from_slice(&super::super::Record::new(types::TEST, vec![]).encode());

        let outcome = interpret_payload(&data, &devices, None, 0);
        assert_eq!(outcome.events.len(), 2);
        assert!(matches!(outcome.events[0], VdsEvent::Connected { .. }));
        match &outcome.events[1] {
            VdsEvent::Status { msg, .. } => assert_eq!(msg, "Testmeldung"),
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(outcome.acks.len(), 1);
        assert_eq!(outcome.acks[0][0], 0);
        assert_eq!(outcome.acks[0][1], types::TEST_ACK);
    }

    #[test]
    fn unknown_identity_stops_at_identity_record() {
        let devices = vec![device("000000000", 0)];
        let mut data = vec![];
        data.extend_from_slice(&super::super::Record::new(
            types::IDENTITY,
            vec![0x21, 0x43, 0x65, 0x87, 0xF9],
        ).encode());
        data.extend_from_slice(&super::super::Record::new(types::TEST, vec![]).encode());

        let outcome = interpret_payload(&data, &devices, None, 0);
        assert_eq!(outcome.unknown_identity.as_deref(), Some("123456789".to_string()).as_deref());
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn alarm_round_trip_matches_scenario() {
        let record = super::super::Record::new(types::MESSAGE, vec![0x11, 0x05, 0x00, 0x01, 0x22]);
        let data = record.encode();
        let outcome = interpret_payload(&data, &[], Some("123456789"), 0);
        assert_eq!(outcome.events.len(), 1);
        match &outcome.events[0] {
            VdsEvent::Alarm {
                code,
                text,
                quelle,
                zustand,
                address,
                device,
                area,
                ..
            } => {
                assert_eq!(*code, 0x22);
                assert_eq!(text, "Einbruch - Ausgeloest");
                assert_eq!(*quelle, Some(Quelle::Eingang));
                assert_eq!(*zustand, Some(Zustand::Ein));
                assert_eq!(*address, 5);
                assert_eq!(*device, 1);
                assert_eq!(*area, 1);
            }
            other => panic!("expected Alarm, got {other:?}"),
        }
        assert_eq!(outcome.acks.len(), 1);
        assert_eq!(outcome.acks[0], vec![5, types::MESSAGE_ACK, 0x11, 0x05, 0x00, 0x01, 0x22]);
    }

    #[test]
    fn status_variant_sets_status_kind_and_no_ack() {
        let record = super::super::Record::new(types::STATUS_STATUS, vec![0x11, 0x05, 0x00, 0x01, 0x22]);
        let data = record.encode();
        let outcome = interpret_payload(&data, &[], Some("1"), 0);
        match &outcome.events[0] {
            VdsEvent::Alarm { kind, .. } => assert_eq!(*kind, MessageKind::Status),
            other => panic!("expected Alarm, got {other:?}"),
        }
        assert!(outcome.acks.is_empty());
    }

    #[test]
    fn error_record_emits_error_event_without_disconnect() {
        let record = super::super::Record::new(types::ERROR, vec![0x10, 0x80]);
        let data = record.encode();
        let outcome = interpret_payload(&data, &[], Some("1"), 0);
        match &outcome.events[0] {
            VdsEvent::Error { code, text, .. } => {
                assert_eq!(*code, 0x80);
                assert_eq!(text, "Pruefsumme fehlerhaft");
            }
            other => panic!("expected Error, got {other:?}"),
        }
        assert!(outcome.unknown_identity.is_none());
    }

    #[test]
    fn features_record_builds_keyed_map() {
        let mut body = vec![0u8]; // leading byte
        // IMEI, Erstweg, value "12345"
        let val = b"12345";
        body.push((3 + val.len()) as u8);
        body.push(1); // t = IMEI
        body.push(1); // i = Erstweg
        body.extend_from_slice(val);

        let record = super::super::Record::new(types::FEATURES, body);
        let data = record.encode();
        let outcome = interpret_payload(&data, &[], Some("1"), 0);
        match &outcome.events[0] {
            VdsEvent::FeaturesUpdate { features, .. } => {
                assert_eq!(features.get("IMEI-Erstweg").map(String::as_str), Some("12345"));
            }
            other => panic!("expected FeaturesUpdate, got {other:?}"),
        }
    }
}
