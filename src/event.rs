//! The event sink surface: a bounded capability the connection task invokes
//! instead of a stringly-typed `(event_type, data)` pair.

use std::collections::HashMap;

/// One variant per domain event kind a connection can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum VdsEvent {
    Connected {
        identity: String,
        key_id: u16,
    },
    Disconnected {
        identity: Option<String>,
        key_id: u16,
    },
    Alarm {
        identity: Option<String>,
        key_id: u16,
        device: u8,
        area: u8,
        address: u8,
        code: u8,
        text: String,
        kind: MessageKind,
        quelle: Option<Quelle>,
        zustand: Option<Zustand>,
        msg_text: Option<String>,
        context: RecordContext,
    },
    Status {
        identity: Option<String>,
        key_id: u16,
        msg: String,
        context: RecordContext,
    },
    Error {
        identity: Option<String>,
        code: u8,
        text: String,
    },
    AreaUpdate {
        identity: Option<String>,
        area_name: Option<String>,
    },
    ManufacturerUpdate {
        identity: Option<String>,
        manufacturer: Option<String>,
    },
    FeaturesUpdate {
        identity: Option<String>,
        features: HashMap<String, String>,
    },
    Monitoring {
        identity: String,
        kind: MonitoringKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Meldung,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quelle {
    Eingang,
    Ausgang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustand {
    Ein,
    Aus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitoringKind {
    Overdue {
        last_contact: String,
        interval_minutes: u32,
        minutes_overdue: u32,
    },
    Recovered {
        last_contact: String,
    },
}

/// Context records (identity/time/area/manufacturer/priority/transport
/// service/telegram counter) collected during pass 1 of a single IK4
/// payload's parse, attached to the action events emitted during pass 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordContext {
    pub entstehungszeit: Option<String>,
    pub priority: Option<u8>,
    pub transport_service: Option<String>,
    pub telegram_counter: Option<u32>,
    pub manufacturer: Option<String>,
    pub area_name: Option<String>,
}

/// A capability for receiving normalized domain events. The host wires this
/// to its own entity registry / event bus.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: VdsEvent);
}

impl<F> EventSink for F
where
    F: Fn(VdsEvent) + Send + Sync,
{
    fn emit(&self, event: VdsEvent) {
        self(event)
    }
}
