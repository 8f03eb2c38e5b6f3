//! Liveness monitoring: tracks, per identity with a nonzero
//! `test_interval_minutes`, the time since its last type-0x40 test record
//! and synthesises overdue/recovered events. State is
//! mutated from exactly one place — this task — which receives test-record
//! notifications over a channel rather than being touched directly by
//! connection tasks, so the "last seen" map never races.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::DeviceConfig;
use crate::event::EventSink;
use crate::record::interpret::{overdue_events, recovered_events};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Sent by a connection task whenever it decodes a type-0x40 test record.
#[derive(Debug)]
pub enum LivenessMsg {
    TestReceived { identity: String },
}

struct DeviceLiveness {
    interval: Duration,
    interval_minutes: u32,
    last_seen: Instant,
    last_contact: String,
    overdue: bool,
}

fn format_now() -> String {
    Local::now().format("%d.%m.%Y, %H:%M:%S").to_string()
}

pub struct LivenessMonitor {
    sink: Arc<dyn EventSink>,
    state: HashMap<String, DeviceLiveness>,
    rx: mpsc::Receiver<LivenessMsg>,
}

impl LivenessMonitor {
    /// Builds a monitor seeded with every device carrying a nonzero
    /// `test_interval_minutes`, and the sender connection tasks use to
    /// report test records. The "last seen" clock for each device starts
    /// at construction time, not at its first-ever test message.
    pub fn new(devices: &[DeviceConfig], sink: Arc<dyn EventSink>) -> (Self, mpsc::Sender<LivenessMsg>) {
        let (tx, rx) = mpsc::channel(64);
        let now = Instant::now();
        let last_contact = format_now();
        let state = devices
            .iter()
            .filter(|d| d.test_interval_minutes > 0)
            .map(|d| {
                (
                    d.identity.clone(),
                    DeviceLiveness {
                        interval: Duration::from_secs(u64::from(d.test_interval_minutes) * 60),
                        interval_minutes: d.test_interval_minutes,
                        last_seen: now,
                        last_contact: last_contact.clone(),
                        overdue: false,
                    },
                )
            })
            .collect();
        (Self { sink, state, rx }, tx)
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.check_overdue(),
                msg = self.rx.recv() => match msg {
                    Some(LivenessMsg::TestReceived { identity }) => self.mark_received(&identity),
                    None => break,
                },
            }
        }
    }

    fn check_overdue(&mut self) {
        let now = Instant::now();
        for (identity, liveness) in self.state.iter_mut() {
            let overdue_by = now.duration_since(liveness.last_seen).saturating_sub(liveness.interval);
            if !liveness.overdue && !overdue_by.is_zero() {
                liveness.overdue = true;
                let minutes_overdue = (overdue_by.as_secs() / 60) as u32;
                tracing::warn!(identity, minutes_overdue, "device overdue for test message");
                for event in overdue_events(
                    identity,
                    liveness.last_contact.clone(),
                    liveness.interval_minutes,
                    minutes_overdue,
                ) {
                    self.sink.emit(event);
                }
            }
        }
    }

    fn mark_received(&mut self, identity: &str) {
        let Some(liveness) = self.state.get_mut(identity) else {
            return;
        };
        liveness.last_seen = Instant::now();
        liveness.last_contact = format_now();
        if liveness.overdue {
            liveness.overdue = false;
            tracing::info!(identity, "device recovered");
            for event in recovered_events(identity, liveness.last_contact.clone()) {
                self.sink.emit(event);
            }
        }
    }
}
