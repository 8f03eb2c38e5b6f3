//! VdS 2465 alarm-transmission protocol server: a TCP listener speaking the
//! encrypted IK1-IK7 link layer and its TLV record payloads, raised to a
//! small event/command surface for a host application to wire into its own
//! entity model.

pub mod config;
pub mod connection;
pub mod crc;
pub mod crypto;
pub mod event;
pub mod frame;
pub mod link;
pub mod liveness;
pub mod record;
pub mod result;
pub mod server;
pub mod timer;

pub use config::{DeviceConfig, ServerConfig};
pub use event::{EventSink, MessageKind, MonitoringKind, Quelle, RecordContext, VdsEvent, Zustand};
pub use result::{VdsError, VdsResult};
pub use server::VdsServer;
