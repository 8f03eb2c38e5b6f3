//! Per-connection state machine: owns the socket, the tc/rc counters, the
//! send queue and retry/poll timers, and drives incoming frames through
//! `frame`/`crc`/`crypto`/`record::interpret` and the `link` decision table.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::event::EventSink;
use crate::frame::{self, FrameDecoder};
use crate::link;
use crate::liveness::LivenessMsg;
use crate::record::interpret::interpret_payload;
use crate::result::{VdsError, VdsResult};
use crate::timer;

const READ_BUF_LEN: usize = 4096;
const BURST_WINDOW: u8 = 5;

/// Shared by every connection on a listener: maps a bound identity to the
/// command channel of whichever connection currently holds it, so
/// `VdsServer::send_output` can route by identity instead of peer address.
pub type CommandRegistry = Arc<Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>>;

pub struct Connection {
    socket: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    sink: Arc<dyn EventSink>,
    liveness_tx: mpsc::Sender<LivenessMsg>,
    polling_interval: Duration,

    decoder: FrameDecoder,
    tc: u32,
    tc_rec: u32,
    last_sent_rc: u32,
    key_id: u16,
    device_key: Option<[u8; crate::crypto::KEY_LEN]>,
    identity: Option<String>,

    send_queue: VecDeque<Vec<u8>>,
    last_sent_frame: Option<Vec<u8>>,
    retry_count: u8,
    burst_remaining: u8,

    retry_deadline: Option<Instant>,
    poll_deadline: Option<Instant>,
    disconnected: bool,
    cmd_rx: mpsc::Receiver<Vec<u8>>,
    own_cmd_tx: mpsc::Sender<Vec<u8>>,
    registry: CommandRegistry,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub fn new(
        socket: TcpStream,
        peer: SocketAddr,
        config: Arc<ServerConfig>,
        sink: Arc<dyn EventSink>,
        liveness_tx: mpsc::Sender<LivenessMsg>,
        registry: CommandRegistry,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::Sender<Vec<u8>>) {
        let polling_interval = Duration::from_secs(config.polling_interval_secs);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let connection = Self {
            socket,
            peer,
            config,
            sink,
            liveness_tx,
            polling_interval,
            decoder: FrameDecoder::new(),
            tc: OsRng.next_u32(),
            tc_rec: 0,
            last_sent_rc: 0,
            key_id: 0,
            device_key: None,
            identity: None,
            send_queue: VecDeque::new(),
            last_sent_frame: None,
            retry_count: 0,
            burst_remaining: 0,
            retry_deadline: None,
            poll_deadline: None,
            disconnected: false,
            cmd_rx,
            own_cmd_tx: cmd_tx.clone(),
            registry,
            shutdown,
        };
        (connection, cmd_tx)
    }

    pub async fn run(mut self) {
        if let Err(e) = self.send_ik1().await {
            tracing::warn!(peer = %self.peer, error = %e, "failed to send initial IK1");
            return;
        }

        let mut read_buf = [0u8; READ_BUF_LEN];
        loop {
            let retry_sleep = timer::sleep_until_opt(self.retry_deadline);
            let poll_sleep = timer::sleep_until_opt(self.poll_deadline);

            tokio::select! {
                res = self.socket.read(&mut read_buf) => {
                    match res {
                        Ok(0) => {
                            tracing::info!(peer = %self.peer, "peer closed connection");
                            break;
                        }
                        Ok(n) => {
                            self.poll_deadline = None;
                            self.decoder.feed(&read_buf[..n]);
                            if let Err(e) = self.drain_frames().await {
                                tracing::warn!(peer = %self.peer, error = %e, "tearing down connection");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(peer = %self.peer, error = %e, "read error");
                            break;
                        }
                    }
                }
                _ = retry_sleep => {
                    if let Err(e) = self.on_retry_expired().await {
                        tracing::warn!(peer = %self.peer, error = %e, "retry exhausted");
                        break;
                    }
                }
                _ = poll_sleep => {
                    if let Err(e) = self.on_poll_expired().await {
                        tracing::warn!(peer = %self.peer, error = %e, "poll send failed");
                        break;
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    if let Some(body) = cmd {
                        self.send_queue.push_back(body);
                    }
                }
                res = self.shutdown.changed() => {
                    if res.is_err() || *self.shutdown.borrow() {
                        tracing::info!(peer = %self.peer, "shutting down on server stop");
                        break;
                    }
                }
            }
        }

        self.disconnect().await;
    }

    async fn drain_frames(&mut self) -> VdsResult<()> {
        while let Some(raw) = self.decoder.next_frame() {
            self.handle_raw_frame(raw).await?;
        }
        Ok(())
    }

    async fn handle_raw_frame(&mut self, raw: frame::RawFrame) -> VdsResult<()> {
        let device_key = self.resolve_key(raw.key_id)?;
        self.key_id = raw.key_id;
        self.device_key = device_key;

        let plaintext = match frame::decode_payload(&raw, self.device_key.as_ref()) {
            Ok(pt) => pt,
            Err(VdsError::Crc) => {
                tracing::warn!(peer = %self.peer, "CRC mismatch, dropping frame");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if plaintext.len() < 13 {
            tracing::warn!(peer = %self.peer, "frame shorter than header, dropping");
            return Ok(());
        }

        let tc_rec = u32::from_be_bytes(plaintext[0..4].try_into().unwrap());
        self.tc_rec = tc_rec;
        let ik = plaintext[10];
        let pk = plaintext[11];
        let l = plaintext[12] as usize;

        if pk != link::PK_ACCEPTED {
            tracing::warn!(peer = %self.peer, pk, "protocol-kind mismatch");
            self.send_ik6().await?;
            self.send_ik3().await?;
            return Ok(());
        }

        self.retry_count = 0;
        self.retry_deadline = None;

        if ik == link::ik::DATA {
            let body_end = (13 + l).min(plaintext.len());
            self.handle_data_payload(&plaintext[13..body_end]).await?;
        }

        match link::decide(ik, !self.send_queue.is_empty()) {
            link::NextAction::SendIk4 => self.send_next_queued().await?,
            link::NextAction::SendIk3 => self.send_ik3().await?,
            link::NextAction::Ik3AfterPoll => self.enter_post_poll_idle().await?,
            link::NextAction::Reconcile => {
                self.tc_rec = self.last_sent_rc.wrapping_sub(1);
                self.burst_remaining = BURST_WINDOW;
                self.poll_deadline = None;
                self.send_ik3().await?;
            }
            link::NextAction::Ik5ThenIk3 => {
                self.send_ik5().await?;
                self.send_ik3().await?;
            }
        }
        Ok(())
    }

    async fn handle_data_payload(&mut self, payload: &[u8]) -> VdsResult<()> {
        let outcome = interpret_payload(payload, &self.config.devices, self.identity.as_deref(), self.key_id);

        if let Some(identity) = outcome.unknown_identity {
            return Err(VdsError::UnknownIdentity(identity));
        }

        if let Some((identity, _key_id)) = outcome.bound_device {
            self.identity = Some(identity.clone());
            if let Some(dev) = self.config.find_by_identity(&identity) {
                self.device_key = dev.key_bytes()?;
            }
            self.registry
                .lock()
                .unwrap()
                .insert(identity, self.own_cmd_tx.clone());
        }

        if outcome.test_message_received {
            if let Some(identity) = &self.identity {
                let _ = self
                    .liveness_tx
                    .send(LivenessMsg::TestReceived { identity: identity.clone() })
                    .await;
            }
        }

        for event in outcome.events {
            self.sink.emit(event);
        }
        for ack in outcome.acks {
            self.send_queue.push_back(ack);
        }
        Ok(())
    }

    fn resolve_key(&self, key_id: u16) -> VdsResult<Option<[u8; crate::crypto::KEY_LEN]>> {
        if key_id == 0 {
            return Ok(None);
        }
        match self.config.find_by_key_id(key_id) {
            Some(dev) if dev.encrypted => dev.key_bytes(),
            _ => Err(VdsError::UnknownKeyId(key_id)),
        }
    }

    async fn send_next_queued(&mut self) -> VdsResult<()> {
        if let Some(body) = self.send_queue.pop_front() {
            self.send_ik4(&body).await?;
        }
        Ok(())
    }

    async fn enter_post_poll_idle(&mut self) -> VdsResult<()> {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            self.poll_deadline = None;
            self.send_ik3().await
        } else {
            self.poll_deadline = Some(Instant::now() + self.polling_interval);
            Ok(())
        }
    }

    async fn on_poll_expired(&mut self) -> VdsResult<()> {
        self.poll_deadline = None;
        self.send_ik3().await
    }

    async fn on_retry_expired(&mut self) -> VdsResult<()> {
        self.retry_count += 1;
        if self.retry_count > timer::MAX_RETRIES {
            return Err(VdsError::RetryExhausted);
        }
        if let Some(frame_bytes) = self.last_sent_frame.clone() {
            self.socket.write_all(&frame_bytes).await?;
        }
        self.arm_retry();
        Ok(())
    }

    fn arm_retry(&mut self) {
        self.retry_deadline = Some(timer::retry_deadline(self.polling_interval));
    }

    async fn send_ik1(&mut self) -> VdsResult<()> {
        let mut body = vec![0u8; 14];
        body[0..4].copy_from_slice(&self.tc.to_be_bytes());
        self.tc = self.tc.wrapping_add(1);
        body[6..10].copy_from_slice(&0u32.to_be_bytes());
        self.last_sent_rc = 0;
        body[10] = link::ik::CONNECT;
        body[11] = link::PK_ACCEPTED;
        body[12] = 1;
        body[13] = 1; // window size
        self.transmit(body).await
    }

    async fn send_ik3(&mut self) -> VdsResult<()> {
        self.send_raw(link::ik::IDLE_POLL, 0, &[]).await
    }

    async fn send_ik4(&mut self, payload: &[u8]) -> VdsResult<()> {
        let l = payload.len().min(u8::MAX as usize) as u8;
        self.send_raw(link::ik::DATA, l, &payload[..l as usize]).await
    }

    async fn send_ik5(&mut self) -> VdsResult<()> {
        self.send_raw(link::ik::POS_ACK, 0, &[]).await
    }

    async fn send_ik6(&mut self) -> VdsResult<()> {
        self.send_raw(link::ik::NEG_ACK, 0, &[]).await
    }

    async fn send_raw(&mut self, ik: u8, l: u8, payload: &[u8]) -> VdsResult<()> {
        let mut body = vec![0u8; 13 + payload.len()];
        body[0..4].copy_from_slice(&self.tc.to_be_bytes());
        self.tc = self.tc.wrapping_add(1);
        let rc = self.tc_rec.wrapping_add(1);
        body[6..10].copy_from_slice(&rc.to_be_bytes());
        self.last_sent_rc = rc;
        body[10] = ik;
        body[11] = link::PK_ACCEPTED;
        body[12] = l;
        body[13..].copy_from_slice(payload);
        self.transmit(body).await
    }

    async fn transmit(&mut self, body: Vec<u8>) -> VdsResult<()> {
        let wire = frame::encode_frame(self.key_id, self.device_key.as_ref(), body)?;
        self.socket.write_all(&wire).await?;
        self.last_sent_frame = Some(wire);
        self.poll_deadline = None;
        self.arm_retry();
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.retry_deadline = None;
        self.poll_deadline = None;
        if let Some(identity) = &self.identity {
            self.registry.lock().unwrap().remove(identity);
        }
        self.sink.emit(crate::event::VdsEvent::Disconnected {
            identity: self.identity.clone(),
            key_id: self.key_id,
        });
        let _ = tokio::time::timeout(Duration::from_secs(1), self.socket.shutdown()).await;
    }
}

