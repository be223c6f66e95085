//! Dublês de teste: canal, sensores, presenter e relógio.

use crate::gate::{DuplexChannel, ReadyState};
use crate::listener::{ListenerToken, Listeners};
use crate::presenter::Presenter;
use crate::sensors::{SensorDriver, SensorOptions, SensorSnapshot};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use wearlink_core::config::DeviceInfo;
use wearlink_core::{Clock, SensorKind};

// ──────────────────────────────────────────────
// Canal
// ──────────────────────────────────────────────

struct MockChannelInner {
    state: ReadyState,
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
    listeners: Listeners,
    fail_sends: bool,
}

/// Canal em memória; clones compartilham o mesmo estado.
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

impl MockChannel {
    pub fn new(state: ReadyState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockChannelInner {
                state,
                sent: Vec::new(),
                inbound: VecDeque::new(),
                listeners: Listeners::new(),
                fail_sends: false,
            })),
        }
    }

    pub fn set_state(&self, state: ReadyState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().unwrap().fail_sends = fail;
    }

    pub fn push_inbound(&self, data: &[u8]) {
        self.inner.lock().unwrap().inbound.push_back(data.to_vec());
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn listening(&self) -> bool {
        self.inner.lock().unwrap().listeners.has_listeners()
    }
}

impl DuplexChannel for MockChannel {
    fn ready_state(&self) -> ReadyState {
        self.inner.lock().unwrap().state
    }

    fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock",
            ));
        }
        inner.sent.push(data.to_vec());
        Ok(())
    }

    fn poll_message(&mut self) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().inbound.pop_front()
    }

    fn subscribe(&mut self) -> ListenerToken {
        self.inner.lock().unwrap().listeners.subscribe()
    }

    fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.inner.lock().unwrap().listeners.unsubscribe(token)
    }

    fn has_listeners(&self) -> bool {
        self.inner.lock().unwrap().listeners.has_listeners()
    }
}

// ──────────────────────────────────────────────
// Sensores
// ──────────────────────────────────────────────

/// Chamada recebida por um driver, na ordem global entre sensores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCall {
    Start,
    Stop,
    Subscribe,
    Unsubscribe,
}

/// Registro compartilhado entre vários [`ScriptedSensor`].
pub type CallLog = Arc<Mutex<Vec<(SensorKind, SensorCall)>>>;

struct ScriptedInner {
    running: bool,
    options: Option<SensorOptions>,
    listeners: Listeners,
    queue: VecDeque<SensorSnapshot>,
    stop_calls: usize,
}

/// Sensor que entrega snapshots enfileirados pelo teste.
#[derive(Clone)]
pub struct ScriptedSensor {
    kind: SensorKind,
    inner: Arc<Mutex<ScriptedInner>>,
    log: CallLog,
}

impl ScriptedSensor {
    pub fn new(kind: SensorKind, log: CallLog) -> Self {
        Self {
            kind,
            log,
            inner: Arc::new(Mutex::new(ScriptedInner {
                running: false,
                options: None,
                listeners: Listeners::new(),
                queue: VecDeque::new(),
                stop_calls: 0,
            })),
        }
    }

    pub fn push(&self, snapshot: SensorSnapshot) {
        self.inner.lock().unwrap().queue.push_back(snapshot);
    }

    pub fn running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn subscribed(&self) -> bool {
        self.inner.lock().unwrap().listeners.has_listeners()
    }

    pub fn options(&self) -> Option<SensorOptions> {
        self.inner.lock().unwrap().options
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    fn record(&self, call: SensorCall) {
        self.log.lock().unwrap().push((self.kind, call));
    }
}

impl SensorDriver for ScriptedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn set_options(&mut self, options: SensorOptions) {
        self.inner.lock().unwrap().options = Some(options);
    }

    fn start(&mut self) {
        self.record(SensorCall::Start);
        self.inner.lock().unwrap().running = true;
    }

    fn stop(&mut self) {
        self.record(SensorCall::Stop);
        let mut inner = self.inner.lock().unwrap();
        inner.running = false;
        inner.stop_calls += 1;
    }

    fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    fn subscribe(&mut self) -> ListenerToken {
        self.record(SensorCall::Subscribe);
        self.inner.lock().unwrap().listeners.subscribe()
    }

    fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.record(SensorCall::Unsubscribe);
        self.inner.lock().unwrap().listeners.unsubscribe(token)
    }

    fn poll_reading(&mut self, _now: Instant) -> Option<SensorSnapshot> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running || !inner.listeners.has_listeners() {
            return None;
        }
        inner.queue.pop_front()
    }
}

/// Janela X/Y/Z de `n` amostras.
pub fn window(n: usize, t0: u64) -> SensorSnapshot {
    SensorSnapshot::Batch {
        x: (0..n).map(|i| i as f32 * 0.1).collect(),
        y: (0..n).map(|i| 9.8 - i as f32 * 0.01).collect(),
        z: (0..n).map(|i| -(i as f32) * 0.2).collect(),
        timestamps: (0..n as u64).map(|i| t0 + i * 40).collect(),
    }
}

// ──────────────────────────────────────────────
// Presenter
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connection(bool),
    Lost,
    Recording(bool),
    BackRefused,
    Summary(u64),
}

/// Presenter que guarda as notificações recebidas.
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingPresenter {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, notice: &Notice) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == notice)
            .count()
    }

    fn push(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

impl Presenter for RecordingPresenter {
    fn connection_changed(&mut self, connected: bool) {
        self.push(Notice::Connection(connected));
    }

    fn connection_lost(&mut self) {
        self.push(Notice::Lost);
    }

    fn recording_changed(&mut self, recording: bool) {
        self.push(Notice::Recording(recording));
    }

    fn back_refused(&mut self) {
        self.push(Notice::BackRefused);
    }

    fn session_summary(&mut self, readings_count: u64) {
        self.push(Notice::Summary(readings_count));
    }
}

// ──────────────────────────────────────────────
// Relógio e dispositivo
// ──────────────────────────────────────────────

/// Relógio fixo (epoch ms).
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

pub struct TestDevice;

impl DeviceInfo for TestDevice {
    fn model_name(&self) -> &str {
        "Versa 2"
    }
}
