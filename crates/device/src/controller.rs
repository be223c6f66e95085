//! Session Controller – máquina de estados da sessão de gravação.
//!
//! ```text
//!            mount              toggle               toggle
//!   Idle ────────────► Armed ──────────► Recording ──────────► Ended
//!    ▲                                                           │
//!    └──────────────────────── unmount (qualquer estado) ◄───────┘
//! ```
//!
//! - `Armed`: sessão criada, listeners inscritos, `INIT_SESSION` enviado
//!   se o canal estiver pronto (sem retry)
//! - `Recording`: sensores ligados, `START_SESSION` enviado
//! - `Ended`: sensores desligados, `STOP_SESSION` enviado com a contagem
//!
//! Todo o trabalho acontece dentro dos callbacks (sensor, canal, usuário),
//! cada um rodando até o fim antes do próximo. O controller nunca bloqueia.

use crate::gate::{ChannelGate, DuplexChannel, ReadyState};
use crate::listener::ListenerToken;
use crate::presenter::Presenter;
use crate::sensors::{SensorOptions, SensorSet, SensorSnapshot};
use std::time::Instant;
use tracing::{debug, info, warn};
use wearlink_core::config::{DeviceInfo, PreferencesProvider};
use wearlink_core::protocol::{
    Command, InboundMessage, InitSession, StartSession, StopSession, decode_inbound,
    encode_command,
};
use wearlink_core::{BatchReading, Clock, Reading, ReadingError, SensorKind, Session};

/// Fase da sessão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Recording,
    Ended,
}

/// Resultado de um pedido de voltar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackNavigation {
    Allowed,
    Refused,
}

/// Colaboradores injetados no controller.
pub struct Collaborators {
    pub device: Box<dyn DeviceInfo>,
    pub preferences: Box<dyn PreferencesProvider>,
    pub clock: Box<dyn Clock>,
    pub presenter: Box<dyn Presenter>,
}

/// Estado explícito da sessão corrente.
#[derive(Debug)]
struct SessionState {
    phase: Phase,
    session: Option<Session>,
    /// Amostras geradas na sessão, entregues ou não
    event_count: u64,
    sensor_tokens: Vec<(SensorKind, ListenerToken)>,
    channel_token: Option<ListenerToken>,
    channel_open: bool,
    /// Companion avisou `DISCONNECT`; limpo quando o canal reabre
    peer_lost: bool,
}

impl SessionState {
    fn idle(channel_open: bool, peer_lost: bool) -> Self {
        Self {
            phase: Phase::Idle,
            session: None,
            event_count: 0,
            sensor_tokens: Vec::new(),
            channel_token: None,
            channel_open,
            peer_lost,
        }
    }

    fn is_subscribed(&self, kind: SensorKind) -> bool {
        self.sensor_tokens.iter().any(|(k, _)| *k == kind)
    }
}

pub struct SessionController<C: DuplexChannel> {
    gate: ChannelGate<C>,
    sensors: SensorSet,
    device: Box<dyn DeviceInfo>,
    preferences: Box<dyn PreferencesProvider>,
    clock: Box<dyn Clock>,
    presenter: Box<dyn Presenter>,
    state: SessionState,
}

impl<C: DuplexChannel> SessionController<C> {
    pub fn new(channel: C, sensors: SensorSet, collaborators: Collaborators) -> Self {
        let gate = ChannelGate::new(channel);
        let channel_open = gate.is_ready();
        let Collaborators {
            device,
            preferences,
            clock,
            presenter,
        } = collaborators;

        Self {
            gate,
            sensors,
            device,
            preferences,
            clock,
            presenter,
            state: SessionState::idle(channel_open, false),
        }
    }

    // ──────────────────────────────────────────
    // Transições
    // ──────────────────────────────────────────

    /// Idle → Armed.
    pub fn mount(&mut self) {
        if self.state.phase != Phase::Idle {
            warn!("mount ignorado: fase atual {:?}", self.state.phase);
            return;
        }

        for kind in SensorKind::ALL {
            let options = SensorOptions::for_kind(kind, self.preferences.sensor_frequency(kind));
            debug!("{kind}: {:.1} Hz, janela {}", options.frequency, options.batch);
            let driver = self.sensors.get_mut(kind);
            debug_assert_eq!(driver.kind(), kind);
            driver.set_options(options);
        }

        let session = Session::new(self.clock.now_ms());
        info!("Sessão {} criada", session.id());

        self.state.sensor_tokens = SensorKind::ALL
            .into_iter()
            .map(|kind| (kind, self.sensors.get_mut(kind).subscribe()))
            .collect();
        self.state.channel_token = Some(self.gate.listen());
        self.state.event_count = 0;
        self.state.phase = Phase::Armed;
        self.state.channel_open = self.gate.is_ready();

        let init = Command::InitSession(InitSession {
            session_id: session.id().clone(),
            device_model: self.device.model_name().to_owned(),
            active_sensors: SensorKind::ALL.to_vec(),
        });
        self.state.session = Some(session);

        if self.gate.is_ready() {
            self.send_command(&init);
        } else {
            debug!("Canal não está pronto, INIT_SESSION não enviado");
        }

        self.presenter.connection_changed(self.is_connected());
        self.presenter.recording_changed(false);
    }

    /// Armed → Recording, Recording → Ended. Retorna a fase resultante.
    pub fn user_toggle(&mut self) -> Phase {
        match self.state.phase {
            Phase::Armed => self.start_recording(),
            Phase::Recording => self.stop_recording(),
            phase => debug!("toggle ignorado na fase {phase:?}"),
        }
        self.state.phase
    }

    fn start_recording(&mut self) {
        let Some(session) = &self.state.session else {
            return;
        };
        info!("Enviando START_SESSION...");
        let start = Command::StartSession(StartSession {
            session_id: session.id().clone(),
            start_time: self.clock.now_ms(),
        });
        self.send_command(&start);

        self.state.phase = Phase::Recording;
        for kind in SensorKind::ALL {
            self.sensors.get_mut(kind).start();
        }
        self.presenter.recording_changed(true);
    }

    fn stop_recording(&mut self) {
        let Some(session) = &self.state.session else {
            return;
        };
        let count = self.state.event_count;
        let stop = Command::StopSession(StopSession {
            session_id: session.id().clone(),
            end_time: self.clock.now_ms(),
            readings_count: count,
        });
        info!("Encerrando sessão {} ({count} leituras)", session.id());
        self.send_command(&stop);

        self.state.phase = Phase::Ended;
        self.stop_sensors();
        self.presenter.recording_changed(false);
        self.presenter.session_summary(count);
    }

    /// Limpeza incondicional: desliga sensores e remove todos os listeners.
    /// Chamar duas vezes não tem efeito.
    pub fn unmount(&mut self) {
        if self.state.phase == Phase::Recording {
            warn!("Desmontando com a sessão ainda gravando");
        }

        self.stop_sensors();
        for (kind, token) in self.state.sensor_tokens.drain(..) {
            self.sensors.get_mut(kind).unsubscribe(token);
        }
        if let Some(token) = self.state.channel_token.take() {
            self.gate.unlisten(token);
        }

        if self.state.phase != Phase::Idle {
            debug!("Controller desmontado");
        }
        self.state = SessionState::idle(self.state.channel_open, self.state.peer_lost);
    }

    /// Voltar é recusado enquanto grava.
    pub fn key_back(&mut self) -> BackNavigation {
        if self.state.phase == Phase::Recording {
            self.presenter.back_refused();
            BackNavigation::Refused
        } else {
            BackNavigation::Allowed
        }
    }

    fn stop_sensors(&mut self) {
        for kind in SensorKind::ALL {
            let driver = self.sensors.get_mut(kind);
            if driver.is_running() {
                driver.stop();
            }
        }
    }

    // ──────────────────────────────────────────
    // Callbacks
    // ──────────────────────────────────────────

    /// Callback de leitura de um sensor.
    pub fn on_sensor_reading(&mut self, kind: SensorKind, snapshot: SensorSnapshot) {
        if !matches!(self.state.phase, Phase::Armed | Phase::Recording)
            || !self.state.is_subscribed(kind)
        {
            debug!("Leitura de {kind} ignorada na fase {:?}", self.state.phase);
            return;
        }
        let Some(session) = &self.state.session else {
            return;
        };

        let reading = match build_reading(session, kind, snapshot) {
            Ok(r) => r,
            Err(e) => {
                warn!("Leitura de {kind} descartada: {e}");
                return;
            }
        };

        let frame = match encode_command(&Command::AddReading(reading.get())) {
            Ok(f) => f,
            Err(e) => {
                warn!("Erro ao serializar leitura de {kind}: {e}");
                return;
            }
        };

        self.state.event_count += reading.sample_count() as u64;
        self.gate.try_send(&frame);
    }

    /// Mensagem recebida do companion.
    pub fn on_inbound(&mut self, data: &[u8]) {
        if self.state.channel_token.is_none() {
            debug!("Mensagem ignorada: listener do canal não inscrito");
            return;
        }

        match decode_inbound(data) {
            Ok(InboundMessage::Disconnect) => {
                info!("Mensagem do companion: DISCONNECT");
                self.state.peer_lost = true;
                self.presenter.connection_lost();
            }
            Err(e) => debug!("Mensagem do companion ignorada: {e}"),
        }
    }

    /// Mudança de estado do canal.
    pub fn on_channel_state(&mut self, state: ReadyState) {
        let open = state == ReadyState::Open;
        if open != self.state.channel_open {
            self.state.channel_open = open;
            if open {
                self.state.peer_lost = false;
            }
            self.presenter.connection_changed(open);
        }
    }

    // ──────────────────────────────────────────
    // Bomba do loop de eventos
    // ──────────────────────────────────────────

    /// Despacha leituras pendentes de todos os sensores. Retorna quantas.
    pub fn poll_sensors(&mut self, now: Instant) -> usize {
        let mut dispatched = 0;
        for kind in SensorKind::ALL {
            loop {
                let Some(snapshot) = self.sensors.get_mut(kind).poll_reading(now) else {
                    break;
                };
                self.on_sensor_reading(kind, snapshot);
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Despacha mensagens recebidas pelo canal. Retorna quantas.
    pub fn poll_channel(&mut self) -> usize {
        let state = self.gate.state();
        self.on_channel_state(state);

        let mut dispatched = 0;
        while let Some(message) = self.gate.next_message() {
            self.on_inbound(&message);
            dispatched += 1;
        }
        dispatched
    }

    fn send_command(&mut self, command: &Command) -> bool {
        match encode_command(command) {
            Ok(frame) => {
                let sent = self.gate.try_send(&frame);
                if !sent {
                    debug!("{} não entregue", command.name());
                }
                sent
            }
            Err(e) => {
                warn!("Erro ao serializar {}: {e}", command.name());
                false
            }
        }
    }

    // ──────────────────────────────────────────
    // Acessores
    // ──────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.phase == Phase::Recording
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session.as_ref()
    }

    pub fn event_count(&self) -> u64 {
        self.state.event_count
    }

    /// Canal aberto e sem `DISCONNECT` pendente.
    pub fn is_connected(&self) -> bool {
        self.state.channel_open && !self.state.peer_lost
    }

    pub fn gate(&self) -> &ChannelGate<C> {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut ChannelGate<C> {
        &mut self.gate
    }
}

fn build_reading(
    session: &Session,
    kind: SensorKind,
    snapshot: SensorSnapshot,
) -> Result<Reading, ReadingError> {
    let id = session.id().clone();
    match snapshot {
        SensorSnapshot::Scalar { value, timestamp } => Reading::scalar(id, kind, value, timestamp),
        SensorSnapshot::Batch {
            x,
            y,
            z,
            timestamps,
        } => BatchReading::new(id, kind, x, y, z, timestamps).map(Reading::Batch),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use wearlink_core::config::SensorPreferences;
    use wearlink_core::protocol::{decode_command, encode_inbound};

    const NOW: u64 = 1_700_000_000_000;

    struct Harness {
        controller: SessionController<MockChannel>,
        channel: MockChannel,
        acc: ScriptedSensor,
        gyro: ScriptedSensor,
        hr: ScriptedSensor,
        batt: ScriptedSensor,
        presenter: RecordingPresenter,
        calls: CallLog,
    }

    impl Harness {
        fn new(state: ReadyState) -> Self {
            let channel = MockChannel::new(state);
            let calls = CallLog::default();
            let acc = ScriptedSensor::new(SensorKind::Accelerometer, calls.clone());
            let gyro = ScriptedSensor::new(SensorKind::Gyroscope, calls.clone());
            let hr = ScriptedSensor::new(SensorKind::HeartRate, calls.clone());
            let batt = ScriptedSensor::new(SensorKind::Battery, calls.clone());
            let presenter = RecordingPresenter::default();

            let sensors = SensorSet {
                accelerometer: Box::new(acc.clone()),
                gyroscope: Box::new(gyro.clone()),
                heart_rate: Box::new(hr.clone()),
                battery: Box::new(batt.clone()),
            };
            let controller = SessionController::new(
                channel.clone(),
                sensors,
                Collaborators {
                    device: Box::new(TestDevice),
                    preferences: Box::new(SensorPreferences::default()),
                    clock: Box::new(FixedClock(NOW)),
                    presenter: Box::new(presenter.clone()),
                },
            );

            Self {
                controller,
                channel,
                acc,
                gyro,
                hr,
                batt,
                presenter,
                calls,
            }
        }

        fn sent(&self) -> Vec<Command> {
            self.channel
                .sent()
                .iter()
                .map(|frame| decode_command(frame).unwrap())
                .collect()
        }

        fn sent_names(&self) -> Vec<&'static str> {
            self.sent().iter().map(|c| c.name()).collect()
        }

        fn all(&self) -> [&ScriptedSensor; 4] {
            [&self.acc, &self.gyro, &self.hr, &self.batt]
        }
    }

    fn scalar(value: f32) -> SensorSnapshot {
        SensorSnapshot::Scalar {
            value,
            timestamp: NOW,
        }
    }

    #[test]
    fn full_lifecycle_sends_init_start_stop() {
        let mut h = Harness::new(ReadyState::Open);
        assert_eq!(h.controller.phase(), Phase::Idle);

        h.controller.mount();
        assert_eq!(h.controller.phase(), Phase::Armed);
        assert_eq!(h.controller.user_toggle(), Phase::Recording);
        assert_eq!(h.controller.user_toggle(), Phase::Ended);

        assert_eq!(
            h.sent_names(),
            ["INIT_SESSION", "START_SESSION", "STOP_SESSION"]
        );

        let session_id = h.controller.session().unwrap().id().clone();
        let sent = h.sent();
        match &sent[0] {
            Command::InitSession(init) => {
                assert_eq!(init.session_id, session_id);
                assert_eq!(init.device_model, "Versa 2");
                assert_eq!(init.active_sensors, SensorKind::ALL.to_vec());
            }
            other => panic!("esperado INIT_SESSION, veio {other:?}"),
        }
        assert!(matches!(&sent[1], Command::StartSession(s) if s.start_time == NOW));
        assert!(matches!(
            &sent[2],
            Command::StopSession(s) if s.readings_count == 0 && s.end_time == NOW
        ));
        assert_eq!(h.presenter.count(&Notice::Summary(0)), 1);
    }

    #[test]
    fn stop_count_is_sum_of_increments() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();

        h.acc.push(window(25, 0));
        h.gyro.push(window(25, 0));
        h.hr.push(scalar(71.0));
        h.batt.push(scalar(88.0));
        h.acc.push(window(25, 1_000));
        assert_eq!(h.controller.poll_sensors(Instant::now()), 5);

        h.controller.user_toggle();
        let sent = h.sent();
        let Some(Command::StopSession(stop)) = sent.last() else {
            panic!("último comando deveria ser STOP_SESSION");
        };
        assert_eq!(stop.readings_count, 77);
        assert_eq!(h.controller.event_count(), 77);
        assert_eq!(h.presenter.count(&Notice::Summary(77)), 1);
    }

    #[test]
    fn accelerometer_window_becomes_add_reading() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();

        h.controller
            .on_sensor_reading(SensorKind::Accelerometer, window(25, 500));
        assert_eq!(h.controller.event_count(), 25);

        let sent = h.sent();
        let Some(Command::AddReading(record)) = sent.last() else {
            panic!("esperado ADD_READING");
        };
        assert_eq!(record.kind, SensorKind::Accelerometer);
        assert_eq!(&record.session_id, h.controller.session().unwrap().id());
        let items = record.items.as_ref().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|c| c.items.len() == 25));
        assert_eq!(record.timestamps.as_ref().unwrap().len(), 25);
    }

    #[test]
    fn closed_channel_drops_silently_but_counts() {
        let mut h = Harness::new(ReadyState::Closed);
        h.controller.mount();
        h.controller.user_toggle();

        h.controller
            .on_sensor_reading(SensorKind::Gyroscope, window(25, 0));
        h.controller.on_sensor_reading(SensorKind::HeartRate, scalar(80.0));

        assert!(h.channel.sent().is_empty());
        assert_eq!(h.controller.event_count(), 26);
        assert_eq!(h.controller.gate().dropped(), 3);
    }

    #[test]
    fn init_is_not_retried_when_channel_opens_later() {
        let mut h = Harness::new(ReadyState::Connecting);
        h.controller.mount();
        h.channel.set_state(ReadyState::Open);
        h.controller.poll_channel();
        h.controller.user_toggle();

        assert_eq!(h.sent_names(), ["START_SESSION"]);
        assert!(h.presenter.notices().contains(&Notice::Connection(true)));
    }

    #[test]
    fn malformed_batch_is_dropped_and_recording_continues() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();

        h.controller.on_sensor_reading(
            SensorKind::Accelerometer,
            SensorSnapshot::Batch {
                x: vec![1.0; 25],
                y: vec![1.0; 24],
                z: vec![1.0; 25],
                timestamps: (0..25).collect(),
            },
        );
        assert_eq!(h.controller.event_count(), 0);
        assert_eq!(h.controller.phase(), Phase::Recording);

        h.controller.on_sensor_reading(SensorKind::HeartRate, scalar(65.0));
        assert_eq!(h.controller.event_count(), 1);
        assert_eq!(h.sent_names(), ["INIT_SESSION", "START_SESSION", "ADD_READING"]);
    }

    #[test]
    fn sensors_are_silent_until_recording() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.acc.push(window(25, 0));

        assert!(h.all().iter().all(|s| s.subscribed() && !s.running()));
        assert_eq!(h.controller.poll_sensors(Instant::now()), 0);
        assert_eq!(h.acc.pending(), 1);

        h.controller.user_toggle();
        assert!(h.all().iter().all(|s| s.running()));
        assert_eq!(h.controller.poll_sensors(Instant::now()), 1);
    }

    #[test]
    fn preferences_are_applied_on_mount() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        let acc = h.acc.options().unwrap();
        assert_eq!(acc.frequency, 25.0);
        assert_eq!(acc.batch, 25);
        assert_eq!(h.hr.options().unwrap().batch, 1);
    }

    #[test]
    fn disconnect_fires_hook_once() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();

        h.channel
            .push_inbound(&encode_inbound(InboundMessage::Disconnect).unwrap());
        h.channel.push_inbound(&[0xC1, 0x00, 0xFF]);
        h.channel.push_inbound(b"HELLO");
        assert_eq!(h.controller.poll_channel(), 3);

        assert_eq!(h.presenter.count(&Notice::Lost), 1);
        assert!(!h.controller.is_connected());
        assert_eq!(h.controller.phase(), Phase::Armed);
    }

    #[test]
    fn garbage_inbound_fires_nothing() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.on_inbound(&[0xFF; 16]);
        h.controller.on_inbound(&[]);
        assert_eq!(h.presenter.count(&Notice::Lost), 0);
    }

    #[test]
    fn back_is_refused_while_recording() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        assert_eq!(h.controller.key_back(), BackNavigation::Allowed);
        h.controller.user_toggle();
        assert_eq!(h.controller.key_back(), BackNavigation::Refused);
        assert_eq!(h.presenter.count(&Notice::BackRefused), 1);
        h.controller.user_toggle();
        assert_eq!(h.controller.key_back(), BackNavigation::Allowed);
    }

    #[test]
    fn unmount_while_recording_stops_and_detaches() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();
        h.acc.push(window(25, 0));

        h.controller.unmount();
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(h.controller.session().is_none());
        assert!(h.all().iter().all(|s| !s.running() && !s.subscribed()));
        assert!(!h.channel.listening());

        assert_eq!(h.controller.poll_sensors(Instant::now()), 0);
        assert_eq!(h.sent_names(), ["INIT_SESSION", "START_SESSION"]);
    }

    #[test]
    fn unmount_stops_every_driver_before_detaching() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();
        h.calls.lock().unwrap().clear();

        h.controller.unmount();
        let calls = h.calls.lock().unwrap().clone();
        let stops: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| *c == SensorCall::Stop)
            .map(|(i, _)| i)
            .collect();
        let first_unsubscribe = calls
            .iter()
            .position(|(_, c)| *c == SensorCall::Unsubscribe)
            .unwrap();

        assert_eq!(stops.len(), 4, "{calls:?}");
        assert!(stops.iter().all(|&i| i < first_unsubscribe), "{calls:?}");
        assert_eq!(
            calls.iter().filter(|(_, c)| *c == SensorCall::Unsubscribe).count(),
            4
        );
    }

    #[test]
    fn unmount_twice_is_harmless() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.unmount();
        h.controller.unmount();
        assert_eq!(h.controller.phase(), Phase::Idle);
        // Sensores não estavam ligados: stop não é chamado
        assert!(h.all().iter().all(|s| s.stop_calls() == 0));
    }

    #[test]
    fn readings_after_unmount_are_ignored() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        h.controller.user_toggle();
        h.controller.unmount();

        h.controller.on_sensor_reading(SensorKind::HeartRate, scalar(70.0));
        h.controller.on_inbound(b"DISCONNECT");
        assert_eq!(h.controller.event_count(), 0);
        assert_eq!(h.presenter.count(&Notice::Lost), 0);
    }

    #[test]
    fn toggle_outside_session_is_ignored() {
        let mut h = Harness::new(ReadyState::Open);
        assert_eq!(h.controller.user_toggle(), Phase::Idle);
        h.controller.mount();
        h.controller.user_toggle();
        h.controller.user_toggle();
        assert_eq!(h.controller.user_toggle(), Phase::Ended);
        assert_eq!(h.sent_names().len(), 3);
    }

    #[test]
    fn remount_creates_new_session() {
        let mut h = Harness::new(ReadyState::Open);
        h.controller.mount();
        let first = h.controller.session().unwrap().id().clone();
        h.controller.user_toggle();
        h.controller.user_toggle();
        h.controller.unmount();

        h.controller.mount();
        let second = h.controller.session().unwrap().id().clone();
        assert_ne!(first, second);
        assert_eq!(h.controller.event_count(), 0);
    }
}
