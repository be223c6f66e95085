//! Acompanhamento das sessões recebidas do dispositivo.
//!
//! Para cada sessão guarda modelo, sensores anunciados, horários e o total
//! de amostras recebidas por sensor. No `STOP_SESSION` compara o
//! `readingsCount` informado pelo dispositivo com o que chegou de fato;
//! perdas enquanto o canal estava fechado são esperadas.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wearlink_core::protocol::Command;
use wearlink_core::{Reading, SensorKind, SessionId};

/// Estado de uma sessão em andamento.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub device_model: Option<String>,
    pub active_sensors: Vec<SensorKind>,
    pub start_time: Option<u64>,
    pub add_readings: u64,
    pub samples: u64,
    pub per_sensor: BTreeMap<SensorKind, u64>,
    pub invalid_readings: u64,
    last_seen: Instant,
}

impl SessionRecord {
    fn new(now: Instant) -> Self {
        Self {
            device_model: None,
            active_sensors: Vec::new(),
            start_time: None,
            add_readings: 0,
            samples: 0,
            per_sensor: BTreeMap::new(),
            invalid_readings: 0,
            last_seen: now,
        }
    }
}

/// Resultado de uma sessão encerrada.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub reported: u64,
    pub received: u64,
    /// Duração informada pelo dispositivo (ms), se houve `START_SESSION`
    pub duration_ms: Option<u64>,
}

impl SessionSummary {
    /// Amostras que o dispositivo gerou mas não chegaram.
    pub fn missing(&self) -> u64 {
        self.reported.saturating_sub(self.received)
    }
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<SessionId, SessionRecord>,
    orphan_readings: u64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aplica um comando. Retorna o resumo quando a sessão termina.
    pub fn apply(&mut self, command: Command, now: Instant) -> Option<SessionSummary> {
        match command {
            Command::InitSession(init) => {
                info!(
                    "INIT_SESSION {} – {} ({} sensores)",
                    init.session_id,
                    init.device_model,
                    init.active_sensors.len()
                );
                let record = self
                    .sessions
                    .entry(init.session_id)
                    .or_insert_with(|| SessionRecord::new(now));
                record.device_model = Some(init.device_model);
                record.active_sensors = init.active_sensors;
                record.last_seen = now;
                None
            }
            Command::StartSession(start) => {
                info!("START_SESSION {}", start.session_id);
                let record = self
                    .sessions
                    .entry(start.session_id)
                    .or_insert_with(|| SessionRecord::new(now));
                record.start_time = Some(start.start_time);
                record.last_seen = now;
                None
            }
            Command::AddReading(payload) => {
                let Some(record) = self.sessions.get_mut(&payload.session_id) else {
                    self.orphan_readings += 1;
                    debug!("ADD_READING de sessão desconhecida {}", payload.session_id);
                    return None;
                };
                record.last_seen = now;

                let kind = payload.kind;
                match Reading::from_record(payload) {
                    Ok(reading) => {
                        let n = reading.sample_count() as u64;
                        record.add_readings += 1;
                        record.samples += n;
                        *record.per_sensor.entry(kind).or_default() += n;
                    }
                    Err(e) => {
                        record.invalid_readings += 1;
                        warn!("Leitura inválida de {kind}: {e}");
                    }
                }
                None
            }
            Command::StopSession(stop) => {
                let record = self.sessions.remove(&stop.session_id);
                let received = record.as_ref().map_or(0, |r| r.samples);
                let summary = SessionSummary {
                    duration_ms: record
                        .as_ref()
                        .and_then(|r| r.start_time)
                        .map(|start| stop.end_time.saturating_sub(start)),
                    session_id: stop.session_id,
                    reported: stop.readings_count,
                    received,
                };

                if summary.missing() > 0 {
                    warn!(
                        "STOP_SESSION {}: {} de {} amostras recebidas ({} perdidas)",
                        summary.session_id,
                        summary.received,
                        summary.reported,
                        summary.missing()
                    );
                } else {
                    info!(
                        "STOP_SESSION {}: {} amostras",
                        summary.session_id, summary.received
                    );
                }
                if let Some(record) = record {
                    debug!(
                        "  {} – {} mensagens, {} inválidas",
                        record.device_model.as_deref().unwrap_or("modelo desconhecido"),
                        record.add_readings,
                        record.invalid_readings
                    );
                    for kind in &record.active_sensors {
                        let n = record.per_sensor.get(kind).copied().unwrap_or(0);
                        debug!("  {kind}: {n}");
                    }
                }
                Some(summary)
            }
        }
    }

    /// Remove sessões sem mensagens há mais de `timeout`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<SessionId> {
        let lost: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, r)| now.saturating_duration_since(r.last_seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &lost {
            if let Some(r) = self.sessions.remove(id) {
                warn!(
                    "Sessão {id} perdida após {:.0}s sem mensagens ({} amostras recebidas)",
                    timeout.as_secs_f64(),
                    r.samples
                );
            }
        }
        lost
    }

    #[cfg(test)]
    pub fn session(&self, id: &SessionId) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn orphan_readings(&self) -> u64 {
        self.orphan_readings
    }
}
