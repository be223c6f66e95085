//! Definição das leituras de sensores.
//!
//! Uma leitura é um valor imutável criado a cada callback de sensor e
//! descartado logo após a codificação. Existem dois formatos:
//!
//! - [`Reading::Scalar`] – amostra única (frequência cardíaca, bateria)
//! - [`Reading::Batch`] – janela multi-canal (acelerômetro, giroscópio)
//!
//! [`Reading::get`] projeta a leitura no registro plano ([`ReadingRecord`])
//! que vai dentro do comando `ADD_READING`.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Tipos de sensor
// ──────────────────────────────────────────────

/// Sensores suportados pelo dispositivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    #[serde(rename = "HEARTRATE")]
    HeartRate,
    Battery,
}

impl SensorKind {
    /// Todos os sensores, na ordem em que são anunciados no `INIT_SESSION`.
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::HeartRate,
        SensorKind::Battery,
    ];

    /// Literal usado no protocolo.
    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "ACCELEROMETER",
            SensorKind::Gyroscope => "GYROSCOPE",
            SensorKind::HeartRate => "HEARTRATE",
            SensorKind::Battery => "BATTERY",
        }
    }

    /// `true` para sensores que entregam janelas X/Y/Z.
    pub fn is_batch(self) -> bool {
        matches!(self, SensorKind::Accelerometer | SensorKind::Gyroscope)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Eixo de um sensor multi-canal. A ordem X, Y, Z é fixa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLabel {
    X,
    Y,
    Z,
}

impl ChannelLabel {
    pub const ORDER: [ChannelLabel; 3] = [ChannelLabel::X, ChannelLabel::Y, ChannelLabel::Z];
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelLabel::X => "X",
            ChannelLabel::Y => "Y",
            ChannelLabel::Z => "Z",
        };
        f.write_str(s)
    }
}

/// Erros na construção de leituras.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    #[error("Janela malformada: canal {label} tem {actual} amostras, timestamps tem {expected}")]
    MalformedBatch {
        label: ChannelLabel,
        expected: usize,
        actual: usize,
    },

    #[error("Sensor {0} não suporta este formato de leitura")]
    UnsupportedKind(SensorKind),

    #[error("Valor fora do intervalo para {kind}: {value}")]
    OutOfRange { kind: SensorKind, value: f32 },
}

// ──────────────────────────────────────────────
// Leituras
// ──────────────────────────────────────────────

/// Amostras de um eixo.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub label: ChannelLabel,
    pub samples: Vec<f32>,
}

/// Amostra única de um sensor escalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarReading {
    pub session_id: SessionId,
    pub kind: SensorKind,
    pub value: f32,
    /// Epoch em ms
    pub timestamp: u64,
}

/// Janela de amostras X/Y/Z que compartilham a mesma sequência de timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReading {
    session_id: SessionId,
    kind: SensorKind,
    channels: Vec<Channel>,
    timestamps: Vec<u64>,
}

impl BatchReading {
    /// Cria uma janela validando o alinhamento de cada canal com `timestamps`.
    pub fn new(
        session_id: SessionId,
        kind: SensorKind,
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        timestamps: Vec<u64>,
    ) -> Result<Self, ReadingError> {
        if !kind.is_batch() {
            return Err(ReadingError::UnsupportedKind(kind));
        }

        let channels: Vec<Channel> = ChannelLabel::ORDER
            .into_iter()
            .zip([x, y, z])
            .map(|(label, samples)| Channel { label, samples })
            .collect();

        for channel in &channels {
            if channel.samples.len() != timestamps.len() {
                return Err(ReadingError::MalformedBatch {
                    label: channel.label,
                    expected: timestamps.len(),
                    actual: channel.samples.len(),
                });
            }
        }

        Ok(Self {
            session_id,
            kind,
            channels,
            timestamps,
        })
    }

    pub fn accelerometer(
        session_id: SessionId,
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        timestamps: Vec<u64>,
    ) -> Result<Self, ReadingError> {
        Self::new(session_id, SensorKind::Accelerometer, x, y, z, timestamps)
    }

    pub fn gyroscope(
        session_id: SessionId,
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        timestamps: Vec<u64>,
    ) -> Result<Self, ReadingError> {
        Self::new(session_id, SensorKind::Gyroscope, x, y, z, timestamps)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Canais na ordem X, Y, Z.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    /// Número de amostras na janela.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Leitura de sensor: escalar ou janela.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Scalar(ScalarReading),
    Batch(BatchReading),
}

impl Reading {
    /// Cria uma leitura escalar validando o tipo do sensor.
    pub fn scalar(
        session_id: SessionId,
        kind: SensorKind,
        value: f32,
        timestamp: u64,
    ) -> Result<Self, ReadingError> {
        if kind.is_batch() {
            return Err(ReadingError::UnsupportedKind(kind));
        }
        if kind == SensorKind::Battery && !(0.0..=100.0).contains(&value) {
            return Err(ReadingError::OutOfRange { kind, value });
        }
        Ok(Reading::Scalar(ScalarReading {
            session_id,
            kind,
            value,
            timestamp,
        }))
    }

    /// Frequência cardíaca (bpm).
    pub fn heart_rate(session_id: SessionId, bpm: f32, timestamp: u64) -> Result<Self, ReadingError> {
        Self::scalar(session_id, SensorKind::HeartRate, bpm, timestamp)
    }

    /// Nível de bateria (0–100%).
    pub fn battery(session_id: SessionId, percent: f32, timestamp: u64) -> Result<Self, ReadingError> {
        Self::scalar(session_id, SensorKind::Battery, percent, timestamp)
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            Reading::Scalar(r) => r.kind,
            Reading::Batch(b) => b.kind,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Reading::Scalar(r) => &r.session_id,
            Reading::Batch(b) => &b.session_id,
        }
    }

    /// Quantidade de amostras discretas que a leitura representa.
    pub fn sample_count(&self) -> usize {
        match self {
            Reading::Scalar(_) => 1,
            Reading::Batch(b) => b.len(),
        }
    }

    /// Projeção plana usada como payload de `ADD_READING`.
    pub fn get(&self) -> ReadingRecord {
        match self {
            Reading::Scalar(r) => ReadingRecord {
                session_id: r.session_id.clone(),
                kind: r.kind,
                value: Some(r.value),
                items: None,
                time_stamp: Some(r.timestamp),
                timestamps: None,
            },
            Reading::Batch(b) => ReadingRecord {
                session_id: b.session_id.clone(),
                kind: b.kind,
                value: None,
                items: Some(
                    b.channels
                        .iter()
                        .map(|c| ChannelRecord {
                            label: c.label,
                            items: c.samples.clone(),
                        })
                        .collect(),
                ),
                time_stamp: None,
                timestamps: Some(b.timestamps.clone()),
            },
        }
    }

    /// Reconstrói a leitura a partir do registro recebido (lado companion).
    pub fn from_record(record: ReadingRecord) -> Result<Self, RecordError> {
        let ReadingRecord {
            session_id,
            kind,
            value,
            items,
            time_stamp,
            timestamps,
        } = record;

        if !kind.is_batch() {
            let value = value.ok_or(RecordError::MissingField("value"))?;
            let timestamp = time_stamp.ok_or(RecordError::MissingField("timeStamp"))?;
            return Ok(Self::scalar(session_id, kind, value, timestamp)?);
        }

        let items = items.ok_or(RecordError::MissingField("items"))?;
        let timestamps = timestamps.ok_or(RecordError::MissingField("timestamps"))?;
        let labels: Vec<ChannelLabel> = items.iter().map(|c| c.label).collect();
        if labels != ChannelLabel::ORDER {
            return Err(RecordError::ChannelOrder(labels));
        }

        let mut axes = items.into_iter().map(|c| c.items);
        let (Some(x), Some(y), Some(z)) = (axes.next(), axes.next(), axes.next()) else {
            return Err(RecordError::MissingField("items"));
        };
        Ok(Reading::Batch(BatchReading::new(
            session_id, kind, x, y, z, timestamps,
        )?))
    }
}

impl From<BatchReading> for Reading {
    fn from(batch: BatchReading) -> Self {
        Reading::Batch(batch)
    }
}

/// Erros ao reconstruir uma leitura a partir do registro de wire.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("Campo ausente: {0}")]
    MissingField(&'static str),

    #[error("Ordem de canais inválida: {0:?} (esperado X, Y, Z)")]
    ChannelOrder(Vec<ChannelLabel>),

    #[error(transparent)]
    Reading(#[from] ReadingError),
}

// ──────────────────────────────────────────────
// Registro de wire
// ──────────────────────────────────────────────

/// Canal como aparece no wire: `{type, items}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(rename = "type")]
    pub label: ChannelLabel,
    pub items: Vec<f32>,
}

/// Registro plano de uma leitura (`get()`), payload de `ADD_READING`.
///
/// Leituras escalares preenchem `value` e `timeStamp`; janelas preenchem
/// `items` e `timestamps`. Campos ausentes não são serializados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRecord {
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub kind: SensorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ChannelRecord>>,
    #[serde(rename = "timeStamp", default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<u64>>,
}

impl ReadingRecord {
    /// Amostras discretas contidas no registro.
    pub fn sample_count(&self) -> usize {
        match &self.timestamps {
            Some(ts) => ts.len(),
            None => 1,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
