//! Protocolo de comandos entre dispositivo e companion.
//!
//! Cada mensagem é um envelope `{command, payload}` serializado em
//! MessagePack com structs como mapas (chaves nomeadas):
//!
//! ```text
//! ┌───────────────────────────┬──────────────────────────────────┐
//! │ "command": <literal>      │ "payload": { campos camelCase }  │
//! └───────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! - Os quatro literais de comando são parte do contrato (o companion faz
//!   um switch exato de string)
//! - A ordem das chaves não é significativa
//! - Sem compressão além da própria codificação binária
//!
//! No sentido companion → dispositivo trafegam apenas mensagens de controle
//! literais (`DISCONNECT`), ver [`decode_inbound`].

use crate::session::SessionId;
use crate::types::{ReadingRecord, SensorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Tamanho máximo de uma mensagem (limite de datagrama UDP sem fragmentação).
pub const MAX_MESSAGE_SIZE: usize = 65507;

/// Literal de desconexão enviado pelo companion.
pub const DISCONNECT: &str = "DISCONNECT";

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Mensagem vazia")]
    Empty,

    #[error("Erro de serialização: {0}")]
    Encode(String),

    #[error("Erro de deserialização: {0}")]
    Decode(String),

    #[error("Mensagem de controle desconhecida: {0:?}")]
    UnknownMessage(String),
}

// ──────────────────────────────────────────────
// Payloads
// ──────────────────────────────────────────────

/// Payload de `INIT_SESSION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSession {
    pub session_id: SessionId,
    pub device_model: String,
    pub active_sensors: Vec<SensorKind>,
}

/// Payload de `START_SESSION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    pub session_id: SessionId,
    /// Epoch em ms
    pub start_time: u64,
}

/// Payload de `STOP_SESSION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSession {
    pub session_id: SessionId,
    /// Epoch em ms
    pub end_time: u64,
    pub readings_count: u64,
}

/// Envelope de comando dispositivo → companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum Command {
    #[serde(rename = "INIT_SESSION")]
    InitSession(InitSession),
    #[serde(rename = "START_SESSION")]
    StartSession(StartSession),
    #[serde(rename = "STOP_SESSION")]
    StopSession(StopSession),
    #[serde(rename = "ADD_READING")]
    AddReading(ReadingRecord),
}

impl Command {
    /// Literal do comando no wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::InitSession(_) => "INIT_SESSION",
            Command::StartSession(_) => "START_SESSION",
            Command::StopSession(_) => "STOP_SESSION",
            Command::AddReading(_) => "ADD_READING",
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Command::InitSession(p) => &p.session_id,
            Command::StartSession(p) => &p.session_id,
            Command::StopSession(p) => &p.session_id,
            Command::AddReading(r) => &r.session_id,
        }
    }
}

/// Codifica um [`Command`] para envio pelo canal.
pub fn encode_command(command: &Command) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec_named(command).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodifica bytes recebidos em [`Command`].
pub fn decode_command(data: &[u8]) -> Result<Command, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::Empty);
    }
    from_slice_exact(data)
}

/// Decodifica um único valor MessagePack que ocupa a mensagem inteira.
fn from_slice_exact<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    let mut cursor = Cursor::new(data);
    let value =
        rmp_serde::from_read(&mut cursor).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    let consumed = cursor.position() as usize;
    if consumed != data.len() {
        return Err(ProtocolError::Decode(format!(
            "{} bytes sobrando após a mensagem",
            data.len() - consumed
        )));
    }
    Ok(value)
}

// ──────────────────────────────────────────────
// Mensagens de controle (companion → dispositivo)
// ──────────────────────────────────────────────

/// Mensagem de controle recebida do companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    Disconnect,
}

impl InboundMessage {
    pub fn literal(self) -> &'static str {
        match self {
            InboundMessage::Disconnect => DISCONNECT,
        }
    }

    fn from_literal(s: &str) -> Result<Self, ProtocolError> {
        match s {
            DISCONNECT => Ok(InboundMessage::Disconnect),
            other => Err(ProtocolError::UnknownMessage(other.to_owned())),
        }
    }
}

/// Codifica uma mensagem de controle como string MessagePack.
pub fn encode_inbound(message: InboundMessage) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec(message.literal()).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodifica uma mensagem de controle.
///
/// Aceita o literal como string MessagePack ou como UTF-8 puro.
pub fn decode_inbound(data: &[u8]) -> Result<InboundMessage, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::Empty);
    }

    match from_slice_exact::<String>(data) {
        Ok(s) => InboundMessage::from_literal(&s),
        Err(e) => match std::str::from_utf8(data) {
            Ok(s) => InboundMessage::from_literal(s),
            Err(_) => Err(e),
        },
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
