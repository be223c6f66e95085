//! # Wearlink Core
//!
//! Crate compartilhada entre dispositivo e companion: leituras de sensores,
//! identidade de sessão, protocolo de comandos (MessagePack) e
//! configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Leituras escalares e janelas multi-canal
//! - [`session`] – Identificador de sessão e relógio
//! - [`protocol`] – Envelope `{command, payload}` e mensagens de controle
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod session;
pub mod protocol;
pub mod config;

// Re-exports convenientes
pub use types::{BatchReading, Reading, ReadingError, ReadingRecord, SensorKind};
pub use session::{Clock, Session, SessionId, SystemClock};
pub use protocol::{Command, InboundMessage, ProtocolError, decode_command, encode_command};
pub use config::{AppConfig, DeviceInfo, PreferencesProvider};
