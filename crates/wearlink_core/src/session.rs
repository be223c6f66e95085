//! Identidade de uma sessão de gravação.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identificador opaco e único de uma sessão.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Gera um identificador novo (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uma sessão de gravação. Imutável após a criação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    created_at: u64,
}

impl Session {
    /// Cria uma sessão com id novo, marcada em `created_at` (epoch ms).
    pub fn new(created_at: u64) -> Self {
        Self {
            id: SessionId::generate(),
            created_at,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

/// Fonte de tempo em epoch ms.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Relógio do sistema via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}
