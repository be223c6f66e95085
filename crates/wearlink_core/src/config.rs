//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável serve dispositivo e
//! companion. Toda seção usa `#[serde(default)]`, então arquivos parciais
//! são completados com os valores padrão.

use crate::types::SensorKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Erros ao ler ou gravar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de I/O em {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao parsear TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Informações do dispositivo anunciadas no `INIT_SESSION`.
pub trait DeviceInfo {
    fn model_name(&self) -> &str;
}

/// Frequências de amostragem por sensor, lidas uma vez por sessão.
pub trait PreferencesProvider {
    /// Frequência (Hz) configurada para o sensor.
    fn sensor_frequency(&self, kind: SensorKind) -> f64;
}

/// Configuração do dispositivo (wearable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Modelo anunciado ao companion
    pub model_name: String,
    /// Endereço do companion (ip:porta)
    pub companion_addr: String,
    /// IP local para bind (vazio = auto)
    pub bind_ip: String,
    /// Intervalo do loop de eventos (ms)
    pub tick_ms: u64,
    /// Espera antes de reabrir o canal após falha (segundos)
    pub reconnect_interval_secs: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model_name: "Wearlink Sim".into(),
            companion_addr: "127.0.0.1:5005".into(),
            bind_ip: String::new(),
            tick_ms: 10,
            reconnect_interval_secs: 5.0,
        }
    }
}

impl DeviceInfo for DeviceConfig {
    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Preferências de sensores.
///
/// Para acelerômetro e giroscópio o tamanho da janela é igual à
/// frequência (uma janela por segundo).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorPreferences {
    pub accelerometer_hz: f64,
    pub gyroscope_hz: f64,
    pub heart_rate_hz: f64,
    pub battery_hz: f64,
}

impl Default for SensorPreferences {
    fn default() -> Self {
        Self {
            accelerometer_hz: 25.0,
            gyroscope_hz: 25.0,
            heart_rate_hz: 1.0,
            battery_hz: 0.1,
        }
    }
}

impl PreferencesProvider for SensorPreferences {
    fn sensor_frequency(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Accelerometer => self.accelerometer_hz,
            SensorKind::Gyroscope => self.gyroscope_hz,
            SensorKind::HeartRate => self.heart_rate_hz,
            SensorKind::Battery => self.battery_hz,
        }
    }
}

/// Configuração do companion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Porta UDP para escutar
    pub port: u16,
    /// IP do dispositivo (vazio = aceita qualquer origem)
    pub peer_ip: String,
    /// Sessão sem mensagens por este tempo é considerada perdida (segundos)
    pub peer_timeout_secs: f64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            port: 5005,
            peer_ip: String::new(),
            peer_timeout_secs: 30.0,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub sensors: SensorPreferences,
    pub companion: CompanionConfig,
}

impl AppConfig {
    /// Lê e parseia um arquivo TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Carrega configuração, caindo para o padrão se o arquivo faltar ou for inválido.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("Falha ao carregar {}: {e}", path.display()),
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.device.model_name.trim().is_empty() {
            errors.push("Modelo do dispositivo não pode ser vazio".into());
        }
        if self.device.companion_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Endereço do companion inválido: {:?}",
                self.device.companion_addr
            ));
        }
        if self.device.tick_ms == 0 || self.device.tick_ms > 1_000 {
            errors.push(format!("tick_ms inválido: {} (1–1000)", self.device.tick_ms));
        }
        for kind in SensorKind::ALL {
            let hz = self.sensors.sensor_frequency(kind);
            if !(hz > 0.0 && hz <= 200.0) {
                errors.push(format!("Frequência de {kind} inválida: {hz} (0–200 Hz)"));
            }
        }
        if !is_valid_interval(self.device.reconnect_interval_secs) {
            errors.push(format!(
                "reconnect_interval_secs inválido: {} (0–{MAX_INTERVAL_SECS} s)",
                self.device.reconnect_interval_secs
            ));
        }
        if self.companion.port == 0 {
            errors.push("Porta do companion não pode ser 0".into());
        }
        if !is_valid_interval(self.companion.peer_timeout_secs) {
            errors.push(format!(
                "peer_timeout_secs inválido: {} (0–{MAX_INTERVAL_SECS} s)",
                self.companion.peer_timeout_secs
            ));
        }

        errors
    }
}

/// Limite superior para intervalos em segundos (1 dia).
const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Finito, positivo e aceito por `Duration::from_secs_f64`.
fn is_valid_interval(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_INTERVAL_SECS
}
