//! Contrato dos drivers de sensores.
//!
//! O controller trata os drivers como caixas-pretas: configura, liga,
//! desliga e recebe snapshots crus. Um driver só entrega leituras quando
//! está ligado **e** tem um listener inscrito.

use crate::listener::ListenerToken;
use std::time::Instant;
use wearlink_core::SensorKind;

/// Opções aplicadas ao driver no início da sessão.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorOptions {
    /// Frequência de amostragem (Hz)
    pub frequency: f64,
    /// Amostras por callback (1 para sensores escalares)
    pub batch: usize,
}

impl SensorOptions {
    /// Deriva as opções a partir da frequência: janelas de um segundo para
    /// sensores multi-canal, amostra única para os demais.
    pub fn for_kind(kind: SensorKind, frequency: f64) -> Self {
        let batch = if kind.is_batch() {
            (frequency.round() as usize).max(1)
        } else {
            1
        };
        Self { frequency, batch }
    }
}

/// Buffers crus entregues por um callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSnapshot {
    Scalar {
        value: f32,
        timestamp: u64,
    },
    Batch {
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        timestamps: Vec<u64>,
    },
}

/// Driver de um sensor.
pub trait SensorDriver {
    fn kind(&self) -> SensorKind;

    fn set_options(&mut self, options: SensorOptions);

    fn start(&mut self);

    /// Síncrono: após retornar, nenhuma leitura é entregue.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn subscribe(&mut self) -> ListenerToken;

    fn unsubscribe(&mut self, token: ListenerToken) -> bool;

    /// Leitura pendente, se houver. Chamado pelo loop de eventos.
    fn poll_reading(&mut self, now: Instant) -> Option<SensorSnapshot>;
}

/// Os quatro drivers que o controller gerencia.
pub struct SensorSet {
    pub accelerometer: Box<dyn SensorDriver>,
    pub gyroscope: Box<dyn SensorDriver>,
    pub heart_rate: Box<dyn SensorDriver>,
    pub battery: Box<dyn SensorDriver>,
}

impl SensorSet {
    /// Acesso pelo tipo de sensor.
    pub fn get_mut(&mut self, kind: SensorKind) -> &mut dyn SensorDriver {
        match kind {
            SensorKind::Accelerometer => self.accelerometer.as_mut(),
            SensorKind::Gyroscope => self.gyroscope.as_mut(),
            SensorKind::HeartRate => self.heart_rate.as_mut(),
            SensorKind::Battery => self.battery.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_follows_frequency() {
        let acc = SensorOptions::for_kind(SensorKind::Accelerometer, 25.0);
        assert_eq!(acc.batch, 25);
        let hr = SensorOptions::for_kind(SensorKind::HeartRate, 1.0);
        assert_eq!(hr.batch, 1);
        let slow = SensorOptions::for_kind(SensorKind::Gyroscope, 0.2);
        assert_eq!(slow.batch, 1);
    }
}
