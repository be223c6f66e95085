//! Sensores sintéticos para rodar o dispositivo fora do relógio.
//!
//! - Acelerômetro: passada de caminhada (~1.8 Hz) sobre a gravidade em Y
//! - Giroscópio: rotação lenta do pulso
//! - Frequência cardíaca: 70 bpm com deriva senoidal
//! - Bateria: descarga linear a partir de 100%
//!
//! Cada driver respeita o contrato de [`SensorDriver`]: só entrega quando
//! ligado e com listener, uma janela por período.

use crate::listener::{ListenerToken, Listeners};
use crate::sensors::{SensorDriver, SensorOptions, SensorSnapshot};
use std::f32::consts::TAU;
use std::time::{Duration, Instant};
use tracing::debug;
use wearlink_core::{Clock, SensorKind, SystemClock};

/// Descarga por leitura de bateria (%).
const BATTERY_DRAIN_PER_READING: f32 = 0.05;

pub struct SimulatedSensor {
    kind: SensorKind,
    options: SensorOptions,
    running: bool,
    listeners: Listeners,
    next_due: Option<Instant>,
    /// Epoch (ms) da primeira amostra após o start
    epoch_start: u64,
    sample_index: u64,
    battery: f32,
}

impl SimulatedSensor {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            options: SensorOptions::for_kind(kind, 1.0),
            running: false,
            listeners: Listeners::new(),
            next_due: None,
            epoch_start: 0,
            sample_index: 0,
            battery: 100.0,
        }
    }

    /// Intervalo entre callbacks.
    fn period(&self) -> Duration {
        Duration::from_secs_f64(self.options.batch as f64 / self.options.frequency.max(0.001))
    }

    fn sample_time_ms(&self, index: u64) -> u64 {
        self.epoch_start + (index as f64 * 1_000.0 / self.options.frequency.max(0.001)) as u64
    }

    fn seconds(&self, index: u64) -> f32 {
        (index as f64 / self.options.frequency.max(0.001)) as f32
    }

    fn next_window(&mut self) -> SensorSnapshot {
        let n = self.options.batch;
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        let mut z = Vec::with_capacity(n);
        let mut timestamps = Vec::with_capacity(n);

        for _ in 0..n {
            let i = self.sample_index;
            let t = self.seconds(i);
            let (sx, sy, sz) = match self.kind {
                SensorKind::Accelerometer => (
                    1.5 * (TAU * 1.8 * t).sin(),
                    9.81 + 0.6 * (TAU * 3.6 * t).cos(),
                    0.4 * (TAU * 0.9 * t).sin(),
                ),
                _ => (
                    0.3 * (TAU * 0.25 * t).sin(),
                    0.1 * (TAU * 0.5 * t).cos(),
                    0.05 * (TAU * 1.8 * t).sin(),
                ),
            };
            x.push(sx);
            y.push(sy);
            z.push(sz);
            timestamps.push(self.sample_time_ms(i));
            self.sample_index += 1;
        }

        SensorSnapshot::Batch {
            x,
            y,
            z,
            timestamps,
        }
    }

    fn next_scalar(&mut self) -> SensorSnapshot {
        let i = self.sample_index;
        let value = match self.kind {
            SensorKind::HeartRate => (70.0 + 8.0 * (self.seconds(i) / 30.0).sin()).round(),
            _ => {
                self.battery = (self.battery - BATTERY_DRAIN_PER_READING).max(0.0);
                self.battery.round()
            }
        };
        self.sample_index += 1;
        SensorSnapshot::Scalar {
            value,
            timestamp: self.sample_time_ms(i),
        }
    }
}

impl SensorDriver for SimulatedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn set_options(&mut self, options: SensorOptions) {
        self.options = options;
    }

    fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.sample_index = 0;
        self.epoch_start = SystemClock.now_ms();
        self.next_due = Some(Instant::now() + self.period());
        debug!("{} ligado ({:.1} Hz)", self.kind, self.options.frequency);
    }

    fn stop(&mut self) {
        self.running = false;
        self.next_due = None;
        debug!("{} desligado", self.kind);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn subscribe(&mut self) -> ListenerToken {
        self.listeners.subscribe()
    }

    fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.listeners.unsubscribe(token)
    }

    fn poll_reading(&mut self, now: Instant) -> Option<SensorSnapshot> {
        if !self.running || !self.listeners.has_listeners() {
            return None;
        }
        let due = self.next_due?;
        if now < due {
            return None;
        }
        self.next_due = Some(due + self.period());

        Some(if self.kind.is_batch() {
            self.next_window()
        } else {
            self.next_scalar()
        })
    }
}
