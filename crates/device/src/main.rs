//! # Wearlink Device
//!
//! Lado do wearable: grava sessões de sensores e transmite as leituras ao
//! companion. Fora do relógio roda com sensores simulados e canal UDP.
//!
//! ## Uso
//! ```bash
//! wearlink_device            # Enter inicia/encerra a sessão
//!                            # "back" volta, "quit" sai
//! ```

mod controller;
mod gate;
mod input;
mod listener;
mod presenter;
mod sensors;
mod simulated;
#[cfg(test)]
mod testing;
mod udp_channel;

use controller::{BackNavigation, Collaborators, Phase, SessionController};
use input::{UserInput, spawn_input_thread};
use presenter::LogPresenter;
use sensors::SensorSet;
use simulated::SimulatedSensor;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use udp_channel::UdpChannel;
use wearlink_core::config::AppConfig;
use wearlink_core::{SensorKind, SystemClock};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        return Err(format!("{} erro(s) de configuração", errors.len()).into());
    }

    let device_cfg = config.device.clone();
    let tick = Duration::from_millis(device_cfg.tick_ms);

    // ── Canal ──
    let channel = UdpChannel::connect(
        &device_cfg.bind_ip,
        &device_cfg.companion_addr,
        Duration::try_from_secs_f64(device_cfg.reconnect_interval_secs)?,
    )?;

    // ── Sensores ──
    let sensors = SensorSet {
        accelerometer: Box::new(SimulatedSensor::new(SensorKind::Accelerometer)),
        gyroscope: Box::new(SimulatedSensor::new(SensorKind::Gyroscope)),
        heart_rate: Box::new(SimulatedSensor::new(SensorKind::HeartRate)),
        battery: Box::new(SimulatedSensor::new(SensorKind::Battery)),
    };

    let mut controller = SessionController::new(
        channel,
        sensors,
        Collaborators {
            device: Box::new(config.device.clone()),
            preferences: Box::new(config.sensors.clone()),
            clock: Box::new(SystemClock),
            presenter: Box::new(LogPresenter),
        },
    );

    let input_rx = spawn_input_thread()?;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⌚ WEARLINK DEVICE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Modelo:     {}", device_cfg.model_name);
    println!("  Companion:  {}", device_cfg.companion_addr);
    println!("  Protocolo:  MessagePack {{command, payload}}");
    println!("══════════════════════════════════════════════");
    println!();

    controller.mount();

    // ── Loop de eventos ──
    'events: loop {
        let cycle_start = Instant::now();

        while let Ok(input) = input_rx.try_recv() {
            match input {
                UserInput::Toggle => {
                    if controller.user_toggle() == Phase::Ended {
                        // Resumo exibido; volta para uma sessão nova
                        controller.unmount();
                        controller.mount();
                    }
                }
                UserInput::Back => {
                    if controller.key_back() == BackNavigation::Allowed {
                        controller.unmount();
                        break 'events;
                    }
                }
                UserInput::Quit => {
                    if controller.is_running() {
                        if let Some(session) = controller.session() {
                            warn!(
                                "Saindo com a sessão {} em gravação ({} leituras)",
                                session.id(),
                                controller.event_count()
                            );
                        }
                    }
                    controller.unmount();
                    break 'events;
                }
            }
        }

        controller.gate_mut().channel_mut().maintain(cycle_start);
        controller.poll_channel();
        controller.poll_sensors(cycle_start);

        // Dormir pelo tempo restante do tick
        let elapsed = cycle_start.elapsed();
        if elapsed < tick {
            std::thread::sleep(tick - elapsed);
        }
    }

    let gate = controller.gate();
    info!(
        "Dispositivo encerrado: {} mensagens enviadas, {} descartadas",
        gate.sent(),
        gate.dropped()
    );
    Ok(())
}
