//! # Wearlink Companion
//!
//! Recebe os comandos de sessão do dispositivo via UDP, acompanha cada
//! sessão e confere a contagem de leituras no encerramento.

mod net_thread;
mod tracker;

use crossbeam_channel::RecvTimeoutError;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracker::SessionTracker;
use wearlink_core::config::AppConfig;

/// Intervalo de verificação de sessões silenciosas.
const EXPIRE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        let _ = config.save(&config_path);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        return Err(format!("{} erro(s) de configuração", errors.len()).into());
    }

    let companion_cfg = config.companion;
    let peer_timeout = Duration::try_from_secs_f64(companion_cfg.peer_timeout_secs)?;

    let rx = net_thread::spawn_receiver_thread(companion_cfg.port, companion_cfg.peer_ip.clone())?;
    let mut tracker = SessionTracker::new();
    let mut last_expire_check = Instant::now();

    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 WEARLINK COMPANION – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Porta:     {}", companion_cfg.port);
    println!("  Timeout:   {:.0}s", peer_timeout.as_secs_f64());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        match rx.recv_timeout(EXPIRE_CHECK_INTERVAL) {
            Ok(msg) => {
                debug!(
                    "← {} ({} bytes) de {}",
                    msg.command.name(),
                    msg.raw_size,
                    msg.source_addr
                );
                if let Some(summary) = tracker.apply(msg.command, Instant::now()) {
                    let duration = match summary.duration_ms {
                        Some(ms) => format!("{:.1}s", ms as f64 / 1000.0),
                        None => "duração desconhecida".to_owned(),
                    };
                    info!(
                        "Sessão {} encerrada – {}/{} amostras, {duration}",
                        summary.session_id, summary.received, summary.reported
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Thread de rede encerrada");
                break;
            }
        }

        let now = Instant::now();
        if now.duration_since(last_expire_check) >= EXPIRE_CHECK_INTERVAL {
            last_expire_check = now;
            tracker.expire(now, peer_timeout);
        }
    }

    info!(
        "Companion encerrado: {} sessões abertas, {} leituras órfãs",
        tracker.open_sessions(),
        tracker.orphan_readings()
    );
    Ok(())
}
