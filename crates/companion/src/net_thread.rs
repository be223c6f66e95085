//! Thread de rede que escuta UDP e envia comandos decodificados para o
//! loop principal via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use wearlink_core::protocol::{Command, decode_command};

/// Mensagem enviada da thread de rede para o loop principal.
#[derive(Debug, Clone)]
pub struct NetMessage {
    pub command: Command,
    pub source_addr: SocketAddr,
    pub raw_size: usize,
}

/// Inicia a thread de rede. Retorna o receiver do channel.
pub fn spawn_receiver_thread(
    port: u16,
    peer_ip_filter: String,
) -> std::io::Result<Receiver<NetMessage>> {
    let (tx, rx) = bounded::<NetMessage>(256);

    std::thread::Builder::new()
        .name("udp-receiver".into())
        .spawn(move || {
            receiver_loop(&tx, port, &peer_ip_filter);
        })?;

    Ok(rx)
}

fn receiver_loop(tx: &Sender<NetMessage>, port: u16, peer_ip_filter: &str) {
    loop {
        match UdpSocket::bind(format!("0.0.0.0:{port}")) {
            Ok(sock) => {
                sock.set_read_timeout(Some(Duration::from_secs(1))).ok();

                let mode = if peer_ip_filter.is_empty() {
                    "qualquer origem"
                } else {
                    peer_ip_filter
                };
                info!("Companion escutando em 0.0.0.0:{port} – Dispositivo: {mode}");

                if !serve(&sock, tx, peer_ip_filter) {
                    return;
                }
            }
            Err(e) => {
                error!("Falha ao bind porta {port}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}

/// Recebe até o loop principal fechar o channel. Retorna `false` nesse caso.
fn serve(sock: &UdpSocket, tx: &Sender<NetMessage>, peer_ip_filter: &str) -> bool {
    let mut buf = [0u8; 65536];
    loop {
        match sock.recv_from(&mut buf) {
            Ok((size, addr)) => {
                let source = addr.ip().to_string();

                // Filtro de IP se configurado
                if !peer_ip_filter.is_empty() && source != peer_ip_filter {
                    debug!("Ignorando pacote de {source} (esperado: {peer_ip_filter})");
                    continue;
                }

                match decode_command(&buf[..size]) {
                    Ok(command) => {
                        let msg = NetMessage {
                            command,
                            source_addr: addr,
                            raw_size: size,
                        };
                        // Non-blocking send: se o loop está lento, descarta
                        match tx.try_send(msg) {
                            Ok(()) => {}
                            Err(crossbeam_channel::TrySendError::Full(_)) => {
                                debug!("Channel cheio, descartando pacote");
                            }
                            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                                return false;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Pacote inválido de {source}: {e}");
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                // Timeout normal, continua
            }
            Err(e) => {
                warn!("Erro ao receber UDP: {e}");
            }
        }
    }
}
