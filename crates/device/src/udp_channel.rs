//! Canal duplex sobre UDP conectado ao companion.
//!
//! O socket fica em modo não-bloqueante. Um erro de envio (ex.: porta
//! inalcançável) fecha o canal; após `reconnect_interval` ele volta a
//! `Open` e o gate tenta de novo.

use crate::gate::{DuplexChannel, ReadyState};
use crate::listener::{ListenerToken, Listeners};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct UdpChannel {
    sock: UdpSocket,
    state: ReadyState,
    closed_at: Option<Instant>,
    reconnect_interval: Duration,
    listeners: Listeners,
    buf: Vec<u8>,
}

impl UdpChannel {
    /// Faz bind em `bind_ip` (vazio = todas as interfaces) e conecta ao companion.
    pub fn connect(
        bind_ip: &str,
        companion_addr: &str,
        reconnect_interval: Duration,
    ) -> std::io::Result<Self> {
        let bind = if bind_ip.is_empty() {
            "0.0.0.0:0".to_string()
        } else {
            format!("{bind_ip}:0")
        };
        let sock = UdpSocket::bind(bind)?;
        sock.connect(companion_addr)?;
        sock.set_nonblocking(true)?;
        info!("Canal UDP {} → {companion_addr}", sock.local_addr()?);

        Ok(Self {
            sock,
            state: ReadyState::Open,
            closed_at: None,
            reconnect_interval,
            listeners: Listeners::new(),
            buf: vec![0u8; 65536],
        })
    }

    /// Reabre o canal se o intervalo de espera já passou.
    pub fn maintain(&mut self, now: Instant) {
        if let Some(closed_at) = self.closed_at {
            if now.duration_since(closed_at) >= self.reconnect_interval {
                info!("Reabrindo canal UDP");
                self.closed_at = None;
                self.state = ReadyState::Open;
            }
        }
    }

    fn close(&mut self) {
        if self.state != ReadyState::Closed {
            self.state = ReadyState::Closed;
            self.closed_at = Some(Instant::now());
        }
    }
}

impl DuplexChannel for UdpChannel {
    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self.sock.send(data) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(e),
            Err(e) => {
                warn!("Canal UDP fechado: {e}");
                self.close();
                Err(e)
            }
        }
    }

    fn poll_message(&mut self) -> Option<Vec<u8>> {
        match self.sock.recv(&mut self.buf) {
            Ok(size) => Some(self.buf[..size].to_vec()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                // Linux reporta ICMP port unreachable no recv seguinte
                warn!("Erro ao receber UDP: {e}");
                self.close();
                None
            }
        }
    }

    fn subscribe(&mut self) -> ListenerToken {
        self.listeners.subscribe()
    }

    fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.listeners.unsubscribe(token)
    }

    fn has_listeners(&self) -> bool {
        self.listeners.has_listeners()
    }
}
