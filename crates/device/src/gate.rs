//! Canal duplex com o companion e o gate que controla os envios.
//!
//! Só o [`ChannelGate`] lê o estado do canal. Enquanto o canal não estiver
//! `Open`, `try_send` descarta a mensagem em silêncio: a perda de dados
//! desconectado é aceita pelo produto.

use crate::listener::ListenerToken;
use tracing::{debug, warn};
use wearlink_core::protocol::MAX_MESSAGE_SIZE;

/// Estado do canal. Apenas `Open` permite envio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Conexão ponto-a-ponto com o companion.
pub trait DuplexChannel {
    fn ready_state(&self) -> ReadyState;

    fn send(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Próxima mensagem recebida, sem bloquear.
    fn poll_message(&mut self) -> Option<Vec<u8>>;

    fn subscribe(&mut self) -> ListenerToken;

    fn unsubscribe(&mut self, token: ListenerToken) -> bool;

    fn has_listeners(&self) -> bool;
}

/// Gate de envio sobre um [`DuplexChannel`].
pub struct ChannelGate<C: DuplexChannel> {
    channel: C,
    sent: u64,
    dropped: u64,
}

impl<C: DuplexChannel> ChannelGate<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.channel.ready_state() == ReadyState::Open
    }

    pub fn state(&self) -> ReadyState {
        self.channel.ready_state()
    }

    /// Envia se o canal estiver pronto. Nunca bloqueia nem propaga erro.
    pub fn try_send(&mut self, data: &[u8]) -> bool {
        if !self.is_ready() {
            self.dropped += 1;
            debug!("Canal não está pronto, descartando {} bytes", data.len());
            return false;
        }
        if data.len() > MAX_MESSAGE_SIZE {
            self.dropped += 1;
            warn!("Mensagem de {} bytes excede o limite, descartando", data.len());
            return false;
        }

        match self.channel.send(data) {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                self.dropped += 1;
                warn!("Falha ao enviar pelo canal: {e}");
                false
            }
        }
    }

    pub fn listen(&mut self) -> ListenerToken {
        self.channel.subscribe()
    }

    pub fn unlisten(&mut self, token: ListenerToken) -> bool {
        self.channel.unsubscribe(token)
    }

    /// Próxima mensagem recebida. Sem listener inscrito nada é entregue.
    pub fn next_message(&mut self) -> Option<Vec<u8>> {
        if !self.channel.has_listeners() {
            return None;
        }
        self.channel.poll_message()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
