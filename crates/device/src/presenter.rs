//! Camada de apresentação vista pelo controller.
//!
//! O controller só notifica; renderização fica fora do dispositivo.

use tracing::{info, warn};

/// Notificações enviadas pelo controller para a tela.
pub trait Presenter {
    /// Canal ficou pronto ou deixou de estar.
    fn connection_changed(&mut self, connected: bool);

    /// O companion enviou `DISCONNECT`.
    fn connection_lost(&mut self);

    fn recording_changed(&mut self, recording: bool);

    /// Voltar foi recusado porque a sessão ainda está gravando.
    fn back_refused(&mut self);

    /// Fim da sessão: entrega a contagem para a tela de resumo.
    fn session_summary(&mut self, readings_count: u64);
}

/// Presenter que apenas registra no log.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn connection_changed(&mut self, connected: bool) {
        if connected {
            info!("Conectado ao companion");
        } else {
            info!("Aguardando companion...");
        }
    }

    fn connection_lost(&mut self) {
        warn!("Conexão perdida: companion indisponível");
    }

    fn recording_changed(&mut self, recording: bool) {
        if recording {
            info!("Gravando... (Enter para encerrar)");
        } else {
            info!("Nova sessão (Enter para iniciar)");
        }
    }

    fn back_refused(&mut self) {
        warn!("Encerre a sessão antes de sair");
    }

    fn session_summary(&mut self, readings_count: u64) {
        info!("Resumo da sessão: {readings_count} leituras");
    }
}
