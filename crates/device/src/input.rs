//! Thread de entrada do usuário: lê stdin e envia comandos para o loop
//! de eventos via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::io::BufRead;
use tracing::{debug, warn};

/// Ação do usuário.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    /// Botão de sessão (Enter)
    Toggle,
    /// Tecla voltar
    Back,
    Quit,
}

impl UserInput {
    /// Interpreta uma linha digitada.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "t" | "toggle" => Some(UserInput::Toggle),
            "b" | "back" => Some(UserInput::Back),
            "q" | "quit" | "exit" => Some(UserInput::Quit),
            _ => None,
        }
    }
}

/// Inicia a thread de entrada. Retorna o receiver do channel.
pub fn spawn_input_thread() -> std::io::Result<Receiver<UserInput>> {
    let (tx, rx) = bounded::<UserInput>(16);

    std::thread::Builder::new()
        .name("stdin-input".into())
        .spawn(move || input_loop(&tx))?;

    Ok(rx)
}

fn input_loop(tx: &Sender<UserInput>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Erro ao ler stdin: {e}");
                break;
            }
        };
        match UserInput::parse(&line) {
            Some(input) => {
                if tx.send(input).is_err() {
                    return;
                }
            }
            None => debug!("Entrada ignorada: {line:?}"),
        }
    }
    // Sem stdin (ex.: rodando em background) o loop segue sem entrada
    debug!("stdin encerrado");
}
