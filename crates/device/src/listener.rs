//! Tokens de inscrição para listeners de sensores e do canal.
//!
//! `subscribe` devolve um [`ListenerToken`]; o mesmo token é passado de
//! volta a `unsubscribe`. Remover um token já removido não faz nada.

/// Handle opaco de uma inscrição.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Registro de inscrições ativas de uma fonte de eventos.
#[derive(Debug, Default)]
pub struct Listeners {
    next_id: u64,
    active: Vec<u64>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> ListenerToken {
        self.next_id += 1;
        self.active.push(self.next_id);
        ListenerToken(self.next_id)
    }

    /// Retorna `false` se o token não estava ativo.
    pub fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        let before = self.active.len();
        self.active.retain(|&id| id != token.0);
        self.active.len() != before
    }

    pub fn has_listeners(&self) -> bool {
        !self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct() {
        let mut l = Listeners::new();
        let a = l.subscribe();
        let b = l.subscribe();
        assert_ne!(a, b);
        assert!(l.unsubscribe(a));
        assert!(l.has_listeners());
        assert!(l.unsubscribe(b));
        assert!(!l.has_listeners());
    }

    #[test]
    fn double_unsubscribe_is_noop() {
        let mut l = Listeners::new();
        let t = l.subscribe();
        assert!(l.unsubscribe(t));
        assert!(!l.unsubscribe(t));
        assert!(!l.has_listeners());
    }
}
