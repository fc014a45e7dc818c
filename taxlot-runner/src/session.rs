//! Session store: named ledgers kept alive between commands.
//!
//! Every caller passes its session id explicitly; there is no ambient
//! "current" ledger.

use std::collections::HashMap;
use taxlot_core::Ledger;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Ledger>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Ledger> {
        self.sessions.get(id)
    }

    /// Mutable access, creating an empty ledger for unknown ids.
    pub fn ledger_mut(&mut self, id: &str) -> &mut Ledger {
        self.sessions.entry(id.to_string()).or_default()
    }

    /// Replace a session's ledger, returning the previous one.
    pub fn insert(&mut self, id: impl Into<String>, ledger: Ledger) -> Option<Ledger> {
        self.sessions.insert(id.into(), ledger)
    }

    pub fn remove(&mut self, id: &str) -> Option<Ledger> {
        self.sessions.remove(id)
    }

    /// Run `f` against a session's ledger (created on demand).
    pub fn with_ledger<R>(&mut self, id: &str, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(self.ledger_mut(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(|k| k.as_str())
    }
}
