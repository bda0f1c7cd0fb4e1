//! Insertion-ordered session collection with a single active key.

use crate::session::{Session, SessionKey};

#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<Session>,
    active: Option<SessionKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.entries.iter().find(|s| &s.key == key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        self.entries.iter_mut().find(|s| &s.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.entries.iter_mut()
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        self.entries.iter().map(|s| s.key.clone()).collect()
    }

    pub fn first_key(&self) -> Option<SessionKey> {
        self.entries.first().map(|s| s.key.clone())
    }

    /// Add a session. The caller guarantees the key is not present yet.
    pub fn insert(&mut self, session: Session) {
        debug_assert!(!self.contains(&session.key), "duplicate session key");
        self.entries.push(session);
    }

    /// Remove a session, clearing the active key if it pointed at it.
    /// Returns the session and whether it was active.
    pub fn remove(&mut self, key: &SessionKey) -> Option<(Session, bool)> {
        let index = self.entries.iter().position(|s| &s.key == key)?;
        let session = self.entries.remove(index);
        let was_active = self.active.as_ref() == Some(key);
        if was_active {
            self.active = None;
        }
        Some((session, was_active))
    }

    /// Empty the registry, returning every session in insertion order.
    pub fn drain(&mut self) -> Vec<Session> {
        self.active = None;
        std::mem::take(&mut self.entries)
    }

    pub fn active(&self) -> Option<&SessionKey> {
        self.active.as_ref()
    }

    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.active.as_ref() == Some(key)
    }

    /// Point the active key at an existing session. Unknown keys are refused.
    pub fn set_active(&mut self, key: &SessionKey) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.active = Some(key.clone());
        true
    }
}
