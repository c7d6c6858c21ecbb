use crate::Session;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Session storage keyed by session code. Writes after the first go through
/// `compare_and_swap` so concurrent writers cannot silently overwrite each other.
pub trait SessionStore: Send + Sync {
    fn get(&self, code: &str) -> Option<Session>;

    /// Inserts a new session. Returns false if the code is taken.
    fn put(&self, session: Session) -> bool;

    /// Replaces the stored session if its version still equals
    /// `expected_version`; the stored copy gets `expected_version + 1`.
    fn compare_and_swap(&self, code: &str, expected_version: u64, session: Session) -> Option<Session>;

    fn remove(&self, code: &str) -> Option<Session>;

    fn codes(&self) -> Vec<String>;

    fn all(&self) -> Vec<Session>;
}

/// Single-process store behind an `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, code: &str) -> Option<Session> {
        self.read().get(code).cloned()
    }

    fn put(&self, session: Session) -> bool {
        let mut sessions = self.write();
        if sessions.contains_key(&session.session_code) {
            return false;
        }
        sessions.insert(session.session_code.clone(), session);
        true
    }

    fn compare_and_swap(&self, code: &str, expected_version: u64, mut session: Session) -> Option<Session> {
        let mut sessions = self.write();
        let current = sessions.get_mut(code)?;
        if current.version != expected_version {
            return None;
        }
        session.version = expected_version + 1;
        *current = session.clone();
        Some(session)
    }

    fn remove(&self, code: &str) -> Option<Session> {
        self.write().remove(code)
    }

    fn codes(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn all(&self) -> Vec<Session> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(code: &str) -> Session {
        Session::new(code, "host", "Host", Utc::now())
    }

    #[test]
    fn put_refuses_taken_codes() {
        let store = MemoryStore::new();
        assert!(store.put(session("ABCDE")));
        assert!(!store.put(session("ABCDE")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.codes(), vec!["ABCDE".to_string()]);
    }

    #[test]
    fn stale_version_loses_the_swap() {
        let store = MemoryStore::new();
        store.put(session("ABCDE"));
        let first = store.get("ABCDE").unwrap();
        let second = first.clone();

        let written = store.compare_and_swap("ABCDE", first.version, first).unwrap();
        assert_eq!(written.version, 1);
        assert!(store.compare_and_swap("ABCDE", second.version, second).is_none());
        assert_eq!(store.get("ABCDE").unwrap().version, 1);
        assert!(store.compare_and_swap("ZZZZZ", 0, session("ZZZZZ")).is_none());
    }

    #[test]
    fn clones_share_sessions() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.put(session("QWERT"));
        assert!(handle.get("QWERT").is_some());
        assert!(handle.remove("QWERT").is_some());
        assert!(store.is_empty());
    }
}
