//! Registry of live sessions, shared by every connection

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tracing::{debug, info};

use super::session::Session;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session {0} is already registered")]
    DuplicateId(String),
    #[error("Server at capacity ({0} sessions)")]
    AtCapacity(usize),
}

/// Process-wide map of live sessions keyed by session id.
///
/// `max_sessions` is a soft limit: concurrent registrations racing for the
/// last slot may briefly overshoot it.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
        }
    }

    pub fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        if let Some(max) = self.max_sessions {
            if self.sessions.len() >= max {
                return Err(RegistryError::AtCapacity(max));
            }
        }

        match self.sessions.entry(session.id().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(session_id = %session.id(), "Session registered");
                entry.insert(session);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Remove a session; absent ids are ignored
    pub fn deregister(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Session deregistered");
        }
    }

    /// Remove `session` only if it is the instance registered under its id
    pub(crate) fn remove_session(&self, session: &Session) {
        let removed = self
            .sessions
            .remove_if(session.id(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), session)
            });
        if removed.is_some() {
            debug!(session_id = %session.id(), "Session deregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_at_capacity(&self) -> bool {
        self.max_sessions
            .is_some_and(|max| self.sessions.len() >= max)
    }

    /// Close every live session
    pub fn close_all(&self) {
        // Collect first; Session::close re-enters the map to deregister.
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if !sessions.is_empty() {
            info!("Closing {} active sessions", sessions.len());
        }
        for session in sessions {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationConfig, ModelConfig, SynthesisConfig};
    use crate::core::tts::load_speech_model;
    use crate::core::worker::SynthesisWorker;
    use crate::handlers::stream::messages::MessageRoute;
    use tokio::sync::mpsc;

    fn worker() -> SynthesisWorker {
        let model = load_speech_model(&ModelConfig::default()).unwrap();
        SynthesisWorker::new(model, &SynthesisConfig::default())
    }

    fn session(
        registry: &Arc<SessionRegistry>,
        id: &str,
    ) -> (Arc<Session>, mpsc::Receiver<MessageRoute>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::new(
            id.to_string(),
            tx,
            worker(),
            GenerationConfig::default(),
            registry,
        );
        (session, rx)
    }

    #[tokio::test]
    async fn test_register_lookup_deregister() {
        let registry = Arc::new(SessionRegistry::new(None));
        let (s, _rx) = session(&registry, "a");

        registry.register(s.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("a").unwrap().id(), "a");
        assert!(registry.lookup("b").is_none());

        registry.deregister("a");
        registry.deregister("a");
        registry.deregister("never-existed");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = Arc::new(SessionRegistry::new(None));
        let (first, _rx1) = session(&registry, "dup");
        let (second, _rx2) = session(&registry, "dup");

        registry.register(first).unwrap();
        assert_eq!(
            registry.register(second),
            Err(RegistryError::DuplicateId("dup".to_string()))
        );
    }

    #[tokio::test]
    async fn test_capacity() {
        let registry = Arc::new(SessionRegistry::new(Some(1)));
        let (a, _rx1) = session(&registry, "a");
        let (b, _rx2) = session(&registry, "b");

        assert!(!registry.is_at_capacity());
        registry.register(a).unwrap();
        assert!(registry.is_at_capacity());
        assert_eq!(registry.register(b), Err(RegistryError::AtCapacity(1)));
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let registry = Arc::new(SessionRegistry::new(None));
        let mut receivers = Vec::new();
        for i in 0..5 {
            let (s, rx) = session(&registry, &format!("s{i}"));
            registry.register(s).unwrap();
            receivers.push(rx);
        }

        registry.close_all();

        assert!(registry.is_empty());
        for mut rx in receivers {
            assert!(matches!(rx.recv().await, Some(MessageRoute::Close)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_deregister() {
        let registry = Arc::new(SessionRegistry::new(None));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (s, _rx) = session(&registry, &format!("s{i}"));
                    registry.register(s).unwrap();
                    assert!(registry.lookup(&format!("s{i}")).is_some());
                    if i % 2 == 0 {
                        registry.deregister(&format!("s{i}"));
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len(), 16);
        let mut ids = registry.session_ids();
        ids.sort();
        assert!(ids.iter().all(|id| {
            let n: usize = id[1..].parse().unwrap();
            n % 2 == 1
        }));
    }
}
