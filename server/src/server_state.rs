use std::collections::HashMap;
use std::num::Wrapping;

use analysis::{AnalysisConfig, ConnectionId, SessionDescription, SessionId};

use crate::connection::UpdateTx;
use crate::session::Session;

/// The registry of live sessions and connection locations. Only the hub
/// task touches it, which is what keeps every session single-writer.
pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    max_sessions: usize,
    pub connection_locations: HashMap<ConnectionId, SessionId>,
    pub sessions: HashMap<SessionId, Session>,
}

#[derive(Debug, PartialEq)]
pub enum RegistryError {
    ProducerAlreadyAttached,
    /// The registry is full; no new session can be allocated.
    AtCapacity,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RegistryError::ProducerAlreadyAttached => {
                write!(f, "another student is already connected to this session")
            }
            RegistryError::AtCapacity => {
                write!(f, "the server cannot take another exam session right now")
            }
        }
    }
}

impl ServerState {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            max_sessions: max_sessions.max(1),
            connection_locations: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }

    /// Creation is idempotent: the first contact for an unknown id creates
    /// the session, later contacts return the existing one. Allocation past
    /// the registry capacity is the one fault surfaced to the caller.
    pub fn ensure_session(
        &mut self,
        session_id: &SessionId,
        now: f64,
        config: &AnalysisConfig,
    ) -> Result<&mut Session, RegistryError> {
        if !self.sessions.contains_key(session_id) {
            if self.sessions.len() >= self.max_sessions {
                return Err(RegistryError::AtCapacity);
            }
            log::info!("creating session {}", session_id);
            self.sessions
                .insert(session_id.clone(), Session::new(now, config));
        }
        Ok(self.sessions.get_mut(session_id).expect("just ensured"))
    }

    pub fn attach_producer(
        &mut self,
        session_id: &SessionId,
        now: f64,
        config: &AnalysisConfig,
    ) -> Result<ConnectionId, RegistryError> {
        let occupied = self
            .sessions
            .get(session_id)
            .map(|s| s.producer.is_some())
            .unwrap_or(false);
        if occupied {
            return Err(RegistryError::ProducerAlreadyAttached);
        }
        self.ensure_session(session_id, now, config)?;
        let connection_id = self.new_connection_id();
        let session = self.sessions.get_mut(session_id).expect("just ensured");
        session.producer = Some(connection_id);
        self.connection_locations
            .insert(connection_id, session_id.clone());
        Ok(connection_id)
    }

    pub fn attach_observer(
        &mut self,
        session_id: &SessionId,
        update_tx: UpdateTx,
        now: f64,
        config: &AnalysisConfig,
    ) -> Result<ConnectionId, RegistryError> {
        self.ensure_session(session_id, now, config)?;
        let connection_id = self.new_connection_id();
        let session = self.sessions.get_mut(session_id).expect("just ensured");
        session.subscribe(connection_id, update_tx, now);
        self.connection_locations
            .insert(connection_id, session_id.clone());
        Ok(connection_id)
    }

    /// Detaches one connection. Returns the session id and whether the
    /// departed connection was the session's producer. Unknown connections
    /// are a no-op.
    pub fn detach(&mut self, connection_id: ConnectionId, now: f64) -> Option<(SessionId, bool)> {
        let session_id = self.connection_locations.remove(&connection_id)?;
        let session = self.sessions.get_mut(&session_id)?;
        if session.producer == Some(connection_id) {
            session.producer = None;
            Some((session_id, true))
        } else {
            if let Some(subscriber) = session.unsubscribe(connection_id) {
                log::info!(
                    "observer {} left session {} after {:.0}s",
                    connection_id,
                    session_id,
                    (now - subscriber.joined_at).max(0.0)
                );
            }
            Some((session_id, false))
        }
    }

    /// Removes the session and every location entry pointing at it.
    /// Removing an already removed session is a no-op.
    pub fn remove_session(&mut self, session_id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        if let Some(producer) = session.producer {
            self.connection_locations.remove(&producer);
        }
        for subscriber in &session.subscribers {
            self.connection_locations.remove(&subscriber.connection_id);
        }
        Some(session)
    }

    pub fn idle_session_ids(&self, now: f64, max_idle_seconds: f64) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, session)| now - session.state.last_activity_at() > max_idle_seconds)
            .map(|(session_id, _)| session_id.clone())
            .collect()
    }

    pub fn descriptions(&self) -> Vec<SessionDescription> {
        self.sessions
            .iter()
            .map(|(session_id, session)| SessionDescription {
                session_id: session_id.clone(),
                status: session.state.status(),
                alert: session.state.alert().map(str::to_string),
                observer_count: session.subscribers.len(),
                last_score: session.state.last_score(),
                created_at: session.state.created_at(),
                last_activity_at: session.state.last_activity_at(),
            })
            .collect()
    }
}
