use std::sync::Arc;

use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::oneshot;

use analysis::{
    AnalysisConfig, Classification, ConnectionId, FrameAnalysis, SessionDescription, SessionId,
    SessionState,
};

use crate::config::ServerConfig;
use crate::connection::{ConnectionEvent, UpdateTx};
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::frame::RawFrame;
use crate::ingest::{frame_mailbox, spawn_ingest_worker, FrameJob};
use crate::provider::LandmarkProvider;
use crate::server_state::ServerState;

pub type ServerTx = Sender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    ConnectProducer {
        session_id: SessionId,
        tx: ConnectionTx,
    },
    ConnectObserver {
        session_id: SessionId,
        tx: ConnectionTx,
        update_tx: UpdateTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    FrameReceived {
        from: ConnectionId,
        frame: RawFrame,
    },
    FrameAnalyzed {
        session_id: SessionId,
        analysis: FrameAnalysis,
    },
    ListSessions {
        tx: oneshot::Sender<Vec<SessionDescription>>,
    },
}

pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// The hub: a single task owning the registry and every session's state.
/// Handlers never block, so one saturated connection cannot hold up the
/// loop; everything slow runs in the per-session ingest workers.
struct Server {
    state: ServerState,
    connections: ConnectionTxStorage,
    provider: Arc<dyn LandmarkProvider>,
    config: ServerConfig,
    analysis_config: AnalysisConfig,
    srv_tx: ServerTx,
}

impl Server {
    fn new(
        config: ServerConfig,
        analysis_config: AnalysisConfig,
        provider: Arc<dyn LandmarkProvider>,
        srv_tx: ServerTx,
    ) -> Self {
        Self {
            state: ServerState::new(config.max_sessions),
            connections: ConnectionTxStorage::new(),
            provider,
            config,
            analysis_config,
            srv_tx,
        }
    }

    fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::ConnectProducer { session_id, tx } => {
                self.connect_producer(session_id, tx)
            }
            ServerCommand::ConnectObserver {
                session_id,
                tx,
                update_tx,
            } => self.connect_observer(session_id, tx, update_tx),
            ServerCommand::Disconnect { from } => self.disconnect(from),
            ServerCommand::FrameReceived { from, frame } => self.frame_received(from, frame),
            ServerCommand::FrameAnalyzed {
                session_id,
                analysis,
            } => self.frame_analyzed(session_id, analysis),
            ServerCommand::ListSessions { tx } => {
                let _ = tx.send(self.state.descriptions());
            }
        }
    }

    fn connect_producer(&mut self, session_id: SessionId, mut tx: ConnectionTx) {
        let now = now_secs();
        match self
            .state
            .attach_producer(&session_id, now, &self.analysis_config)
        {
            Ok(connection_id) => {
                let session = self
                    .state
                    .sessions
                    .get_mut(&session_id)
                    .expect("session just ensured");
                if session.frame_tx.is_none() {
                    let (frame_tx, frame_rx) = frame_mailbox();
                    spawn_ingest_worker(
                        session_id.clone(),
                        frame_rx,
                        self.provider.clone(),
                        self.analysis_config.clone(),
                        self.config.provider_timeout,
                        self.srv_tx.clone(),
                    );
                    session.frame_tx = Some(frame_tx);
                }
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id });
                log::info!(
                    "student connected to session {} as connection {}",
                    session_id,
                    connection_id
                );
            }
            Err(err) => {
                log::warn!("rejecting producer for session {}: {}", session_id, err);
                let rejected = ConnectionEvent::Rejected {
                    reason: err.to_string(),
                };
                if tx.try_send(rejected).is_err() {
                    log::debug!("rejected producer already hung up");
                }
            }
        }
    }

    fn connect_observer(&mut self, session_id: SessionId, mut tx: ConnectionTx, update_tx: UpdateTx) {
        let now = now_secs();
        let connection_id = match self
            .state
            .attach_observer(&session_id, update_tx, now, &self.analysis_config)
        {
            Ok(connection_id) => connection_id,
            Err(err) => {
                log::warn!("rejecting observer for session {}: {}", session_id, err);
                let rejected = ConnectionEvent::Rejected {
                    reason: err.to_string(),
                };
                if tx.try_send(rejected).is_err() {
                    log::debug!("rejected observer already hung up");
                }
                return;
            }
        };
        self.connections.insert(connection_id, tx);
        self.connections
            .send(&connection_id, ConnectionEvent::Connected { connection_id });

        // Late joiners get the current snapshot right away instead of
        // waiting for the next frame.
        if let Some(session) = self.state.sessions.get_mut(&session_id) {
            if let Some(update) = serialize_update(&session.state, now) {
                let delivered = session
                    .subscribers
                    .iter()
                    .find(|s| s.connection_id == connection_id)
                    .map(|s| s.update_tx.broadcast(Some(update)).is_ok())
                    .unwrap_or(false);
                if !delivered {
                    session.unsubscribe(connection_id);
                }
            }
        }
        log::info!(
            "observer {} subscribed to session {}",
            connection_id,
            session_id
        );
    }

    fn disconnect(&mut self, from: ConnectionId) {
        self.connections.remove(&from);
        let now = now_secs();
        match self.state.detach(from, now) {
            Some((session_id, true)) => {
                log::info!("student disconnected from session {}", session_id);
                self.teardown_session(&session_id, "student disconnected");
            }
            Some((_, false)) => {}
            // Already detached; duplicate disconnects are no-ops.
            None => {}
        }
    }

    fn frame_received(&mut self, from: ConnectionId, frame: RawFrame) {
        let now = now_secs();
        let session_id = match self.state.connection_locations.get(&from) {
            Some(session_id) => session_id.clone(),
            None => {
                log::debug!("frame from unregistered connection {}", from);
                return;
            }
        };
        let session = match self.state.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return,
        };
        if session.producer != Some(from) {
            log::debug!("ignoring frame from non-producer connection {}", from);
            return;
        }
        session.state.touch(now);
        let job = Arc::new(FrameJob {
            raw: frame,
            arrived_at: now,
        });
        if let Some(frame_tx) = &session.frame_tx {
            if frame_tx.broadcast(Some(job)).is_err() {
                log::warn!("ingest worker for session {} is gone, dropping frame", session_id);
            }
        }
    }

    fn frame_analyzed(&mut self, session_id: SessionId, analysis: FrameAnalysis) {
        let now = now_secs();
        let session = match self.state.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => {
                // The session was torn down while this frame was in flight.
                log::debug!("analysis for removed session {}, ignoring", session_id);
                return;
            }
        };
        let alert = session
            .monitor
            .observe(analysis.face_count, analysis.gaze, analysis.timestamp);
        if let Some(alert) = &alert {
            if session.state.alert().is_none() {
                log::warn!("session {} violation: {}", session_id, alert);
            }
        }
        if analysis.classification == Some(Classification::Confused) {
            if let Some(score) = analysis.score {
                log::info!("session {} confused, score {:.2}", session_id, score);
            }
        }
        session.state.apply_frame(analysis, alert);
        if let Some(update) = serialize_update(&session.state, now) {
            session.publish(update);
        }
    }

    fn sweep(&mut self) {
        let now = now_secs();
        for session_id in self
            .state
            .idle_session_ids(now, self.config.idle_timeout_seconds)
        {
            self.teardown_session(&session_id, "idle timeout");
        }
    }

    /// Ends a session: notifies everyone attached, releases their control
    /// channels and drops the session, which also stops its ingest worker.
    /// Tearing down an unknown session is a no-op.
    fn teardown_session(&mut self, session_id: &SessionId, reason: &str) {
        let session = match self.state.remove_session(session_id) {
            Some(session) => session,
            None => return,
        };
        log::info!("closing session {} ({})", session_id, reason);
        for subscriber in &session.subscribers {
            self.connections
                .send(&subscriber.connection_id, ConnectionEvent::SessionEnded);
            self.connections.remove(&subscriber.connection_id);
        }
        if let Some(producer) = session.producer {
            self.connections.send(&producer, ConnectionEvent::SessionEnded);
            self.connections.remove(&producer);
        }
    }
}

fn serialize_update(state: &SessionState, now: f64) -> Option<Arc<String>> {
    match serde_json::to_string(&state.snapshot(now)) {
        Ok(json) => Some(Arc::new(json)),
        Err(err) => {
            log::error!("failed to serialize session update: {}", err);
            None
        }
    }
}

pub fn spawn_server(
    config: ServerConfig,
    analysis_config: AnalysisConfig,
    provider: Arc<dyn LandmarkProvider>,
) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(64);
    let loop_tx = srv_tx.clone();

    tokio::spawn(async move {
        let mut server = Server::new(config, analysis_config, provider, loop_tx);
        let mut sweep = tokio::time::interval(server.config.idle_sweep_period);

        loop {
            tokio::select! {
                command = srv_rx.recv() => match command {
                    Some(command) => server.handle_command(command),
                    None => break,
                },
                _ = sweep.tick() => server.sweep(),
            }
        }
        log::info!("server loop terminated");
    });

    srv_tx
}
