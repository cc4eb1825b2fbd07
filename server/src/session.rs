use std::sync::Arc;

use analysis::{AnalysisConfig, ConnectionId, ProctoringMonitor, SessionState};

use crate::connection::UpdateTx;
use crate::ingest::FrameTx;

pub struct Subscriber {
    pub connection_id: ConnectionId,
    pub update_tx: UpdateTx,
    pub joined_at: f64,
}

/// One live session as the hub owns it: the analysis state, its proctoring
/// monitor, the producer connection and the observer fan-out list.
pub struct Session {
    pub state: SessionState,
    pub monitor: ProctoringMonitor,
    pub subscribers: Vec<Subscriber>,
    pub producer: Option<ConnectionId>,
    /// Mailbox into the session's ingest worker. Dropping it stops the
    /// worker.
    pub frame_tx: Option<FrameTx>,
}

impl Session {
    pub fn new(now: f64, config: &AnalysisConfig) -> Self {
        Self {
            state: SessionState::new(now, config.timeline_capacity),
            monitor: ProctoringMonitor::new(config.proctor),
            subscribers: Vec::new(),
            producer: None,
            frame_tx: None,
        }
    }

    pub fn subscribe(&mut self, connection_id: ConnectionId, update_tx: UpdateTx, joined_at: f64) {
        self.subscribers.push(Subscriber {
            connection_id,
            update_tx,
            joined_at,
        });
    }

    /// Idempotent: removing an observer that is not subscribed is a no-op.
    pub fn unsubscribe(&mut self, connection_id: ConnectionId) -> Option<Subscriber> {
        let position = self
            .subscribers
            .iter()
            .position(|s| s.connection_id == connection_id)?;
        Some(self.subscribers.remove(position))
    }

    /// Hands the serialized update to every subscriber's slot, pruning the
    /// ones whose receiving side is gone. Each slot holds only the newest
    /// update, so a slow observer goes stale instead of stalling anyone.
    pub fn publish(&mut self, update: Arc<String>) {
        self.subscribers.retain(|subscriber| {
            match subscriber.update_tx.broadcast(Some(update.clone())) {
                Ok(()) => true,
                Err(_) => {
                    log::info!(
                        "dropping observer {} after failed delivery",
                        subscriber.connection_id
                    );
                    false
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::update_slot;

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut session = Session::new(0.0, &AnalysisConfig::default());
        let (update_tx, _update_rx) = update_slot();
        session.subscribe(1, update_tx, 0.0);

        assert!(session.unsubscribe(1).is_some());
        assert!(session.unsubscribe(1).is_none());
        assert!(session.unsubscribe(99).is_none());
    }

    #[test]
    fn publish_delivers_the_newest_update_and_prunes_dead_observers() {
        let mut session = Session::new(0.0, &AnalysisConfig::default());
        let (live_tx, live_rx) = update_slot();
        let (dead_tx, dead_rx) = update_slot();
        session.subscribe(1, live_tx, 0.0);
        session.subscribe(2, dead_tx, 0.0);
        drop(dead_rx);

        session.publish(Arc::new("{\"a\":1}".to_string()));
        session.publish(Arc::new("{\"a\":2}".to_string()));

        assert_eq!(session.subscribers.len(), 1);
        let latest = live_rx.borrow().clone().expect("update delivered");
        assert_eq!(*latest, "{\"a\":2}");
    }
}
