use std::collections::HashMap;

use analysis::ConnectionId;

use crate::connection::ConnectionEvent;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

/// Control-channel senders for every live connection, keyed by id. Sends
/// never block the hub loop; a connection that cannot take a control event
/// is reported back to the caller as dead.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Returns false when the connection is unknown, gone or saturated.
    pub fn send(&mut self, to: &ConnectionId, message: ConnectionEvent) -> bool {
        if let Some(tx) = self.connection_txs.get_mut(to) {
            match tx.try_send(message) {
                Ok(()) => true,
                Err(err) => {
                    log::debug!("control send to connection {} failed: {}", to, err);
                    false
                }
            }
        } else {
            log::debug!("control send to unknown connection {}", to);
            false
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sending_to_an_unknown_or_removed_connection_reports_dead() {
        let mut storage = ConnectionTxStorage::new();
        assert!(!storage.send(&7, ConnectionEvent::SessionEnded));

        let (tx, rx) = tokio::sync::mpsc::channel(2);
        storage.insert(7, tx);
        assert!(storage.send(&7, ConnectionEvent::SessionEnded));

        drop(rx);
        assert!(!storage.send(&7, ConnectionEvent::SessionEnded));

        assert!(storage.remove(&7).is_some());
        assert!(storage.remove(&7).is_none());
    }
}
