//! Live subscriber connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use basket_core::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One connected `WebSocket` subscriber.
///
/// The socket itself is owned by the session task; everything else talks to
/// it through the bounded outbound queue.
pub struct SubscriberConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Device id the client announced, used to skip echoes of its own actions.
    client_id: Option<String>,
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
    revoked: CancellationToken,
}

impl SubscriberConnection {
    /// Create a connection feeding `tx`.
    pub fn new(id: ConnectionId, client_id: Option<String>, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            client_id,
            tx,
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            revoked: CancellationToken::new(),
        }
    }

    /// Device id announced at subscribe time.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Queue a text frame for the client.
    ///
    /// Never blocks. Returns `false` (and counts a drop) when the queue is
    /// full or the session is gone.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record client activity (pong or any inbound frame).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the client was last heard from.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Tell the session its authorization is gone (the list was deleted).
    pub fn revoke(&self) {
        self.revoked.cancel();
    }

    /// Resolves once [`revoke`](Self::revoke) has been called.
    pub fn revoked(&self) -> WaitForCancellationFuture<'_> {
        self.revoked.cancelled()
    }
}

impl std::fmt::Debug for SubscriberConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberConnection")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (SubscriberConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = SubscriberConnection::new(ConnectionId::from("c1"), Some("device-1".into()), tx);
        (conn, rx)
    }

    #[tokio::test]
    async fn send_delivers_to_queue() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("one".into())));
        assert!(!conn.send(Arc::new("two".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_counts_drop() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send(Arc::new("gone".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn client_id_exposed() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.client_id(), Some("device-1"));
    }

    #[test]
    fn mark_alive_resets_idle() {
        let (conn, _rx) = make_connection(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.idle_for() >= Duration::from_millis(20));
        conn.mark_alive();
        assert!(conn.idle_for() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn revoke_wakes_waiter() {
        let (conn, _rx) = make_connection(1);
        let conn = Arc::new(conn);
        let waiter = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.revoked().await })
        };
        conn.revoke();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
