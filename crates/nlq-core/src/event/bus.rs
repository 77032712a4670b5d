//! Bus de eventos publish/subscribe in-process.
//!
//! Implementado sobre `tokio::sync::broadcast`: los productores nunca
//! bloquean y la entrega es best-effort (un suscriptor rezagado o
//! desconectado pierde los eventos publicados en el intervalo). Cada
//! suscriptor obtiene su propio `Receiver` reiniciable.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast;

use super::{EventKind, OrchestratorEvent};
use crate::constants::DEFAULT_EVENT_CAPACITY;

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, seq: AtomicU64::new(0) }
    }

    /// Publica un evento asignando `seq` monotónico y timestamp. Sin
    /// suscriptores el evento se descarta (best-effort por contrato).
    pub fn publish(&self, kind: EventKind) -> OrchestratorEvent {
        let ev = OrchestratorEvent { seq: self.seq.fetch_add(1, Ordering::Relaxed),
                                     kind,
                                     ts: Utc::now() };
        tracing::debug!(seq = ev.seq, kind = ?ev.kind, "event published");
        let _ = self.tx.send(ev.clone());
        ev
    }

    /// Nuevo suscriptor; recibe solo eventos publicados desde este punto.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_block() {
        let bus = EventBus::default();
        let ev = bus.publish(EventKind::GoalCancelled { goal_id: Uuid::new_v4() });
        assert_eq!(ev.seq, 0);
    }

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let a = Uuid::new_v4();
        bus.publish(EventKind::GoalCancelled { goal_id: a });
        bus.publish(EventKind::GoalCompleted { goal_id: a, summary: None });
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.seq < second.seq);
        assert!(matches!(first.kind, EventKind::GoalCancelled { .. }));
    }
}
