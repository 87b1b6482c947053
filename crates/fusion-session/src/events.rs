//! Session events: the notification boundary.
//!
//! The core never renders anything; it emits [`SessionEvent`]s over an
//! unbounded channel and the presentation layer turns them into toasts,
//! progress bars, and preview refreshes. Emission never blocks and never
//! fails -- if no receiver is attached the event is simply dropped.

use serde::Serialize;
use tokio::sync::mpsc;

/// A user-visible occurrence inside the session core.
#[derive(Debug, Clone, Serialize)]
pub enum SessionEvent {
    /// A combinator's backing table was rebuilt from its inputs.
    NodeMaterialized { label: String },
    /// A combinator's backing table was reset to empty (an input went
    /// away).
    NodeCleared { label: String },
    /// A queued job failed; the queue continued.
    JobFailed { label: String, message: String },
    /// A file finished importing and its source node was created.
    ImportFinished { label: String, file: String },
    /// A file failed to import; the rest of the batch continues.
    ImportFailed { file: String, message: String },
    /// Batch ingestion progress, recomputed as jobs settle.
    BatchProgress { processed: usize, total: usize },
    /// Every job of the current ingestion batch has settled.
    BatchFinished { total: usize },
}

/// Cloneable emitter handle for session events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Creates a sink plus the receiving end the UI listens on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink { tx }, rx)
    }

    /// Emits an event, dropping it if no receiver is attached.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_receiver_does_not_panic() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(SessionEvent::BatchFinished { total: 0 });
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(SessionEvent::BatchProgress {
            processed: 1,
            total: 2,
        });
        sink.emit(SessionEvent::BatchProgress {
            processed: 2,
            total: 2,
        });
        sink.emit(SessionEvent::BatchFinished { total: 2 });

        match rx.recv().await.unwrap() {
            SessionEvent::BatchProgress { processed, .. } => assert_eq!(processed, 1),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            SessionEvent::BatchProgress { processed, .. } => assert_eq!(processed, 2),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::BatchFinished { total: 2 }
        ));
    }
}
