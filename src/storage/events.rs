//! Lifecycle notifications published by the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::trace;

use super::retention::CleanupStats;
use crate::model::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    SessionStarted {
        session_id: String,
        start_time: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        end_time: DateTime<Utc>,
    },
    Flushed {
        persisted: usize,
        failed: usize,
    },
    CleanupCompleted {
        stats: CleanupStats,
    },
}

/// Broadcast publisher that also remembers which sessions it has announced
///
/// Sessions are tracked for this process only, so a restart may announce a
/// session again. Ended sessions are forgotten at each retention sweep.
#[derive(Debug)]
pub struct EventPublisher {
    sender: broadcast::Sender<StoreEvent>,
    seen: HashMap<String, bool>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seen: HashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Never blocks; with no subscribers the event is dropped
    pub fn publish(&self, event: StoreEvent) {
        if self.sender.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    /// Emit start/end notifications for a session write
    pub fn observe_session(&mut self, session: &Session) {
        let ended = self.seen.get(&session.id).copied();
        if ended.is_none() {
            self.publish(StoreEvent::SessionStarted {
                session_id: session.id.clone(),
                start_time: session.start_time,
            });
        }

        match session.end_time {
            Some(end_time) if ended != Some(true) => {
                self.seen.insert(session.id.clone(), true);
                self.publish(StoreEvent::SessionEnded {
                    session_id: session.id.clone(),
                    end_time,
                });
            }
            Some(_) => {}
            None => {
                self.seen.insert(session.id.clone(), false);
            }
        }
    }

    /// Drop ended sessions, returning how many were forgotten
    pub fn forget_ended(&mut self) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, ended| !*ended);
        before - self.seen.len()
    }
}
