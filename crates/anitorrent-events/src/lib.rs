#![forbid(unsafe_code)]

//! Out-of-band event bus for torrent handle notifications.
//!
//! Fire-and-forget handle operations (status refresh, resume-data save,
//! file-progress refresh) deliver their results here rather than through a
//! return value. The bus assigns sequential identifiers and keeps a bounded
//! replay ring so late subscribers can catch up. Internally it uses
//! `tokio::broadcast`; when the channel overflows the oldest events are
//! dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Notifications emitted by torrent engines.
///
/// `handle_id` is the caller-assigned identifier stored on the native handle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StatusUpdated {
        handle_id: i64,
        state: i32,
        paused: bool,
        bytes_downloaded: u64,
        bytes_total: u64,
    },
    ResumeDataSaved {
        handle_id: i64,
        payload: String,
    },
    FileProgress {
        handle_id: i64,
        bytes_per_file: Vec<u64>,
    },
    StateChanged {
        handle_id: i64,
        state: i32,
        paused: bool,
    },
    MetadataReceived {
        handle_id: i64,
        name: String,
    },
    TorrentRemoved {
        handle_id: i64,
    },
}

impl Event {
    /// Machine-friendly discriminator for log filtering.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StatusUpdated { .. } => "status_updated",
            Self::ResumeDataSaved { .. } => "resume_data_saved",
            Self::FileProgress { .. } => "file_progress",
            Self::StateChanged { .. } => "state_changed",
            Self::MetadataReceived { .. } => "metadata_received",
            Self::TorrentRemoved { .. } => "torrent_removed",
        }
    }

    /// Handle identifier the event refers to.
    #[must_use]
    pub const fn handle_id(&self) -> i64 {
        match self {
            Self::StatusUpdated { handle_id, .. }
            | Self::ResumeDataSaved { handle_id, .. }
            | Self::FileProgress { handle_id, .. }
            | Self::StateChanged { handle_id, .. }
            | Self::MetadataReceived { handle_id, .. }
            | Self::TorrentRemoved { handle_id } => *handle_id,
        }
    }
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel and the replay ring share the capacity, so
    /// overflow drops the same events from both.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it a sequential identifier.
    ///
    /// Publishing succeeds even when nobody is subscribed.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe, replaying buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            backlog.extend(buffer.iter().filter(|item| item.id > since).cloned());
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Last assigned identifier still held in the replay ring.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.back().map(|event| event.id)
    }

    /// Snapshot of the replay ring, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<EventEnvelope> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.iter().cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream yielding events from the replay backlog, then from the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, draining the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Receive an event that is already available without waiting.
    pub fn try_next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}
