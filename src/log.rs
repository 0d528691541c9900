use std::{
    num::NonZeroUsize,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    clock::{Clock, format_time},
    visibility::is_visible,
};

/// Recipient meaning "everyone in the room".
pub const BROADCAST_TARGET: &str = "Todos";
pub const JOINED_TEXT: &str = "entra na sala...";
pub const LEFT_TEXT: &str = "sai da sala...";

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "message")]
    Broadcast,
    #[serde(rename = "private_message")]
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: String,
}

/// A message that has not been stamped yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub from: String,
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
}

impl Draft {
    pub fn joined(name: &str) -> Self {
        Self::status(name, JOINED_TEXT)
    }

    pub fn left(name: &str) -> Self {
        Self::status(name, LEFT_TEXT)
    }

    fn status(name: &str, text: &str) -> Self {
        Self {
            from: name.to_owned(),
            to: BROADCAST_TARGET.to_owned(),
            text: text.to_owned(),
            kind: MessageKind::Status,
        }
    }
}

/// Append-only chat history.
///
/// Every appended message is also published on a broadcast feed; stamping
/// and publishing happen under the write guard so log order, time order and
/// feed order agree. A push is the only mutation, so a guard poisoned by a
/// panicking holder is recovered rather than reported.
pub struct MessageLog {
    clock: Arc<dyn Clock>,
    messages: RwLock<Vec<Arc<Message>>>,
    feed: broadcast::Sender<Arc<Message>>,
}

impl MessageLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            messages: RwLock::new(Vec::new()),
            feed: broadcast::channel(FEED_CAPACITY).0,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Message>>> {
        self.messages.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, draft: Draft) -> Arc<Message> {
        let Draft { from, to, text, kind } = draft;
        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);

        let message = Arc::new(Message {
            from,
            to,
            text,
            kind,
            time: format_time(self.clock.now()),
        });
        messages.push(message.clone());
        // no subscribers is fine
        let _ = self.feed.send(message.clone());
        message
    }

    /// Everything `viewer` may see, as of now.
    pub fn query(&self, viewer: &str) -> Visible {
        Visible {
            viewer: viewer.to_owned(),
            snapshot: self.read().clone(),
        }
    }

    /// The most recent `limit` messages `viewer` may see, oldest first.
    pub fn query_limited(&self, viewer: &str, limit: NonZeroUsize) -> Vec<Message> {
        let visible = self.query(viewer);
        let mut tail: Vec<Message> = visible.iter().rev().take(limit.get()).cloned().collect();
        tail.reverse();
        tail
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Message>> {
        self.feed.subscribe()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// A point-in-time view of the log filtered for one viewer. Iterating is
/// lazy and can be repeated.
#[derive(Debug, Clone)]
pub struct Visible {
    viewer: String,
    snapshot: Vec<Arc<Message>>,
}

impl Visible {
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.snapshot
            .iter()
            .map(Arc::as_ref)
            .filter(|m| is_visible(&self.viewer, m))
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }
}
