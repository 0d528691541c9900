use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, Serializer};
use time::OffsetDateTime;

use crate::{
    clock::{Clock, unix_millis},
    error::{ChatError, ChatResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
    #[serde(rename = "lastStatus", serialize_with = "as_unix_millis")]
    pub last_seen: OffsetDateTime,
}

fn as_unix_millis<S: Serializer>(at: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(unix_millis(*at))
}

/// Everyone currently in the room, in the order they joined.
///
/// One guard covers every mutation, so a join racing an eviction of the same
/// name always observes one of the two as having happened first. Every
/// critical section is a single push, field write or partition, so a guard
/// poisoned by a panicking holder still protects a whole list.
pub struct Registry {
    clock: Arc<dyn Clock>,
    participants: Mutex<Vec<Participant>>,
}

impl Registry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            participants: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Participant>> {
        self.participants.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self, name: &str) -> ChatResult<Participant> {
        let mut participants = self.lock();
        if participants.iter().any(|p| p.name == name) {
            return Err(ChatError::Conflict(name.to_owned()));
        }

        let participant = Participant {
            name: name.to_owned(),
            last_seen: self.clock.now(),
        };
        participants.push(participant.clone());
        Ok(participant)
    }

    pub fn heartbeat(&self, name: &str) -> ChatResult<()> {
        let mut participants = self.lock();
        let Some(participant) = participants.iter_mut().find(|p| p.name == name) else {
            return Err(ChatError::NotFound(name.to_owned()));
        };
        participant.last_seen = self.clock.now();
        Ok(())
    }

    pub fn list(&self) -> Vec<Participant> {
        self.lock().clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everyone whose `last_seen` is strictly before
    /// `threshold`, keeping join order.
    pub fn evict_stale_before(&self, threshold: OffsetDateTime) -> Vec<Participant> {
        let mut participants = self.lock();
        let (stale, active): (Vec<_>, Vec<_>) = participants
            .drain(..)
            .partition(|p| p.last_seen < threshold);
        *participants = active;
        stale
    }
}
