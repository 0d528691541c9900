use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use crate::{
    clock::Clock,
    error::{ChatError, ChatResult},
    log::{Draft, Message, MessageLog},
    reaper::Reaper,
    registry::{Participant, Registry},
    validate::{NewMessage, NewParticipant, ValidationError},
};

/// The chat room: who is here and what has been said.
#[derive(Clone)]
pub struct Room {
    clock: Arc<dyn Clock>,
    registry: Arc<Registry>,
    log: Arc<MessageLog>,
}

impl Room {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::new(Registry::new(clock.clone())),
            log: Arc::new(MessageLog::new(clock.clone())),
            clock,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Adds the participant and announces it.
    pub fn join(&self, NewParticipant { name }: NewParticipant) -> ChatResult<Participant> {
        let participant = self.registry.join(&name)?;
        self.log.append(Draft::joined(&name));
        Ok(participant)
    }

    pub fn heartbeat(&self, name: &str) -> ChatResult<()> {
        self.registry.heartbeat(name)
    }

    pub fn send(&self, from: &str, NewMessage { to, text, kind }: NewMessage) -> ChatResult<Arc<Message>> {
        if !self.registry.exists(from) {
            return Err(ChatError::Validation(ValidationError::new(format!(
                "sender {from:?} is not in the room"
            ))));
        }
        Ok(self.log.append(Draft {
            from: from.to_owned(),
            to,
            text,
            kind,
        }))
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.registry.list()
    }

    pub fn messages(&self, viewer: &str, limit: Option<NonZeroUsize>) -> Vec<Message> {
        match limit {
            Some(limit) => self.log.query_limited(viewer, limit),
            None => self.log.query(viewer).to_vec(),
        }
    }

    pub fn reaper(&self, inactivity_window: Duration) -> Reaper {
        Reaper::new(
            self.clock.clone(),
            self.registry.clone(),
            self.log.clone(),
            inactivity_window,
        )
    }
}
