//! Request schemas shared by every entry point.
//!
//! Each raw body is deserialized leniently (every field optional) and then
//! checked here, so a bad request reports all of its problems at once.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::log::{BROADCAST_TARGET, MessageKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid input: {}", .details.join("; "))]
pub struct ValidationError {
    pub details: Vec<String>,
}

impl ValidationError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { details: vec![detail.into()] }
    }
}

/// Collects problems until `finish` is called.
#[derive(Default)]
struct Report(Vec<String>);

impl Report {
    fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            None => {
                self.0.push(format!("\"{field}\" is required"));
                None
            }
            Some(v) if v.trim().is_empty() => {
                self.0.push(format!("\"{field}\" is not allowed to be empty"));
                None
            }
            Some(v) => Some(v),
        }
    }

    fn push(&mut self, detail: String) {
        self.0.push(detail);
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(ValidationError { details: self.0 })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub name: String,
}

impl JoinBody {
    pub fn validate(self) -> Result<NewParticipant, ValidationError> {
        let mut report = Report::default();
        let name = report.required("name", self.name.as_deref());
        if name == Some(BROADCAST_TARGET) {
            report.push(format!("\"name\" must not be {BROADCAST_TARGET:?}"));
        }
        report.finish(|| NewParticipant {
            name: self.name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub to: String,
    pub text: String,
    pub kind: MessageKind,
}

impl SendBody {
    pub fn validate(self) -> Result<NewMessage, ValidationError> {
        let mut report = Report::default();
        let to = report.required("to", self.to.as_deref());
        report.required("text", self.text.as_deref());

        let kind = match report.required("type", self.kind.as_deref()) {
            Some("message" | "broadcast") => Some(MessageKind::Broadcast),
            Some("private_message" | "direct") => Some(MessageKind::Direct),
            Some(other) => {
                report.push(format!(
                    "\"type\" must be one of [message, private_message], got {other:?}"
                ));
                None
            }
            None => None,
        };

        if kind == Some(MessageKind::Direct) && to == Some(BROADCAST_TARGET) {
            report.push(format!(
                "a private_message cannot be addressed to {BROADCAST_TARGET:?}"
            ));
        }

        report.finish(|| NewMessage {
            to: self.to.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            kind: kind.unwrap_or(MessageKind::Broadcast),
        })
    }
}

/// `None` means "no limit"; anything present must be a positive integer.
pub fn parse_limit(raw: Option<&str>) -> Result<Option<NonZeroUsize>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<NonZeroUsize>()
        .map(Some)
        .map_err(|_| ValidationError::new(format!("\"limit\" must be a positive integer, got {raw:?}")))
}

/// The caller identity travels in the `User` header. Browsers send UTF-8
/// there even though HTTP only promises ASCII, so the raw bytes are decoded.
pub fn parse_user(raw: Option<&[u8]>) -> Result<String, ValidationError> {
    let raw = raw.ok_or_else(|| ValidationError::new("\"User\" header is required"))?;
    let user = std::str::from_utf8(raw)
        .map_err(|_| ValidationError::new("\"User\" header must be valid UTF-8"))?;
    if user.trim().is_empty() {
        return Err(ValidationError::new("\"User\" header is not allowed to be empty"));
    }
    Ok(user.to_owned())
}
