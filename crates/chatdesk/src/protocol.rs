// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the chat relay.
//!
//! Every frame is a JSON object tagged by `type` (`{"type": "message", ...}`).
//! One [`Envelope`] enum covers both directions: clients send `auth` and
//! `message` frames, the server answers with `message`, `command`, and
//! `error` frames. [`decode`] and [`encode`] are pure so the live path and
//! history replay share them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

/// Chat text that turns a `message` frame into a history-clear request.
pub const CLEAN_COMMAND: &str = "/clean";

/// Display name used when a frame carries none.
pub const DEFAULT_DISPLAY_NAME: &str = "Usuario";

/// Phone used when a frame carries none.
pub const DEFAULT_PHONE: &str = "N/A";

/// Discriminator of an [`Envelope`], as carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Auth,
    Chat,
    Command,
    Error,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Chat => "message",
            Self::Command => "command",
            Self::Error => "error",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "auth" => Some(Self::Auth),
            "message" => Some(Self::Chat),
            "command" => Some(Self::Command),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Auth(AuthFrame),
    #[serde(rename = "message")]
    Chat(ChatFrame),
    Command(CommandFrame),
    Error(ErrorFrame),
}

/// Binds a connection to an identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthFrame {
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A chat message, either sent by a client or relayed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Filled in by the server; ignored on inbound frames.
    #[serde(rename = "sender_id", default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(rename = "receiver_id", default)]
    pub receiver: String,
    #[serde(rename = "message", default)]
    pub text: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_history: Option<bool>,
    /// Identity a not-yet-authenticated client claims for itself.
    #[serde(rename = "user_id", default, skip_serializing)]
    pub claimed_identity: Option<String>,
}

/// Server-issued control frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub action: CommandAction,
    /// Identity the command refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PresenceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    /// History for `user_id` was cleared.
    Clean,
    /// `user_id` went online or offline.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Server-to-client error report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reasons an inbound frame is rejected before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("frame must be a JSON object")]
    NotAnObject,
    #[error("missing type")]
    MissingType,
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("malformed {kind} frame: {reason}")]
    Malformed { kind: FrameKind, reason: String },
    #[error("{field} is required")]
    MissingField { kind: FrameKind, field: &'static str },
}

impl DecodeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownType(_) => ErrorCode::UnknownType,
            _ => ErrorCode::BadRequest,
        }
    }
}

impl Envelope {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Auth(_) => FrameKind::Auth,
            Self::Chat(_) => FrameKind::Chat,
            Self::Command(_) => FrameKind::Command,
            Self::Error(_) => FrameKind::Error,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorFrame {
            code: Some(code.as_str().to_owned()),
            message: message.into(),
            timestamp: None,
        })
    }

    /// `command/clean` announcing that `target`'s history is gone.
    pub fn clean(target: impl Into<String>) -> Self {
        Self::Command(CommandFrame {
            action: CommandAction::Clean,
            user_id: Some(target.into()),
            status: None,
            name: None,
            phone: None,
        })
    }

    /// `command/status` presence transition for `identity`.
    pub fn status(
        identity: impl Into<String>,
        status: PresenceStatus,
        name: Option<String>,
        phone: Option<String>,
    ) -> Self {
        Self::Command(CommandFrame {
            action: CommandAction::Status,
            user_id: Some(identity.into()),
            status: Some(status),
            name,
            phone,
        })
    }

    /// Reject frames missing variant-required fields and normalize the rest.
    fn validated(self) -> Result<Self, DecodeError> {
        match self {
            Self::Auth(mut auth) => {
                auth.identity = non_blank(auth.identity);
                auth.display_name = non_blank(auth.display_name);
                auth.phone = non_blank(auth.phone);
                Ok(Self::Auth(auth))
            }
            Self::Chat(mut chat) => {
                let text = chat.text.trim();
                if text.is_empty() {
                    return Err(DecodeError::MissingField { kind: FrameKind::Chat, field: "message" });
                }
                chat.text = text.to_owned();
                let receiver = chat.receiver.trim();
                if receiver.is_empty() {
                    return Err(DecodeError::MissingField {
                        kind: FrameKind::Chat,
                        field: "receiver_id",
                    });
                }
                chat.receiver = receiver.to_owned();
                chat.display_name = non_blank(chat.display_name);
                chat.phone = non_blank(chat.phone);
                chat.claimed_identity = non_blank(chat.claimed_identity);
                Ok(Self::Chat(chat))
            }
            other => Ok(other),
        }
    }

    /// Fill the server timestamp on variants that always carry one.
    fn stamped(&self, now: DateTime<Utc>) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::Chat(chat) if chat.timestamp.is_none() => chat.timestamp = Some(now),
            Self::Error(err) if err.timestamp.is_none() => err.timestamp = Some(now),
            _ => {}
        }
        out
    }
}

impl ChatFrame {
    /// True when the text is the history-clear token (case-insensitive).
    pub fn is_clean_command(&self) -> bool {
        self.text.trim().eq_ignore_ascii_case(CLEAN_COMMAND)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Parse and validate one inbound frame.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Value::Object(ref map) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let tag = match map.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(DecodeError::MissingType),
    };
    let kind = FrameKind::from_tag(&tag).ok_or(DecodeError::UnknownType(tag))?;
    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| DecodeError::Malformed { kind, reason: e.to_string() })?;
    envelope.validated()
}

/// Serialize a frame, stamping `message` and `error` frames with the current time.
pub fn encode(envelope: &Envelope) -> String {
    encode_at(envelope, Utc::now())
}

pub fn encode_at(envelope: &Envelope, now: DateTime<Utc>) -> String {
    let stamped = envelope.stamped(now);
    serde_json::to_string(&stamped).unwrap_or_else(|_| {
        r#"{"type":"error","code":"INTERNAL","message":"failed to encode frame"}"#.to_owned()
    })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
