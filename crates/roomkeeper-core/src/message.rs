//! Wire envelope.
//!
//! Every frame is a JSON object `{ "type", "userId", "content" }`. The set
//! of types is closed: anything else is rejected at decode time.

use crate::error::ProtocolError;
use crate::ids::{ItemId, UserId};
use crate::item::{Item, ItemUpdate};
use crate::user::UserProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved sender id for server-originated messages.
pub const ADMIN_SENDER: &str = "admin";

/// Who a message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
    Admin,
    User(UserId),
}

impl Sender {
    pub fn is_admin(&self) -> bool {
        matches!(self, Sender::Admin)
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Sender::Admin => None,
            Sender::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Admin => f.write_str(ADMIN_SENDER),
            Sender::User(id) => write!(f, "{id}"),
        }
    }
}

impl From<String> for Sender {
    fn from(s: String) -> Self {
        if s == ADMIN_SENDER {
            Sender::Admin
        } else {
            Sender::User(UserId::from(s))
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::Admin => ADMIN_SENDER.to_string(),
            Sender::User(id) => id.into_string(),
        }
    }
}

impl From<UserId> for Sender {
    fn from(id: UserId) -> Self {
        Sender::User(id)
    }
}

/// Requested or resulting lock state. A JSON boolean on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl From<bool> for LockState {
    fn from(locked: bool) -> Self {
        if locked {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }
}

impl From<LockState> for bool {
    fn from(state: LockState) -> Self {
        state == LockState::Locked
    }
}

/// Content of a `lock` message: a request from a client, or the subset
/// that actually changed when broadcast back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    pub item_ids: Vec<ItemId>,
    pub lock_state: LockState,
}

impl LockRequest {
    pub fn lock<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        Self {
            item_ids: ids.into_iter().map(Into::into).collect(),
            lock_state: LockState::Locked,
        }
    }

    pub fn unlock<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        Self {
            item_ids: ids.into_iter().map(Into::into).collect(),
            lock_state: LockState::Unlocked,
        }
    }
}

/// Snapshot sent once to a freshly joined connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitContent {
    pub items: Vec<Item>,
    pub users: Vec<UserProfile>,
    pub own_id: UserId,
}

/// Membership change, tagged by `userAction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "userAction", rename_all = "lowercase")]
pub enum UserEvent {
    Join { user: UserProfile },
    Update { user: UserProfile },
    Leave { id: UserId },
}

/// Typed content, keyed by the `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Payload {
    Init(InitContent),
    Add(Vec<Item>),
    Update(Vec<ItemUpdate>),
    Delete(Vec<ItemId>),
    Chat(Item),
    Lock(LockRequest),
    User(UserEvent),
    Error(String),
}

impl Payload {
    /// Every accepted value of the `type` field.
    pub const KINDS: [&'static str; 8] = [
        "init", "add", "update", "delete", "chat", "lock", "user", "error",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Init(_) => "init",
            Payload::Add(_) => "add",
            Payload::Update(_) => "update",
            Payload::Delete(_) => "delete",
            Payload::Chat(_) => "chat",
            Payload::Lock(_) => "lock",
            Payload::User(_) => "user",
            Payload::Error(_) => "error",
        }
    }
}

/// A complete frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "userId")]
    pub sender: Sender,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    pub fn new(sender: Sender, payload: Payload) -> Self {
        Self { sender, payload }
    }

    pub fn from_user(id: UserId, payload: Payload) -> Self {
        Self::new(Sender::User(id), payload)
    }

    pub fn from_admin(payload: Payload) -> Self {
        Self::new(Sender::Admin, payload)
    }

    /// An error notice. Always attributed to the administrative sender.
    pub fn error(text: impl Into<String>) -> Self {
        Self::from_admin(Payload::Error(text.into()))
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !Payload::KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }

        let message: Message = serde_json::from_value(value)?;
        message.validate()?;
        Ok(message)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Shape rules serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if let Payload::Error(_) = self.payload
            && !self.sender.is_admin()
        {
            return Err(ProtocolError::ErrorFromPeer(self.sender.to_string()));
        }
        Ok(())
    }
}
