//! Core of roomkeeper: the in-memory authority over rooms, members and
//! item edit locks, plus the JSON envelope exchanged with clients.
//!
//! The store does no I/O. A transport decodes frames into [`Message`]s,
//! calls into [`RoomDirectory`], and turns the returned ids and flags into
//! outbound messages for the right subset of room members.

mod directory;
mod error;
mod ids;
mod item;
mod message;
mod room;
mod user;

pub use directory::RoomDirectory;
pub use error::ProtocolError;
pub use ids::{ItemId, RoomId, UserId};
pub use item::{Fields, Item, ItemUpdate};
pub use message::{
    ADMIN_SENDER, InitContent, LockRequest, LockState, Message, Payload, Sender, UserEvent,
};
pub use room::Room;
pub use user::{User, UserProfile};
