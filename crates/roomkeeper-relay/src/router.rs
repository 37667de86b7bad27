//! Fan-out policy.
//!
//! Turns a decoded client message into store calls, and the store's
//! answers into deliveries addressed to parts of the room. Nothing here
//! touches a socket; connection handles only need to implement [`Outlet`].

use roomkeeper_core::{
    InitContent, LockRequest, LockState, Message, Payload, ProtocolError, RoomDirectory, User,
    UserEvent, UserId,
};
use std::sync::Arc;

/// Where a user's outbound frames go.
pub trait Outlet {
    /// Queue an encoded frame. Must not block.
    fn send(&self, frame: Arc<str>);

    /// Ask the connection to shut down after flushing what is queued.
    fn close(&self);
}

/// Which members of the room receive a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Only this member.
    Only(UserId),
    /// Every member except this one.
    Others(UserId),
    Everyone,
}

impl Audience {
    pub fn includes(&self, id: &UserId) -> bool {
        match self {
            Audience::Only(target) => target == id,
            Audience::Others(excluded) => excluded != id,
            Audience::Everyone => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub message: Message,
}

impl Delivery {
    pub fn only(id: &UserId, message: Message) -> Self {
        Self {
            audience: Audience::Only(id.clone()),
            message,
        }
    }

    pub fn others(id: &UserId, message: Message) -> Self {
        Self {
            audience: Audience::Others(id.clone()),
            message,
        }
    }

    pub fn everyone(message: Message) -> Self {
        Self {
            audience: Audience::Everyone,
            message,
        }
    }
}

/// Add a member and queue its `init` snapshot in the same step, then
/// announce it to everyone else.
pub fn join<H: Outlet>(
    directory: &RoomDirectory<H>,
    room_id: &str,
    user: User<H>,
) -> Vec<Delivery> {
    let own_id = user.id().clone();
    let profile = user.profile.clone();

    directory.add_user_with(room_id, user, |room| {
        let init = Message::from_admin(Payload::Init(InitContent {
            items: room.items().to_vec(),
            users: room.profiles(),
            own_id: own_id.clone(),
        }));
        match init.encode() {
            Ok(frame) => {
                if let Some(me) = room.users().iter().find(|u| *u.id() == own_id) {
                    me.handle.send(frame.into());
                }
            }
            Err(e) => tracing::warn!(room = %room_id, "failed to encode init: {}", e),
        }
    });

    vec![Delivery::others(
        &own_id,
        Message::from_admin(Payload::User(UserEvent::Join { user: profile })),
    )]
}

/// Remove a member, announcing the departure and any locks it freed.
pub fn leave<H>(directory: &RoomDirectory<H>, room_id: &str, user_id: &UserId) -> Vec<Delivery> {
    let released = directory.remove_user(room_id, user_id.as_str());

    let mut out = vec![Delivery::everyone(Message::from_admin(Payload::User(
        UserEvent::Leave {
            id: user_id.clone(),
        },
    )))];
    if !released.is_empty() {
        out.push(Delivery::everyone(Message::from_user(
            user_id.clone(),
            Payload::Lock(LockRequest {
                item_ids: released,
                lock_state: LockState::Unlocked,
            }),
        )));
    }
    out
}

/// Reply to a frame that failed to decode.
pub fn reject(from: &UserId, error: &ProtocolError) -> Vec<Delivery> {
    vec![Delivery::only(from, Message::error(error.to_string()))]
}

/// Apply one client message. The envelope's own `userId` is ignored: the
/// connection's id is authoritative.
pub fn route<H>(
    directory: &RoomDirectory<H>,
    room_id: &str,
    from: &UserId,
    message: Message,
) -> Vec<Delivery> {
    let sender = from.as_str();
    let reply = |payload| Message::from_user(from.clone(), payload);

    match message.payload {
        Payload::Add(items) => {
            let added = directory.add_items(room_id, sender, items);
            if added.is_empty() {
                return Vec::new();
            }
            vec![Delivery::others(from, reply(Payload::Add(added)))]
        }
        Payload::Update(updates) => {
            let applied = directory.update_items(room_id, sender, updates);
            if applied.is_empty() {
                return Vec::new();
            }
            vec![Delivery::others(from, reply(Payload::Update(applied)))]
        }
        Payload::Delete(ids) => {
            let removed = directory.delete_items(room_id, sender, ids);
            if removed.is_empty() {
                return Vec::new();
            }
            vec![Delivery::others(from, reply(Payload::Delete(removed)))]
        }
        Payload::Chat(mut item) => {
            item.stamp();
            vec![Delivery::everyone(reply(Payload::Chat(item)))]
        }
        Payload::Lock(request) => {
            let changed = directory.toggle_items_lock(room_id, sender, &request);
            if changed.is_empty() {
                return Vec::new();
            }
            vec![Delivery::everyone(reply(Payload::Lock(LockRequest {
                item_ids: changed,
                lock_state: request.lock_state,
            })))]
        }
        Payload::User(UserEvent::Update { mut user }) => {
            user.id = from.clone();
            if !directory.update_user(room_id, user.clone()) {
                return Vec::new();
            }
            vec![Delivery::others(
                from,
                reply(Payload::User(UserEvent::Update { user })),
            )]
        }
        other => {
            tracing::debug!(
                room = %room_id,
                user = %from,
                kind = other.kind(),
                "rejected client message"
            );
            vec![Delivery::only(
                from,
                Message::error(format!("{} messages are not accepted from clients", other.kind())),
            )]
        }
    }
}

/// Encode each delivery once and hand it to every member it addresses.
pub fn deliver<H: Outlet>(directory: &RoomDirectory<H>, room_id: &str, deliveries: Vec<Delivery>)
where
    H: Clone,
{
    if deliveries.is_empty() {
        return;
    }
    let members = directory.list_users(room_id);

    for delivery in deliveries {
        let frame: Arc<str> = match delivery.message.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                tracing::warn!(
                    room = %room_id,
                    kind = delivery.message.kind(),
                    "failed to encode: {}",
                    e
                );
                continue;
            }
        };
        for member in members.iter().filter(|m| delivery.audience.includes(m.id())) {
            member.handle.send(frame.clone());
        }
    }
}
