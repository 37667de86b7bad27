//! Room members.

use crate::ids::UserId;
use crate::item::Fields;
use serde::{Deserialize, Deserializer, Serialize};

/// The part of a user that peers see. This is what travels in `init` and
/// `user` messages; the connection handle never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    /// `None` when absent, `Some(None)` for an explicit `null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_name: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            user_name: None,
            extra: Fields::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(Some(name.into()));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.user_name.as_ref()?.as_deref()
    }

    /// Shallow merge: fields present in `update` win, absent ones are kept.
    /// An explicit `null` counts as present.
    pub fn merge(&mut self, update: UserProfile) {
        if update.user_name.is_some() {
            self.user_name = update.user_name;
        }
        self.extra.extend(update.extra);
    }
}

// Distinguishes a `null` field from a missing one, which `default` covers.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A joined user: public profile plus the transport's delivery handle.
///
/// `H` is opaque to the store. It is cloned out for fan-out and otherwise
/// left alone; profile updates cannot touch it.
#[derive(Debug, Clone)]
pub struct User<H> {
    pub profile: UserProfile,
    pub handle: H,
}

impl<H> User<H> {
    pub fn new(profile: UserProfile, handle: H) -> Self {
        Self { profile, handle }
    }

    pub fn id(&self) -> &UserId {
        &self.profile.id
    }
}
