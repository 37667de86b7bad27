//! Items: the free-form records users draw on a room's board.

use crate::ids::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open key-value payload carried by items, updates and user profiles.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A board item. Only `id` and `creationDate` are known to the server;
/// everything else rides along in `fields`. Clients may leave `id` out, in
/// which case a fresh one is assigned on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default = "ItemId::generate")]
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            creation_date: None,
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and fixtures.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set `creationDate` to now unless the client already supplied one.
    pub fn stamp(&mut self) {
        self.creation_date.get_or_insert_with(Utc::now);
    }

    /// Overwrite fields present in `update`, keeping everything else.
    ///
    /// `id` is never changed. A `creationDate` key in the update is ignored
    /// unless it parses as a timestamp; see
    /// [`ItemUpdate::drop_invalid_creation_date`].
    pub fn merge(&mut self, update: &ItemUpdate) {
        for (key, value) in &update.fields {
            if key == "creationDate" {
                if let Ok(date) = serde_json::from_value(value.clone()) {
                    self.creation_date = Some(date);
                }
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

/// A partial update: the target id plus the fields to overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl ItemUpdate {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Remove a `creationDate` that is not a timestamp, so the update that
    /// gets relayed matches what was stored.
    pub fn drop_invalid_creation_date(&mut self) {
        let invalid = self
            .fields
            .get("creationDate")
            .is_some_and(|value| DateTime::<Utc>::deserialize(value).is_err());
        if invalid {
            self.fields.remove("creationDate");
        }
    }
}
