//! Domain events
use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::UserId;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    Merged { user_id: UserId, merge_version: Uuid, item_count: usize },
    WriteFailed { user_id: UserId, store: CartStoreKind, reason: String },
    RemoteUnavailable { user_id: UserId, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStoreKind { Local, Remote }

impl CartEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::Merged { user_id, .. } | Self::WriteFailed { user_id, .. } | Self::RemoteUnavailable { user_id, .. } => user_id,
        }
    }
}
