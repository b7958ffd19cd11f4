//! Protocol messages
//!
//! [`Message`] is the closed set of values exchanged between server and
//! clients. Each variant maps to one [`MessageType`] id.

use serde::{Deserialize, Serialize};

use crate::batch::SceneOpBatch;
use crate::result::SceneOpAck;
use crate::snapshot::{SceneSnapshot, SchemaSnapshot};

/// Protocol version announced in handshakes
pub const PROTOCOL_VERSION: u32 = 1;

/// Message type ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MessageType {
    Hello = 1,
    ServerHello = 2,
    Ping = 3,
    Pong = 4,
    SceneOpBatch = 100,
    SceneOpAck = 101,
    SceneSnapshotRequest = 102,
    SceneSnapshot = 103,
    SchemaSnapshot = 104,
    SceneList = 105,
    SceneSelect = 106,
}

impl MessageType {
    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Hello),
            2 => Some(Self::ServerHello),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            100 => Some(Self::SceneOpBatch),
            101 => Some(Self::SceneOpAck),
            102 => Some(Self::SceneSnapshotRequest),
            103 => Some(Self::SceneSnapshot),
            104 => Some(Self::SchemaSnapshot),
            105 => Some(Self::SceneList),
            106 => Some(Self::SceneSelect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub protocol_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    pub protocol_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSnapshotRequest {
    pub request_id: u64,
}

/// A selectable scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneInfo {
    pub scene_id: String,
    pub display_name: String,
}

impl SceneInfo {
    pub fn new(scene_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Available scenes and the active one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneList {
    pub scenes: Vec<SceneInfo>,
    pub active_scene_id: String,
}

/// Request to switch the active scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSelect {
    pub scene_id: String,
}

/// Every message the protocol carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Hello(Hello),
    ServerHello(ServerHello),
    Ping(Ping),
    Pong(Pong),
    SceneOpBatch(SceneOpBatch),
    SceneOpAck(SceneOpAck),
    SceneSnapshotRequest(SceneSnapshotRequest),
    SceneSnapshot(SceneSnapshot),
    SchemaSnapshot(SchemaSnapshot),
    SceneList(SceneList),
    SceneSelect(SceneSelect),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Hello(_) => MessageType::Hello,
            Self::ServerHello(_) => MessageType::ServerHello,
            Self::Ping(_) => MessageType::Ping,
            Self::Pong(_) => MessageType::Pong,
            Self::SceneOpBatch(_) => MessageType::SceneOpBatch,
            Self::SceneOpAck(_) => MessageType::SceneOpAck,
            Self::SceneSnapshotRequest(_) => MessageType::SceneSnapshotRequest,
            Self::SceneSnapshot(_) => MessageType::SceneSnapshot,
            Self::SchemaSnapshot(_) => MessageType::SchemaSnapshot,
            Self::SceneList(_) => MessageType::SceneList,
            Self::SceneSelect(_) => MessageType::SceneSelect,
        }
    }
}

macro_rules! impl_from_message {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(value: $ty) -> Self {
                    Message::$ty(value)
                }
            }
        )*
    };
}

impl_from_message!(
    Hello,
    ServerHello,
    Ping,
    Pong,
    SceneOpBatch,
    SceneOpAck,
    SceneSnapshotRequest,
    SceneSnapshot,
    SchemaSnapshot,
    SceneList,
    SceneSelect,
);
