//! Message encoding and decoding
//!
//! A message is a varint type id followed by a type-specific body. Encoding
//! sizes the output with an exact structural estimate, writes into a fixed
//! buffer and only grows the buffer if the write still runs out of space.
//!
//! ```text
//! encode: estimate ─► alloc max(256, est) ─► write ─► full? ─► grow ×2 (≤ 8 tries)
//! decode: type id ─► body (counts checked against per-kind ceilings)
//! ```

use std::io::{Cursor, Write};

use void_ir::{
    Hello, Message, MessageType, NodeSnapshot, Ping, Pong, SceneInfo, SceneList, SceneOp, SceneOpAck,
    SceneOpBatch, SceneOpError, SceneOpKind, SceneOpResult, SceneSelect, SceneSnapshot,
    SceneSnapshotRequest, SchemaSnapshot, ServerHello, SnapshotProperty,
};
use void_scene::{NodeTypeDef, PropertyDef, PropertyType};

use crate::error::{WireError, WireResult};
use crate::io::{
    long_size, string_size, varint_size, write_bool, write_count, write_long, write_string, write_varint,
    WireReader,
};

/// Smallest buffer allocated for an encode
pub const MIN_ALLOC_BYTES: usize = 256;

/// Largest buffer allocated for an encode (transport payload limit plus slack)
pub const MAX_ALLOC_BYTES: usize = 1_048_576 + 64;

/// Encode attempts before giving up
pub const MAX_ENCODE_ATTEMPTS: usize = 8;

pub const MAX_OPS: u32 = 1_000_000;
pub const MAX_RESULTS: u32 = 1_000_000;
pub const MAX_SNAPSHOT_NODES: u32 = 2_000_000;
pub const MAX_PROPERTIES: u32 = 1_000_000;
pub const MAX_SCHEMA_TYPES: u32 = 1_000_000;
pub const MAX_HINTS: u32 = 1_000_000;
pub const MAX_SCENES: u32 = 100_000;

/// Encoder buffer policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub min_alloc: usize,
    pub max_alloc: usize,
    pub max_attempts: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            min_alloc: MIN_ALLOC_BYTES,
            max_alloc: MAX_ALLOC_BYTES,
            max_attempts: MAX_ENCODE_ATTEMPTS,
        }
    }
}

impl CodecConfig {
    fn clamp(&self, cap: usize) -> usize {
        if cap == 0 {
            return self.min_alloc;
        }
        cap.min(self.max_alloc)
    }
}

/// Stateless message codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode `message` into a new byte vector.
    ///
    /// # Errors
    ///
    /// [`WireError::MessageTooLarge`] if the message does not fit in
    /// `max_alloc` bytes, [`WireError::StringTooLong`] for an oversized string.
    pub fn encode(&self, message: &Message) -> WireResult<Vec<u8>> {
        self.encode_sized(message, estimate_size(message))
    }

    fn encode_sized(&self, message: &Message, estimate: usize) -> WireResult<Vec<u8>> {
        let message_type = message.message_type();
        let mut cap = self.config.clamp(self.config.min_alloc.max(estimate));

        for attempt in 0..self.config.max_attempts {
            let mut buf = vec![0u8; cap];
            let mut cursor = Cursor::new(&mut buf[..]);
            match write_message(&mut cursor, message) {
                Ok(()) => {
                    let len = cursor.position() as usize;
                    buf.truncate(len);
                    return Ok(buf);
                }
                Err(WireError::BufferFull) => {
                    let next = self.config.clamp(cap.saturating_add(64).max(cap.saturating_mul(2)));
                    if next <= cap {
                        return Err(WireError::MessageTooLarge { message_type, cap });
                    }
                    log::debug!(
                        "Encode of {:?} overflowed {} bytes (attempt {}); retrying with {}",
                        message_type,
                        cap,
                        attempt + 1,
                        next
                    );
                    cap = next;
                }
                Err(err) => return Err(err),
            }
        }
        Err(WireError::MessageTooLarge { message_type, cap })
    }

    /// Decode one message from `bytes`. Bytes after the body are ignored.
    pub fn decode(&self, bytes: &[u8]) -> WireResult<Message> {
        let mut reader = WireReader::new(bytes);
        read_message(&mut reader)
    }
}

/// Encode with the default buffer policy
pub fn encode(message: &Message) -> WireResult<Vec<u8>> {
    Codec::default().encode(message)
}

/// Decode a complete message
pub fn decode(bytes: &[u8]) -> WireResult<Message> {
    Codec::default().decode(bytes)
}

// ----------------------------------------------------------------------
// Writing
// ----------------------------------------------------------------------

/// Write the type id and body of `message`
pub fn write_message<W: Write>(out: &mut W, message: &Message) -> WireResult<()> {
    write_varint(out, message.message_type().id())?;
    match message {
        Message::Hello(hello) => write_varint(out, hello.protocol_version),
        Message::ServerHello(hello) => write_varint(out, hello.protocol_version),
        Message::Ping(ping) => write_long(out, ping.nonce),
        Message::Pong(pong) => write_long(out, pong.nonce),
        Message::SceneOpBatch(batch) => write_op_batch(out, batch),
        Message::SceneOpAck(ack) => write_op_ack(out, ack),
        Message::SceneSnapshotRequest(request) => write_long(out, request.request_id),
        Message::SceneSnapshot(snapshot) => write_scene_snapshot(out, snapshot),
        Message::SchemaSnapshot(schema) => write_schema_snapshot(out, schema),
        Message::SceneList(list) => write_scene_list(out, list),
        Message::SceneSelect(select) => write_string(out, &select.scene_id),
    }
}

fn write_op_batch<W: Write>(out: &mut W, batch: &SceneOpBatch) -> WireResult<()> {
    write_long(out, batch.batch_id)?;
    write_bool(out, batch.atomic)?;
    write_count(out, batch.ops.len())?;
    for op in &batch.ops {
        write_varint(out, op.kind().id())?;
        match op {
            SceneOp::CreateNode { parent_id, name, type_id } => {
                write_long(out, *parent_id)?;
                write_string(out, name)?;
                write_string(out, type_id)?;
            }
            SceneOp::QueueFree { node_id } => write_long(out, *node_id)?,
            SceneOp::Rename { node_id, new_name } => {
                write_long(out, *node_id)?;
                write_string(out, new_name)?;
            }
            SceneOp::SetProperty { node_id, key, value } => {
                write_long(out, *node_id)?;
                write_string(out, key)?;
                write_string(out, value)?;
            }
            SceneOp::RemoveProperty { node_id, key } => {
                write_long(out, *node_id)?;
                write_string(out, key)?;
            }
            SceneOp::Reparent { node_id, new_parent_id, index } => {
                write_long(out, *node_id)?;
                write_long(out, *new_parent_id)?;
                write_varint(out, *index as u32)?;
            }
        }
    }
    Ok(())
}

fn write_op_ack<W: Write>(out: &mut W, ack: &SceneOpAck) -> WireResult<()> {
    write_long(out, ack.batch_id)?;
    write_long(out, ack.scene_revision)?;
    write_count(out, ack.results.len())?;
    for result in &ack.results {
        write_long(out, result.target_id)?;
        write_long(out, result.created_id)?;
        write_bool(out, result.ok)?;
        write_varint(out, result.error.id())?;
        write_string(out, &result.message)?;
    }
    Ok(())
}

fn write_scene_snapshot<W: Write>(out: &mut W, snapshot: &SceneSnapshot) -> WireResult<()> {
    write_long(out, snapshot.request_id)?;
    write_long(out, snapshot.revision)?;
    write_count(out, snapshot.nodes.len())?;
    for node in &snapshot.nodes {
        write_long(out, node.node_id)?;
        write_long(out, node.parent_id)?;
        write_string(out, &node.name)?;
        write_string(out, &node.type_id)?;
        write_count(out, node.properties.len())?;
        for prop in &node.properties {
            write_string(out, &prop.key)?;
            write_string(out, &prop.value)?;
        }
    }
    Ok(())
}

fn write_schema_snapshot<W: Write>(out: &mut W, schema: &SchemaSnapshot) -> WireResult<()> {
    write_long(out, schema.schema_revision)?;
    write_count(out, schema.types.len())?;
    for def in &schema.types {
        write_string(out, &def.type_id)?;
        write_string(out, &def.display_name)?;
        write_string(out, &def.category)?;
        write_varint(out, def.order)?;

        let props = def.sorted_properties();
        write_count(out, props.len())?;
        for prop in props {
            write_string(out, &prop.key)?;
            write_string(out, prop.ty.name())?;
            write_bool(out, prop.default_value.is_some())?;
            if let Some(default) = &prop.default_value {
                write_string(out, default)?;
            }
            write_string(out, &prop.display_name)?;
            write_string(out, &prop.category)?;
            write_varint(out, prop.order)?;
            write_count(out, prop.editor_hints.len())?;
            for (key, value) in &prop.editor_hints {
                write_string(out, key)?;
                write_string(out, value)?;
            }
        }
    }
    Ok(())
}

fn write_scene_list<W: Write>(out: &mut W, list: &SceneList) -> WireResult<()> {
    write_count(out, list.scenes.len())?;
    for scene in &list.scenes {
        write_string(out, &scene.scene_id)?;
        write_string(out, &scene.display_name)?;
    }
    write_string(out, &list.active_scene_id)
}

// ----------------------------------------------------------------------
// Reading
// ----------------------------------------------------------------------

/// Read a type id and the matching body
pub fn read_message(reader: &mut WireReader<'_>) -> WireResult<Message> {
    let type_id = reader.read_varint()?;
    let message_type = MessageType::from_id(type_id).ok_or(WireError::UnknownMessageType(type_id))?;

    let message = match message_type {
        MessageType::Hello => Message::Hello(Hello {
            protocol_version: reader.read_varint()?,
        }),
        MessageType::ServerHello => Message::ServerHello(ServerHello {
            protocol_version: reader.read_varint()?,
        }),
        MessageType::Ping => Message::Ping(Ping {
            nonce: reader.read_long()?,
        }),
        MessageType::Pong => Message::Pong(Pong {
            nonce: reader.read_long()?,
        }),
        MessageType::SceneOpBatch => Message::SceneOpBatch(read_op_batch(reader)?),
        MessageType::SceneOpAck => Message::SceneOpAck(read_op_ack(reader)?),
        MessageType::SceneSnapshotRequest => Message::SceneSnapshotRequest(SceneSnapshotRequest {
            request_id: reader.read_long()?,
        }),
        MessageType::SceneSnapshot => Message::SceneSnapshot(read_scene_snapshot(reader)?),
        MessageType::SchemaSnapshot => Message::SchemaSnapshot(read_schema_snapshot(reader)?),
        MessageType::SceneList => Message::SceneList(read_scene_list(reader)?),
        MessageType::SceneSelect => Message::SceneSelect(SceneSelect {
            scene_id: reader.read_string()?,
        }),
    };
    Ok(message)
}

fn read_op_batch(reader: &mut WireReader<'_>) -> WireResult<SceneOpBatch> {
    let batch_id = reader.read_long()?;
    let atomic = reader.read_bool()?;
    let count = reader.read_count("op", MAX_OPS)?;

    let mut ops = Vec::with_capacity(reader.capacity_for(count));
    for _ in 0..count {
        let kind_id = reader.read_varint()?;
        let kind = SceneOpKind::from_id(kind_id).ok_or(WireError::UnknownOpKind(kind_id))?;
        let op = match kind {
            SceneOpKind::CreateNode => SceneOp::CreateNode {
                parent_id: reader.read_long()?,
                name: reader.read_string()?,
                type_id: reader.read_string()?,
            },
            SceneOpKind::QueueFree => SceneOp::QueueFree {
                node_id: reader.read_long()?,
            },
            SceneOpKind::Rename => SceneOp::Rename {
                node_id: reader.read_long()?,
                new_name: reader.read_string()?,
            },
            SceneOpKind::SetProperty => SceneOp::SetProperty {
                node_id: reader.read_long()?,
                key: reader.read_string()?,
                value: reader.read_string()?,
            },
            SceneOpKind::RemoveProperty => SceneOp::RemoveProperty {
                node_id: reader.read_long()?,
                key: reader.read_string()?,
            },
            SceneOpKind::Reparent => SceneOp::Reparent {
                node_id: reader.read_long()?,
                new_parent_id: reader.read_long()?,
                index: reader.read_varint()? as i32,
            },
        };
        ops.push(op);
    }
    Ok(SceneOpBatch { batch_id, atomic, ops })
}

fn read_op_ack(reader: &mut WireReader<'_>) -> WireResult<SceneOpAck> {
    let batch_id = reader.read_long()?;
    let scene_revision = reader.read_long()?;
    let count = reader.read_count("result", MAX_RESULTS)?;

    let mut results = Vec::with_capacity(reader.capacity_for(count));
    for _ in 0..count {
        let target_id = reader.read_long()?;
        let created_id = reader.read_long()?;
        let ok = reader.read_bool()?;
        let error_id = reader.read_varint()?;
        let error = SceneOpError::from_id(error_id).ok_or(WireError::UnknownErrorKind(error_id))?;
        let message = reader.read_string()?;
        results.push(SceneOpResult {
            target_id,
            created_id,
            ok,
            error,
            message,
        });
    }
    Ok(SceneOpAck {
        batch_id,
        scene_revision,
        results,
    })
}

fn read_scene_snapshot(reader: &mut WireReader<'_>) -> WireResult<SceneSnapshot> {
    let request_id = reader.read_long()?;
    let revision = reader.read_long()?;
    let count = reader.read_count("node", MAX_SNAPSHOT_NODES)?;

    let mut nodes = Vec::with_capacity(reader.capacity_for(count));
    for _ in 0..count {
        let node_id = reader.read_long()?;
        let parent_id = reader.read_long()?;
        let name = reader.read_string()?;
        let type_id = reader.read_string()?;
        let prop_count = reader.read_count("property", MAX_PROPERTIES)?;
        let mut properties = Vec::with_capacity(reader.capacity_for(prop_count));
        for _ in 0..prop_count {
            let key = reader.read_string()?;
            let value = reader.read_string()?;
            properties.push(SnapshotProperty { key, value });
        }
        nodes.push(NodeSnapshot {
            node_id,
            parent_id,
            name,
            type_id,
            properties,
        });
    }
    Ok(SceneSnapshot {
        request_id,
        revision,
        nodes,
    })
}

fn read_schema_snapshot(reader: &mut WireReader<'_>) -> WireResult<SchemaSnapshot> {
    let schema_revision = reader.read_long()?;
    let count = reader.read_count("type", MAX_SCHEMA_TYPES)?;

    let mut types = Vec::with_capacity(reader.capacity_for(count));
    for _ in 0..count {
        let type_id = reader.read_string()?;
        let display_name = reader.read_string()?;
        let category = reader.read_string()?;
        let order = reader.read_varint()?;
        let mut def = NodeTypeDef::new(type_id, display_name, category, order);

        let prop_count = reader.read_count("property", MAX_PROPERTIES)?;
        for _ in 0..prop_count {
            let prop = read_property_def(reader)?;
            def.properties.insert(prop.key.clone(), prop);
        }
        types.push(def);
    }
    Ok(SchemaSnapshot { schema_revision, types })
}

fn read_property_def(reader: &mut WireReader<'_>) -> WireResult<PropertyDef> {
    let key = reader.read_string()?;
    let type_name = reader.read_string()?;
    let ty = PropertyType::from_name(&type_name).unwrap_or(PropertyType::String);
    let default_value = if reader.read_bool()? {
        Some(reader.read_string()?)
    } else {
        None
    };
    let display_name = reader.read_string()?;
    let category = reader.read_string()?;
    let order = reader.read_varint()?;

    let mut prop = PropertyDef::new(key, ty).with_display(display_name, category, order);
    prop.default_value = default_value;

    let hint_count = reader.read_count("hint", MAX_HINTS)?;
    for _ in 0..hint_count {
        let key = reader.read_string()?;
        let value = reader.read_string()?;
        prop.editor_hints.insert(key, value);
    }
    Ok(prop)
}

fn read_scene_list(reader: &mut WireReader<'_>) -> WireResult<SceneList> {
    let count = reader.read_count("scene", MAX_SCENES)?;
    let mut scenes = Vec::with_capacity(reader.capacity_for(count));
    for _ in 0..count {
        let scene_id = reader.read_string()?;
        let display_name = reader.read_string()?;
        scenes.push(SceneInfo { scene_id, display_name });
    }
    let active_scene_id = reader.read_string()?;
    Ok(SceneList {
        scenes,
        active_scene_id,
    })
}

// ----------------------------------------------------------------------
// Size estimation
// ----------------------------------------------------------------------

/// Exact encoded size of `message`
pub fn estimate_size(message: &Message) -> usize {
    let body = match message {
        Message::Hello(hello) => varint_size(hello.protocol_version),
        Message::ServerHello(hello) => varint_size(hello.protocol_version),
        Message::Ping(ping) => long_size(ping.nonce),
        Message::Pong(pong) => long_size(pong.nonce),
        Message::SceneOpBatch(batch) => op_batch_size(batch),
        Message::SceneOpAck(ack) => op_ack_size(ack),
        Message::SceneSnapshotRequest(request) => long_size(request.request_id),
        Message::SceneSnapshot(snapshot) => scene_snapshot_size(snapshot),
        Message::SchemaSnapshot(schema) => schema_snapshot_size(schema),
        Message::SceneList(list) => scene_list_size(list),
        Message::SceneSelect(select) => string_size(&select.scene_id),
    };
    varint_size(message.message_type().id()) + body
}

#[inline]
fn count_size(count: usize) -> usize {
    varint_size(count as u32)
}

fn op_batch_size(batch: &SceneOpBatch) -> usize {
    let mut size = long_size(batch.batch_id) + 1 + count_size(batch.ops.len());
    for op in &batch.ops {
        size += varint_size(op.kind().id());
        size += match op {
            SceneOp::CreateNode { parent_id, name, type_id } => {
                long_size(*parent_id) + string_size(name) + string_size(type_id)
            }
            SceneOp::QueueFree { node_id } => long_size(*node_id),
            SceneOp::Rename { node_id, new_name } => long_size(*node_id) + string_size(new_name),
            SceneOp::SetProperty { node_id, key, value } => {
                long_size(*node_id) + string_size(key) + string_size(value)
            }
            SceneOp::RemoveProperty { node_id, key } => long_size(*node_id) + string_size(key),
            SceneOp::Reparent { node_id, new_parent_id, index } => {
                long_size(*node_id) + long_size(*new_parent_id) + varint_size(*index as u32)
            }
        };
    }
    size
}

fn op_ack_size(ack: &SceneOpAck) -> usize {
    let mut size = long_size(ack.batch_id) + long_size(ack.scene_revision) + count_size(ack.results.len());
    for result in &ack.results {
        size += long_size(result.target_id)
            + long_size(result.created_id)
            + 1
            + varint_size(result.error.id())
            + string_size(&result.message);
    }
    size
}

fn scene_snapshot_size(snapshot: &SceneSnapshot) -> usize {
    let mut size = long_size(snapshot.request_id) + long_size(snapshot.revision) + count_size(snapshot.nodes.len());
    for node in &snapshot.nodes {
        size += long_size(node.node_id)
            + long_size(node.parent_id)
            + string_size(&node.name)
            + string_size(&node.type_id)
            + count_size(node.properties.len());
        for prop in &node.properties {
            size += string_size(&prop.key) + string_size(&prop.value);
        }
    }
    size
}

fn schema_snapshot_size(schema: &SchemaSnapshot) -> usize {
    let mut size = long_size(schema.schema_revision) + count_size(schema.types.len());
    for def in &schema.types {
        size += string_size(&def.type_id)
            + string_size(&def.display_name)
            + string_size(&def.category)
            + varint_size(def.order)
            + count_size(def.properties.len());
        for prop in def.properties.values() {
            size += string_size(&prop.key) + string_size(prop.ty.name()) + 1;
            if let Some(default) = &prop.default_value {
                size += string_size(default);
            }
            size += string_size(&prop.display_name)
                + string_size(&prop.category)
                + varint_size(prop.order)
                + count_size(prop.editor_hints.len());
            for (key, value) in &prop.editor_hints {
                size += string_size(key) + string_size(value);
            }
        }
    }
    size
}

fn scene_list_size(list: &SceneList) -> usize {
    let mut size = count_size(list.scenes.len());
    for scene in &list.scenes {
        size += string_size(&scene.scene_id) + string_size(&scene.display_name);
    }
    size + string_size(&list.active_scene_id)
}
