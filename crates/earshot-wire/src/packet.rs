//! Control packet encoding
//!
//! Payload layouts (all LE):
//! - CreateStream: stream u64, anchor tag u8 + body, threshold f32,
//!   capacity u32 (`u32::MAX` = unbounded), color u32, name len u8 + bytes
//! - UpdateThreshold: stream u64, threshold f32
//! - UpdatePosition: stream u64, x/y/z f32
//! - AttachListener / DetachListener: stream u64, participant u16
//! - DeleteStream: stream u64
//!
//! Anchor tags: 0 fixed (x/y/z f32), 1 participant (u16), 2 vehicle (u16),
//! 3 object (u16).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use earshot_core::{
    Anchor, Capacity, CreatePayload, EarshotError, EarshotResult, EntityId, EntityKind,
    ParticipantId, Position3D, StreamEvent, StreamId, StreamMetadata,
};

use crate::{ControlPacketType, PacketHeader, HEADER_SIZE};

const ANCHOR_FIXED: u8 = 0;
const ANCHOR_PARTICIPANT: u8 = 1;
const ANCHOR_VEHICLE: u8 = 2;
const ANCHOR_OBJECT: u8 = 3;

/// Wire value for an unbounded capacity
pub const CAPACITY_UNBOUNDED: u32 = u32::MAX;

fn packet_type_for(event: &StreamEvent) -> ControlPacketType {
    match event {
        StreamEvent::Create(_) => ControlPacketType::CreateStream,
        StreamEvent::ThresholdUpdate { .. } => ControlPacketType::UpdateThreshold,
        StreamEvent::PositionUpdate { .. } => ControlPacketType::UpdatePosition,
        StreamEvent::ListenerAttach { .. } => ControlPacketType::AttachListener,
        StreamEvent::ListenerDetach { .. } => ControlPacketType::DetachListener,
        StreamEvent::Destroy { .. } => ControlPacketType::DeleteStream,
    }
}

/// Encode an event as one control packet
pub fn encode_event(event: &StreamEvent) -> EarshotResult<Bytes> {
    let mut payload = BytesMut::with_capacity(32);
    payload.put_u64_le(event.stream().0);

    match event {
        StreamEvent::Create(create) => encode_create(create, &mut payload)?,
        StreamEvent::ThresholdUpdate { threshold, .. } => payload.put_f32_le(*threshold),
        StreamEvent::PositionUpdate { position, .. } => put_position(&mut payload, position),
        StreamEvent::ListenerAttach { participant, .. }
        | StreamEvent::ListenerDetach { participant, .. } => payload.put_u16_le(participant.0),
        StreamEvent::Destroy { .. } => {}
    }

    let payload_len = u16::try_from(payload.len()).map_err(|_| {
        EarshotError::InvalidWireFormat(format!("Payload too large: {}", payload.len()))
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    PacketHeader::new(packet_type_for(event), payload_len).serialize(&mut buf);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

fn encode_create(create: &CreatePayload, buf: &mut BytesMut) -> EarshotResult<()> {
    match create.anchor {
        Anchor::Fixed(position) => {
            buf.put_u8(ANCHOR_FIXED);
            put_position(buf, &position);
        }
        Anchor::Participant(id) => {
            buf.put_u8(ANCHOR_PARTICIPANT);
            buf.put_u16_le(id.0);
        }
        Anchor::Entity(entity) => {
            buf.put_u8(match entity.kind {
                EntityKind::Vehicle => ANCHOR_VEHICLE,
                EntityKind::Object => ANCHOR_OBJECT,
            });
            buf.put_u16_le(entity.slot);
        }
    }

    buf.put_f32_le(create.threshold);

    let capacity = match create.capacity {
        Capacity::Unbounded => CAPACITY_UNBOUNDED,
        // Anything at or past the sentinel is indistinguishable from unbounded
        Capacity::Limited(max) => {
            u32::try_from(max.min(CAPACITY_UNBOUNDED as usize - 1)).unwrap_or(CAPACITY_UNBOUNDED - 1)
        }
    };
    buf.put_u32_le(capacity);
    buf.put_u32_le(create.metadata.color);

    let name = create.metadata.name.as_bytes();
    let name_len = u8::try_from(name.len()).map_err(|_| EarshotError::NameTooLong {
        max: u8::MAX as usize,
        actual: name.len(),
    })?;
    buf.put_u8(name_len);
    buf.put_slice(name);
    Ok(())
}

fn put_position(buf: &mut impl BufMut, position: &Position3D) {
    buf.put_f32_le(position.x);
    buf.put_f32_le(position.y);
    buf.put_f32_le(position.z);
}

fn need(remaining: usize, expected: usize) -> EarshotResult<()> {
    if remaining < expected {
        return Err(EarshotError::BufferTooShort {
            expected,
            actual: remaining,
        });
    }
    Ok(())
}

fn get_position(buf: &mut impl Buf) -> EarshotResult<Position3D> {
    need(buf.remaining(), 12)?;
    Ok(Position3D::new(
        buf.get_f32_le(),
        buf.get_f32_le(),
        buf.get_f32_le(),
    ))
}

/// Decode one control packet, returning the event and the bytes consumed
pub fn decode_event(buf: &[u8]) -> EarshotResult<(StreamEvent, usize)> {
    let mut cursor = buf;
    let header = PacketHeader::parse(&mut cursor)?;
    let payload_len = header.payload_len as usize;
    need(cursor.remaining(), payload_len)?;

    let mut payload = &cursor[..payload_len];
    need(payload.remaining(), 8)?;
    let stream = StreamId::new(payload.get_u64_le());

    let event = match header.packet_type {
        ControlPacketType::CreateStream => StreamEvent::Create(decode_create(stream, &mut payload)?),
        ControlPacketType::UpdateThreshold => {
            need(payload.remaining(), 4)?;
            StreamEvent::ThresholdUpdate {
                stream,
                threshold: payload.get_f32_le(),
            }
        }
        ControlPacketType::UpdatePosition => StreamEvent::PositionUpdate {
            stream,
            position: get_position(&mut payload)?,
        },
        ControlPacketType::AttachListener => {
            need(payload.remaining(), 2)?;
            StreamEvent::ListenerAttach {
                stream,
                participant: ParticipantId::new(payload.get_u16_le()),
            }
        }
        ControlPacketType::DetachListener => {
            need(payload.remaining(), 2)?;
            StreamEvent::ListenerDetach {
                stream,
                participant: ParticipantId::new(payload.get_u16_le()),
            }
        }
        ControlPacketType::DeleteStream => StreamEvent::Destroy { stream },
    };

    if payload.has_remaining() {
        return Err(EarshotError::InvalidWireFormat(format!(
            "{} trailing payload bytes",
            payload.remaining()
        )));
    }

    Ok((event, HEADER_SIZE + payload_len))
}

fn decode_create(stream: StreamId, buf: &mut &[u8]) -> EarshotResult<CreatePayload> {
    need(buf.remaining(), 1)?;
    let anchor = match buf.get_u8() {
        ANCHOR_FIXED => Anchor::Fixed(get_position(buf)?),
        tag @ (ANCHOR_PARTICIPANT | ANCHOR_VEHICLE | ANCHOR_OBJECT) => {
            need(buf.remaining(), 2)?;
            let slot = buf.get_u16_le();
            match tag {
                ANCHOR_PARTICIPANT => Anchor::Participant(ParticipantId::new(slot)),
                ANCHOR_VEHICLE => Anchor::Entity(EntityId::vehicle(slot)),
                _ => Anchor::Entity(EntityId::object(slot)),
            }
        }
        tag => return Err(EarshotError::UnknownAnchorTag(tag)),
    };

    need(buf.remaining(), 13)?;
    let threshold = buf.get_f32_le();
    let capacity = match buf.get_u32_le() {
        CAPACITY_UNBOUNDED => Capacity::Unbounded,
        max => Capacity::Limited(max as usize),
    };
    let color = buf.get_u32_le();
    let name_len = buf.get_u8() as usize;
    need(buf.remaining(), name_len)?;
    let name = String::from_utf8(buf[..name_len].to_vec())
        .map_err(|_| EarshotError::InvalidWireFormat("Stream name is not UTF-8".into()))?;
    buf.advance(name_len);

    CreatePayload::build(stream, anchor, threshold, capacity, StreamMetadata::new(name, color))
}

/// Decode every packet in a concatenated buffer
pub fn decode_all(mut buf: &[u8]) -> EarshotResult<Vec<StreamEvent>> {
    let mut events = Vec::new();
    while !buf.is_empty() {
        let (event, used) = decode_event(buf)?;
        events.push(event);
        buf = &buf[used..];
    }
    Ok(events)
}
