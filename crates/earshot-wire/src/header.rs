//! Control packet header
//!
//! Header is 3 bytes:
//! - Byte 0: Packet type
//! - Bytes 1-2: Payload length (LE)

use bytes::{Buf, BufMut};
use earshot_core::{EarshotError, EarshotResult};

/// Header size in bytes
pub const HEADER_SIZE: usize = 3;

/// Largest payload a control packet may carry
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Control packet type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlPacketType {
    CreateStream = 0x01,
    UpdateThreshold = 0x02,
    UpdatePosition = 0x03,
    AttachListener = 0x04,
    DetachListener = 0x05,
    DeleteStream = 0x06,
}

impl ControlPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(ControlPacketType::CreateStream),
            0x02 => Some(ControlPacketType::UpdateThreshold),
            0x03 => Some(ControlPacketType::UpdatePosition),
            0x04 => Some(ControlPacketType::AttachListener),
            0x05 => Some(ControlPacketType::DetachListener),
            0x06 => Some(ControlPacketType::DeleteStream),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Packet header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: ControlPacketType,
    pub payload_len: u16,
}

impl PacketHeader {
    pub fn new(packet_type: ControlPacketType, payload_len: u16) -> Self {
        PacketHeader {
            packet_type,
            payload_len,
        }
    }

    /// Parse header from the front of `buf`, advancing it
    pub fn parse(buf: &mut impl Buf) -> EarshotResult<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(EarshotError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: buf.remaining(),
            });
        }

        let type_byte = buf.get_u8();
        let packet_type = ControlPacketType::from_byte(type_byte)
            .ok_or(EarshotError::UnknownPacketType(type_byte))?;
        let payload_len = buf.get_u16_le();

        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(EarshotError::InvalidWireFormat(format!(
                "Payload too large: {} > {}",
                payload_len, MAX_PAYLOAD_SIZE
            )));
        }

        Ok(PacketHeader {
            packet_type,
            payload_len,
        })
    }

    /// Write header into `buf`
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.packet_type.to_byte());
        buf.put_u16_le(self.payload_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = PacketHeader::new(ControlPacketType::AttachListener, 10);
        let mut buf = Vec::new();
        header.serialize(&mut buf);
        assert_eq!(buf, vec![0x04, 10, 0]);

        let parsed = PacketHeader::parse(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_too_short() {
        let buf = [0x01u8, 0x00];
        let err = PacketHeader::parse(&mut &buf[..]).unwrap_err();
        assert!(matches!(
            err,
            EarshotError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_header_unknown_type() {
        let buf = [0x7Fu8, 0x00, 0x00];
        let err = PacketHeader::parse(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, EarshotError::UnknownPacketType(0x7F)));
    }

    #[test]
    fn test_header_rejects_oversized_payload() {
        let buf = [0x01u8, 0xFF, 0xFF];
        assert!(PacketHeader::parse(&mut &buf[..]).is_err());
    }
}
