//! PC5-S message encoding/decoding
//!
//! This module provides functions to encode and decode PC5-S messages for
//! transmission over UDP.
//!
//! Wire layout: a one-byte compatibility marker, the three-byte protocol
//! version, the message type byte, the 32-bit source L2 identifier, then the
//! message-specific fields, all big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::{
    version, DirectLinkEstablishmentAccept, DirectLinkEstablishmentReject,
    DirectLinkEstablishmentRequest, DirectLinkReleaseAccept, DirectLinkReleaseRequest,
    DiscoveryAnnouncement, DiscoveryResponse, DiscoverySolicitation, EstablishmentRejectCause,
    MessageType, Pc5Message, ReleaseCause, Vector3,
};

/// PC5 compatibility marker
const PC5_COMPAT_MARKER: u8 = 0x05;

/// Fixed header size: marker + version + type + source L2 ID
const HEADER_LEN: usize = 1 + 3 + 1 + 4;

/// Errors that can occur during PC5-S message encoding/decoding
#[derive(Debug, Error)]
pub enum Pc5CodecError {
    /// Invalid compatibility marker
    #[error("invalid PC5 compatibility marker: expected 0x05, got 0x{0:02X}")]
    InvalidCompatMarker(u8),

    /// Version mismatch
    #[error("PC5 version mismatch: expected {}.{}.{}, got {}.{}.{}",
            version::MAJOR, version::MINOR, version::PATCH, .0, .1, .2)]
    VersionMismatch(u8, u8, u8),

    /// Unknown message type
    #[error("unknown PC5 message type: {0}")]
    UnknownMessageType(u8),

    /// Unknown cause value
    #[error("unknown cause value: {0}")]
    UnknownCause(u8),

    /// Buffer too short
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },
}

/// Result type for PC5 codec operations
pub type Result<T> = std::result::Result<T, Pc5CodecError>;

/// Encodes a PC5-S message into a byte buffer
pub fn encode(msg: &Pc5Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    encode_into(msg, &mut buf);
    buf.freeze()
}

/// Encodes a PC5-S message into an existing buffer
pub fn encode_into(msg: &Pc5Message, buf: &mut BytesMut) {
    // Compatibility marker
    buf.put_u8(PC5_COMPAT_MARKER);

    // Version
    buf.put_u8(version::MAJOR);
    buf.put_u8(version::MINOR);
    buf.put_u8(version::PATCH);

    // Message type
    buf.put_u8(msg.message_type() as u8);

    // Source L2 ID
    buf.put_u32(msg.source_l2_id());

    // Message-specific encoding
    match msg {
        Pc5Message::DiscoveryAnnouncement(m) => {
            buf.put_u32(m.relay_code);
            put_vector3(buf, m.sim_pos);
        }
        Pc5Message::DiscoverySolicitation(m) => {
            buf.put_u32(m.relay_code);
            put_vector3(buf, m.sim_pos);
        }
        Pc5Message::DiscoveryResponse(m) => {
            buf.put_u32(m.relay_code);
            put_vector3(buf, m.sim_pos);
        }
        Pc5Message::DirectLinkEstablishmentRequest(m) => {
            buf.put_u32(m.target_l2_id);
            buf.put_u32(m.relay_code);
        }
        Pc5Message::DirectLinkEstablishmentAccept(m) => {
            buf.put_u32(m.target_l2_id);
            buf.put_u32(m.relay_code);
        }
        Pc5Message::DirectLinkEstablishmentReject(m) => {
            buf.put_u32(m.target_l2_id);
            buf.put_u32(m.relay_code);
            buf.put_u8(m.cause as u8);
        }
        Pc5Message::DirectLinkReleaseRequest(m) => {
            buf.put_u32(m.target_l2_id);
            buf.put_u32(m.relay_code);
            buf.put_u8(m.cause as u8);
        }
        Pc5Message::DirectLinkReleaseAccept(m) => {
            buf.put_u32(m.target_l2_id);
            buf.put_u32(m.relay_code);
        }
    }
}

fn put_vector3(buf: &mut BytesMut, pos: Vector3) {
    buf.put_i32(pos.x);
    buf.put_i32(pos.y);
    buf.put_i32(pos.z);
}

/// Decodes a PC5-S message from a byte buffer
pub fn decode(data: &[u8]) -> Result<Pc5Message> {
    let mut buf = data;

    if buf.len() < HEADER_LEN {
        return Err(Pc5CodecError::BufferTooShort {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }

    // Compatibility marker
    let marker = buf.get_u8();
    if marker != PC5_COMPAT_MARKER {
        return Err(Pc5CodecError::InvalidCompatMarker(marker));
    }

    // Version check
    let major = buf.get_u8();
    let minor = buf.get_u8();
    let patch = buf.get_u8();
    if major != version::MAJOR || minor != version::MINOR || patch != version::PATCH {
        return Err(Pc5CodecError::VersionMismatch(major, minor, patch));
    }

    // Message type
    let msg_type_byte = buf.get_u8();
    let msg_type = MessageType::from_u8(msg_type_byte)
        .ok_or(Pc5CodecError::UnknownMessageType(msg_type_byte))?;

    // Source L2 ID
    let source_l2_id = buf.get_u32();

    match msg_type {
        MessageType::Reserved => Err(Pc5CodecError::UnknownMessageType(0)),
        MessageType::DiscoveryAnnouncement => {
            let (relay_code, sim_pos) = decode_discovery_body(buf)?;
            Ok(Pc5Message::DiscoveryAnnouncement(DiscoveryAnnouncement {
                source_l2_id,
                relay_code,
                sim_pos,
            }))
        }
        MessageType::DiscoverySolicitation => {
            let (relay_code, sim_pos) = decode_discovery_body(buf)?;
            Ok(Pc5Message::DiscoverySolicitation(DiscoverySolicitation {
                source_l2_id,
                relay_code,
                sim_pos,
            }))
        }
        MessageType::DiscoveryResponse => {
            let (relay_code, sim_pos) = decode_discovery_body(buf)?;
            Ok(Pc5Message::DiscoveryResponse(DiscoveryResponse {
                source_l2_id,
                relay_code,
                sim_pos,
            }))
        }
        MessageType::DirectLinkEstablishmentRequest => {
            let (target_l2_id, relay_code) = decode_link_body(buf)?;
            Ok(Pc5Message::DirectLinkEstablishmentRequest(
                DirectLinkEstablishmentRequest {
                    source_l2_id,
                    target_l2_id,
                    relay_code,
                },
            ))
        }
        MessageType::DirectLinkEstablishmentAccept => {
            let (target_l2_id, relay_code) = decode_link_body(buf)?;
            Ok(Pc5Message::DirectLinkEstablishmentAccept(
                DirectLinkEstablishmentAccept {
                    source_l2_id,
                    target_l2_id,
                    relay_code,
                },
            ))
        }
        MessageType::DirectLinkEstablishmentReject => {
            let (target_l2_id, relay_code, cause_byte) = decode_link_body_with_cause(buf)?;
            let cause = EstablishmentRejectCause::from_u8(cause_byte)
                .ok_or(Pc5CodecError::UnknownCause(cause_byte))?;
            Ok(Pc5Message::DirectLinkEstablishmentReject(
                DirectLinkEstablishmentReject {
                    source_l2_id,
                    target_l2_id,
                    relay_code,
                    cause,
                },
            ))
        }
        MessageType::DirectLinkReleaseRequest => {
            let (target_l2_id, relay_code, cause_byte) = decode_link_body_with_cause(buf)?;
            let cause =
                ReleaseCause::from_u8(cause_byte).ok_or(Pc5CodecError::UnknownCause(cause_byte))?;
            Ok(Pc5Message::DirectLinkReleaseRequest(DirectLinkReleaseRequest {
                source_l2_id,
                target_l2_id,
                relay_code,
                cause,
            }))
        }
        MessageType::DirectLinkReleaseAccept => {
            let (target_l2_id, relay_code) = decode_link_body(buf)?;
            Ok(Pc5Message::DirectLinkReleaseAccept(DirectLinkReleaseAccept {
                source_l2_id,
                target_l2_id,
                relay_code,
            }))
        }
    }
}

fn decode_discovery_body(mut buf: &[u8]) -> Result<(u32, Vector3)> {
    // relay_code(4) + position(12)
    if buf.len() < 16 {
        return Err(Pc5CodecError::BufferTooShort {
            needed: 16,
            available: buf.len(),
        });
    }
    let relay_code = buf.get_u32();
    let x = buf.get_i32();
    let y = buf.get_i32();
    let z = buf.get_i32();
    Ok((relay_code, Vector3::new(x, y, z)))
}

fn decode_link_body(mut buf: &[u8]) -> Result<(u32, u32)> {
    // target_l2_id(4) + relay_code(4)
    if buf.len() < 8 {
        return Err(Pc5CodecError::BufferTooShort {
            needed: 8,
            available: buf.len(),
        });
    }
    Ok((buf.get_u32(), buf.get_u32()))
}

fn decode_link_body_with_cause(mut buf: &[u8]) -> Result<(u32, u32, u8)> {
    // target_l2_id(4) + relay_code(4) + cause(1)
    if buf.len() < 9 {
        return Err(Pc5CodecError::BufferTooShort {
            needed: 9,
            available: buf.len(),
        });
    }
    Ok((buf.get_u32(), buf.get_u32(), buf.get_u8()))
}
