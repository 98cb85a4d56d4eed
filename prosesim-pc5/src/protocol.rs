//! PC5-S message types
//!
//! This module defines the sidelink signalling messages used for relay
//! discovery and ProSe direct-link management between peer devices.
//!
//! # 3GPP Reference
//!
//! - TS 23.304: Proximity-based Services (ProSe)
//! - TS 24.554: ProSe PC5 signalling protocol

use std::fmt;

/// PC5 signalling protocol version information
pub mod version {
    /// Major version number
    pub const MAJOR: u8 = 1;
    /// Minor version number
    pub const MINOR: u8 = 0;
    /// Patch version number
    pub const PATCH: u8 = 0;
}

/// PC5-S message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Reserved message type
    Reserved = 0,
    /// Model A relay discovery announcement
    DiscoveryAnnouncement = 1,
    /// Model B relay discovery solicitation
    DiscoverySolicitation = 2,
    /// Model B relay discovery response
    DiscoveryResponse = 3,
    /// Direct link establishment request
    DirectLinkEstablishmentRequest = 4,
    /// Direct link establishment accept
    DirectLinkEstablishmentAccept = 5,
    /// Direct link establishment reject
    DirectLinkEstablishmentReject = 6,
    /// Direct link release request
    DirectLinkReleaseRequest = 7,
    /// Direct link release accept
    DirectLinkReleaseAccept = 8,
}

impl MessageType {
    /// Creates a MessageType from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Reserved),
            1 => Some(Self::DiscoveryAnnouncement),
            2 => Some(Self::DiscoverySolicitation),
            3 => Some(Self::DiscoveryResponse),
            4 => Some(Self::DirectLinkEstablishmentRequest),
            5 => Some(Self::DirectLinkEstablishmentAccept),
            6 => Some(Self::DirectLinkEstablishmentReject),
            7 => Some(Self::DirectLinkReleaseRequest),
            8 => Some(Self::DirectLinkReleaseAccept),
            _ => None,
        }
    }
}

/// Cause value carried in an establishment reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EstablishmentRejectCause {
    /// The requested relay service code is not offered by this device
    ServiceNotOffered = 1,
    /// The target cannot accept further direct links
    Congestion = 2,
}

impl EstablishmentRejectCause {
    /// Creates a cause from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ServiceNotOffered),
            2 => Some(Self::Congestion),
            _ => None,
        }
    }
}

/// Cause value carried in a release request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReleaseCause {
    /// A different relay was selected for the same service
    RelayReselection = 1,
    /// The application requested disconnection
    ExplicitDisconnect = 2,
    /// The lower layer reported the link unusable
    LinkFailure = 3,
}

impl ReleaseCause {
    /// Creates a cause from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RelayReselection),
            2 => Some(Self::ExplicitDisconnect),
            3 => Some(Self::LinkFailure),
            _ => None,
        }
    }
}

impl fmt::Display for ReleaseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseCause::RelayReselection => write!(f, "relay reselection"),
            ReleaseCause::ExplicitDisconnect => write!(f, "explicit disconnect"),
            ReleaseCause::LinkFailure => write!(f, "link failure"),
        }
    }
}

/// 3D position vector carried in discovery messages
///
/// The receiver derives the raw RSRP sample for the sender from the distance
/// between the two simulated positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector3 {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Z coordinate
    pub z: i32,
}

impl Vector3 {
    /// Creates a new Vector3 with the given coordinates
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Vector3) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// PC5-S message enum containing all message variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pc5Message {
    /// Model A relay announcement, broadcast by relay devices
    DiscoveryAnnouncement(DiscoveryAnnouncement),
    /// Model B solicitation, broadcast by remote devices
    DiscoverySolicitation(DiscoverySolicitation),
    /// Model B response, unicast by a matching relay
    DiscoveryResponse(DiscoveryResponse),
    /// Direct link establishment request
    DirectLinkEstablishmentRequest(DirectLinkEstablishmentRequest),
    /// Direct link establishment accept
    DirectLinkEstablishmentAccept(DirectLinkEstablishmentAccept),
    /// Direct link establishment reject
    DirectLinkEstablishmentReject(DirectLinkEstablishmentReject),
    /// Direct link release request
    DirectLinkReleaseRequest(DirectLinkReleaseRequest),
    /// Direct link release accept
    DirectLinkReleaseAccept(DirectLinkReleaseAccept),
}

impl Pc5Message {
    /// Returns the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::DiscoveryAnnouncement(_) => MessageType::DiscoveryAnnouncement,
            Self::DiscoverySolicitation(_) => MessageType::DiscoverySolicitation,
            Self::DiscoveryResponse(_) => MessageType::DiscoveryResponse,
            Self::DirectLinkEstablishmentRequest(_) => MessageType::DirectLinkEstablishmentRequest,
            Self::DirectLinkEstablishmentAccept(_) => MessageType::DirectLinkEstablishmentAccept,
            Self::DirectLinkEstablishmentReject(_) => MessageType::DirectLinkEstablishmentReject,
            Self::DirectLinkReleaseRequest(_) => MessageType::DirectLinkReleaseRequest,
            Self::DirectLinkReleaseAccept(_) => MessageType::DirectLinkReleaseAccept,
        }
    }

    /// Returns the L2 identifier of the sending device
    pub fn source_l2_id(&self) -> u32 {
        match self {
            Self::DiscoveryAnnouncement(m) => m.source_l2_id,
            Self::DiscoverySolicitation(m) => m.source_l2_id,
            Self::DiscoveryResponse(m) => m.source_l2_id,
            Self::DirectLinkEstablishmentRequest(m) => m.source_l2_id,
            Self::DirectLinkEstablishmentAccept(m) => m.source_l2_id,
            Self::DirectLinkEstablishmentReject(m) => m.source_l2_id,
            Self::DirectLinkReleaseRequest(m) => m.source_l2_id,
            Self::DirectLinkReleaseAccept(m) => m.source_l2_id,
        }
    }

    /// Returns the relay service code the message refers to
    pub fn relay_code(&self) -> u32 {
        match self {
            Self::DiscoveryAnnouncement(m) => m.relay_code,
            Self::DiscoverySolicitation(m) => m.relay_code,
            Self::DiscoveryResponse(m) => m.relay_code,
            Self::DirectLinkEstablishmentRequest(m) => m.relay_code,
            Self::DirectLinkEstablishmentAccept(m) => m.relay_code,
            Self::DirectLinkEstablishmentReject(m) => m.relay_code,
            Self::DirectLinkReleaseRequest(m) => m.relay_code,
            Self::DirectLinkReleaseAccept(m) => m.relay_code,
        }
    }

    /// Returns the simulated position carried by discovery messages
    pub fn sim_pos(&self) -> Option<Vector3> {
        match self {
            Self::DiscoveryAnnouncement(m) => Some(m.sim_pos),
            Self::DiscoverySolicitation(m) => Some(m.sim_pos),
            Self::DiscoveryResponse(m) => Some(m.sim_pos),
            _ => None,
        }
    }

    /// Human-readable message name for signalling traces
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::DiscoveryAnnouncement(_) => "PROSE DISCOVERY ANNOUNCEMENT",
            Self::DiscoverySolicitation(_) => "PROSE DISCOVERY SOLICITATION",
            Self::DiscoveryResponse(_) => "PROSE DISCOVERY RESPONSE",
            Self::DirectLinkEstablishmentRequest(_) => "PROSE DIRECT LINK ESTABLISHMENT REQUEST",
            Self::DirectLinkEstablishmentAccept(_) => "PROSE DIRECT LINK ESTABLISHMENT ACCEPT",
            Self::DirectLinkEstablishmentReject(_) => "PROSE DIRECT LINK ESTABLISHMENT REJECT",
            Self::DirectLinkReleaseRequest(_) => "PROSE DIRECT LINK RELEASE REQUEST",
            Self::DirectLinkReleaseAccept(_) => "PROSE DIRECT LINK RELEASE ACCEPT",
        }
    }
}

/// Model A announcement, broadcast periodically by relay devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryAnnouncement {
    /// L2 identifier of the announcing relay
    pub source_l2_id: u32,
    /// Relay service code being offered
    pub relay_code: u32,
    /// Simulated position of the announcing relay
    pub sim_pos: Vector3,
}

/// Model B solicitation, broadcast periodically by remote devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySolicitation {
    /// L2 identifier of the soliciting remote
    pub source_l2_id: u32,
    /// Relay service code being sought
    pub relay_code: u32,
    /// Simulated position of the soliciting remote
    pub sim_pos: Vector3,
}

/// Model B response, unicast by a relay matching a solicitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryResponse {
    /// L2 identifier of the responding relay
    pub source_l2_id: u32,
    /// Relay service code being offered
    pub relay_code: u32,
    /// Simulated position of the responding relay
    pub sim_pos: Vector3,
}

/// Direct link establishment request, sent by the initiating device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkEstablishmentRequest {
    /// L2 identifier of the initiator
    pub source_l2_id: u32,
    /// L2 identifier of the target
    pub target_l2_id: u32,
    /// Relay service code of the link (0 for plain unicast)
    pub relay_code: u32,
}

/// Direct link establishment accept, sent by the target device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkEstablishmentAccept {
    /// L2 identifier of the accepting target
    pub source_l2_id: u32,
    /// L2 identifier of the initiator
    pub target_l2_id: u32,
    /// Relay service code of the link
    pub relay_code: u32,
}

/// Direct link establishment reject, sent by the target device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkEstablishmentReject {
    /// L2 identifier of the rejecting target
    pub source_l2_id: u32,
    /// L2 identifier of the initiator
    pub target_l2_id: u32,
    /// Relay service code of the rejected link
    pub relay_code: u32,
    /// Reject cause
    pub cause: EstablishmentRejectCause,
}

/// Direct link release request, sent by the releasing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkReleaseRequest {
    /// L2 identifier of the releasing device
    pub source_l2_id: u32,
    /// L2 identifier of the peer
    pub target_l2_id: u32,
    /// Relay service code of the link
    pub relay_code: u32,
    /// Release cause
    pub cause: ReleaseCause,
}

/// Direct link release accept, sent by the peer of the releasing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectLinkReleaseAccept {
    /// L2 identifier of the accepting peer
    pub source_l2_id: u32,
    /// L2 identifier of the releasing device
    pub target_l2_id: u32,
    /// Relay service code of the link
    pub relay_code: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_from_u8() {
        assert_eq!(MessageType::from_u8(1), Some(MessageType::DiscoveryAnnouncement));
        assert_eq!(
            MessageType::from_u8(4),
            Some(MessageType::DirectLinkEstablishmentRequest)
        );
        assert_eq!(MessageType::from_u8(8), Some(MessageType::DirectLinkReleaseAccept));
        assert_eq!(MessageType::from_u8(9), None);
    }

    #[test]
    fn test_message_accessors() {
        let msg = Pc5Message::DiscoveryAnnouncement(DiscoveryAnnouncement {
            source_l2_id: 100,
            relay_code: 5,
            sim_pos: Vector3::new(1, 2, 3),
        });
        assert_eq!(msg.message_type(), MessageType::DiscoveryAnnouncement);
        assert_eq!(msg.source_l2_id(), 100);
        assert_eq!(msg.relay_code(), 5);
        assert_eq!(msg.sim_pos(), Some(Vector3::new(1, 2, 3)));
    }

    #[test]
    fn test_link_messages_carry_no_position() {
        let msg = Pc5Message::DirectLinkEstablishmentRequest(DirectLinkEstablishmentRequest {
            source_l2_id: 1,
            target_l2_id: 2,
            relay_code: 5,
        });
        assert!(msg.sim_pos().is_none());
    }

    #[test]
    fn test_vector3_distance() {
        let a = Vector3::new(0, 0, 0);
        let b = Vector3::new(3, 4, 0);
        assert!((a.distance_to(&b) - 5.0).abs() < f64::EPSILON);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_release_cause_roundtrip() {
        for cause in [
            ReleaseCause::RelayReselection,
            ReleaseCause::ExplicitDisconnect,
            ReleaseCause::LinkFailure,
        ] {
            assert_eq!(ReleaseCause::from_u8(cause as u8), Some(cause));
        }
        assert_eq!(ReleaseCause::from_u8(0), None);
    }

    #[test]
    fn test_message_name() {
        let msg = Pc5Message::DirectLinkReleaseRequest(DirectLinkReleaseRequest {
            source_l2_id: 1,
            target_l2_id: 2,
            relay_code: 5,
            cause: ReleaseCause::RelayReselection,
        });
        assert_eq!(msg.message_name(), "PROSE DIRECT LINK RELEASE REQUEST");
    }
}
