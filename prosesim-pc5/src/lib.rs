//! PC5 sidelink signalling for prosesim
//!
//! This crate defines the PC5-S message types exchanged between peer devices
//! over the simulated sidelink (discovery and direct-link signalling, 3GPP
//! TS 24.554) and the wire codec used to carry them over UDP.

pub mod codec;
pub mod protocol;

pub use codec::{decode, encode, encode_into, Pc5CodecError};
pub use protocol::{
    DirectLinkEstablishmentAccept, DirectLinkEstablishmentReject,
    DirectLinkEstablishmentRequest, DirectLinkReleaseAccept, DirectLinkReleaseRequest,
    DiscoveryAnnouncement, DiscoveryResponse, DiscoverySolicitation, EstablishmentRejectCause,
    MessageType, Pc5Message, ReleaseCause, Vector3,
};
