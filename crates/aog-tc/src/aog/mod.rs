//! The framed UDP wire protocol spoken with AgOpenGPS.

mod codec;
mod messages;

pub use codec::{checksum, encode_packet, AogPacket, Deframer, PACKET_START, RX_BUFFER_SIZE};
pub use messages::{
    heartbeat_payload, parse_section_control, parse_subnet_announce, SteerData, AOG_SOURCE,
    PGN_HEARTBEAT, PGN_SECTION_CONTROL, PGN_STEER_DATA, PGN_SUBNET_ANNOUNCE, TC_SOURCE,
};
