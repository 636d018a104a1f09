//! Wire protocol for the Stewart platform controller.
//!
//! A single byte stream carries both 15-byte binary sample frames and
//! newline (or `X`) terminated text commands. [`StreamDecoder`] separates the
//! two and yields [`Event`]s; [`decode_datagram`] handles transports that
//! deliver whole packets.

mod command;
mod decoder;
mod frame;

pub use command::{
    Command, CommandError, Line, MAX_PULSE_PER_RAD, MAX_TELEMETRY_HZ, PULSE_MAX_US, PULSE_MIN_US,
    Query, RawSample, parse_line,
};
pub use decoder::{Event, MAX_LINE, StreamDecoder};
pub use frame::{
    Channels, FRAME_LEN, FrameDecoder, FrameError, FrameStep, PAYLOAD_LEN, SYNC, checksum,
    decode_datagram, decode_payload, encode,
};

/// Revision of this command set, reported by `VERSION?`.
pub const PROTOCOL_VERSION: u32 = 1;

#[cfg(test)]
mod testing;
