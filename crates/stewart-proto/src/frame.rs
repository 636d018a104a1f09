use stewart_core::AXIS_COUNT;
use thiserror::Error;

/// Frame header.
pub const SYNC: [u8; 2] = [0xAA, 0x55];
/// Six little-endian u16 channels.
pub const PAYLOAD_LEN: usize = 2 * AXIS_COUNT;
/// Sync, payload and the XOR checksum.
pub const FRAME_LEN: usize = SYNC.len() + PAYLOAD_LEN + 1;

/// Raw channel values as carried on the wire.
pub type Channels = [u16; AXIS_COUNT];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("datagram of {0} bytes, expected {PAYLOAD_LEN} or {FRAME_LEN}")]
    Length(usize),

    #[error("bad sync bytes {0:#04x} {1:#04x}")]
    Sync(u8, u8),

    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    Checksum { computed: u8, received: u8 },
}

pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

pub fn encode(channels: &Channels) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..2].copy_from_slice(&SYNC);
    for (i, value) in channels.iter().enumerate() {
        frame[2 + 2 * i..4 + 2 * i].copy_from_slice(&value.to_le_bytes());
    }
    frame[FRAME_LEN - 1] = checksum(&frame[2..2 + PAYLOAD_LEN]);
    frame
}

pub fn decode_payload(payload: &[u8; PAYLOAD_LEN]) -> Channels {
    std::array::from_fn(|i| u16::from_le_bytes([payload[2 * i], payload[2 * i + 1]]))
}

fn verify(payload: &[u8], received: u8) -> Result<(), FrameError> {
    let computed = checksum(payload);
    if computed == received {
        Ok(())
    } else {
        Err(FrameError::Checksum { computed, received })
    }
}

/// Decode a self-contained datagram from an integrity-checked transport:
/// either the bare payload or a complete frame.
pub fn decode_datagram(bytes: &[u8]) -> Result<Channels, FrameError> {
    match bytes.len() {
        PAYLOAD_LEN => {
            let mut payload = [0u8; PAYLOAD_LEN];
            payload.copy_from_slice(bytes);
            Ok(decode_payload(&payload))
        }
        FRAME_LEN => {
            if bytes[..2] != SYNC {
                return Err(FrameError::Sync(bytes[0], bytes[1]));
            }
            let mut payload = [0u8; PAYLOAD_LEN];
            payload.copy_from_slice(&bytes[2..2 + PAYLOAD_LEN]);
            verify(&payload, bytes[FRAME_LEN - 1])?;
            Ok(decode_payload(&payload))
        }
        len => Err(FrameError::Length(len)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitSync0,
    AwaitSync1,
    /// Payload bytes plus the trailing checksum.
    Body { buf: [u8; PAYLOAD_LEN + 1], len: usize },
}

/// What the frame state machine did with one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStep {
    /// Not framing; the byte belongs to the text grammar.
    Pass,
    /// Held as a possible first sync byte.
    Held,
    /// Sync complete, a frame body follows.
    Started,
    /// Stored as part of the frame body.
    Consumed,
    Frame(Channels),
    Rejected(FrameError),
}

/// Byte-at-a-time frame sync, accumulation and checksum verification.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: State,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::AwaitSync0,
        }
    }

    pub fn push(&mut self, byte: u8) -> FrameStep {
        match &mut self.state {
            State::AwaitSync0 => {
                if byte == SYNC[0] {
                    self.state = State::AwaitSync1;
                    FrameStep::Held
                } else {
                    FrameStep::Pass
                }
            }
            State::AwaitSync1 => {
                if byte == SYNC[1] {
                    self.state = State::Body {
                        buf: [0; PAYLOAD_LEN + 1],
                        len: 0,
                    };
                    FrameStep::Started
                } else if byte == SYNC[0] {
                    // Treat the repeat as a fresh first sync byte
                    FrameStep::Held
                } else {
                    self.state = State::AwaitSync0;
                    FrameStep::Pass
                }
            }
            State::Body { buf, len } => {
                buf[*len] = byte;
                *len += 1;
                if *len < buf.len() {
                    return FrameStep::Consumed;
                }
                let mut payload = [0u8; PAYLOAD_LEN];
                payload.copy_from_slice(&buf[..PAYLOAD_LEN]);
                let received = buf[PAYLOAD_LEN];
                self.state = State::AwaitSync0;
                match verify(&payload, received) {
                    Ok(()) => FrameStep::Frame(decode_payload(&payload)),
                    Err(err) => FrameStep::Rejected(err),
                }
            }
        }
    }

    /// True while a frame body is being accumulated.
    pub fn in_frame(&self) -> bool {
        matches!(self.state, State::Body { .. })
    }

    pub fn reset(&mut self) {
        self.state = State::AwaitSync0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNELS: Channels = [2047, 0, 4095, 1, 0xBEEF, 0x0100];

    fn run(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<FrameStep> {
        bytes.iter().map(|b| decoder.push(*b)).collect()
    }

    #[test]
    fn encodes_little_endian_with_xor() {
        let frame = encode(&[0x0102, 0, 0, 0, 0, 0xFF00]);
        assert_eq!(&frame[..4], &[0xAA, 0x55, 0x02, 0x01]);
        assert_eq!(&frame[12..14], &[0x00, 0xFF]);
        assert_eq!(frame[14], 0x02 ^ 0x01 ^ 0xFF);
    }

    #[test]
    fn decodes_a_well_formed_frame() {
        let mut decoder = FrameDecoder::new();
        let steps = run(&mut decoder, &encode(&CHANNELS));
        assert_eq!(steps[0], FrameStep::Held);
        assert_eq!(steps[1], FrameStep::Started);
        assert!(steps[2..14].iter().all(|s| *s == FrameStep::Consumed));
        assert_eq!(steps[14], FrameStep::Frame(CHANNELS));
        assert!(!decoder.in_frame());
    }

    #[test]
    fn single_bit_flips_are_rejected() {
        bolero::check!().with_type::<(u8, u8)>().for_each(|(byte, bit)| {
            let mut frame = encode(&CHANNELS);
            let index = 2 + usize::from(*byte) % PAYLOAD_LEN;
            frame[index] ^= 1 << (bit % 8);

            let mut decoder = FrameDecoder::new();
            let steps = run(&mut decoder, &frame);
            assert!(matches!(steps[14], FrameStep::Rejected(FrameError::Checksum { .. })));
            assert!(!steps.iter().any(|s| matches!(s, FrameStep::Frame(_))));
        });
    }

    #[test]
    fn sync_mismatch_restarts() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(0xAA), FrameStep::Held);
        assert_eq!(decoder.push(b'1'), FrameStep::Pass);
        assert_eq!(decoder.push(b'2'), FrameStep::Pass);

        // Repeated first sync byte keeps waiting for the second
        let mut bytes = vec![0xAA];
        bytes.extend_from_slice(&encode(&CHANNELS));
        let steps = run(&mut decoder, &bytes);
        assert_eq!(steps.last(), Some(&FrameStep::Frame(CHANNELS)));
    }

    #[test]
    fn repeated_first_sync_byte_still_frames() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(0xAA), FrameStep::Held);
        assert_eq!(decoder.push(0xAA), FrameStep::Held);
        assert_eq!(decoder.push(0x55), FrameStep::Started);
        let steps = run(&mut decoder, &encode(&CHANNELS)[SYNC.len()..]);
        assert_eq!(steps.last(), Some(&FrameStep::Frame(CHANNELS)));
    }

    #[test]
    fn datagrams() {
        let frame = encode(&CHANNELS);
        assert_eq!(decode_datagram(&frame), Ok(CHANNELS));
        assert_eq!(decode_datagram(&frame[2..14]), Ok(CHANNELS));

        let mut bad = frame;
        bad[1] = 0x56;
        assert_eq!(decode_datagram(&bad), Err(FrameError::Sync(0xAA, 0x56)));

        let mut bad = frame;
        bad[14] ^= 0x01;
        assert!(matches!(decode_datagram(&bad), Err(FrameError::Checksum { .. })));

        assert_eq!(decode_datagram(b"1,2,3"), Err(FrameError::Length(5)));
    }
}
