// One byte stream, two grammars: binary frames and text lines

use tracing::{debug, trace};

use crate::command::{Command, CommandError, Line, RawSample, parse_line};
use crate::frame::{FrameDecoder, FrameStep};

/// Longest text line kept; further bytes up to the terminator are dropped.
pub const MAX_LINE: usize = 63;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sample(RawSample),
    Command(Command),
    /// A recognised command with bad arguments. The error text is the reply.
    Error(CommandError),
}

fn is_terminator(byte: u8) -> bool {
    matches!(byte, b'X' | b'\r' | b'\n')
}

#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    frame: FrameDecoder,
    line: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Option<Event> {
        match self.frame.push(byte) {
            FrameStep::Pass => self.push_text(byte),
            FrameStep::Held | FrameStep::Consumed => None,
            FrameStep::Started => {
                self.line.clear();
                None
            }
            FrameStep::Frame(channels) => Some(Event::Sample(channels.into())),
            FrameStep::Rejected(err) => {
                debug!(%err, "dropping frame");
                None
            }
        }
    }

    pub fn feed<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = Event> + 'a {
        bytes.iter().filter_map(move |b| self.push(*b))
    }

    pub fn reset(&mut self) {
        self.frame.reset();
        self.line.clear();
    }

    fn push_text(&mut self, byte: u8) -> Option<Event> {
        if is_terminator(byte) {
            return self.finish_line();
        }
        if (byte.is_ascii_graphic() || byte == b' ') && self.line.len() < MAX_LINE {
            self.line.push(byte);
        }
        None
    }

    fn finish_line(&mut self) -> Option<Event> {
        if self.line.is_empty() {
            return None;
        }
        // Only printable ASCII is ever buffered
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        match parse_line(&text) {
            Ok(Some(Line::Command(command))) => Some(Event::Command(command)),
            Ok(Some(Line::Sample(sample))) => Some(Event::Sample(sample)),
            Ok(None) => {
                trace!(line = %text, "ignoring line");
                None
            }
            Err(err) => Some(Event::Error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    #[test]
    fn sentinel_terminates_samples() {
        let mut decoder = StreamDecoder::new();
        let events: Vec<_> = decoder.feed(b"2047,2047,2047,2047,2047,2047X").collect();
        assert_eq!(events, vec![Event::Sample(RawSample([2047.0; 6]))]);
    }

    #[test]
    fn long_lines_are_truncated() {
        let mut decoder = StreamDecoder::new();
        let mut input = vec![b'1'; 200];
        input.push(b'\n');
        assert_eq!(decoder.feed(&input).count(), 0);
        assert!(decoder.line.is_empty());
    }

    #[test]
    fn frame_discards_partial_line() {
        let mut decoder = StreamDecoder::new();
        let mut input = b"ZER".to_vec();
        input.extend_from_slice(&encode(&[1, 2, 3, 4, 5, 6]));
        input.extend_from_slice(b"O\n");

        let events: Vec<_> = decoder.feed(&input).collect();
        assert_eq!(events, vec![Event::Sample(RawSample([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))]);
    }

    #[test]
    fn bad_frame_then_recovers() {
        let mut decoder = StreamDecoder::new();
        let mut bad = encode(&[1; 6]);
        bad[5] ^= 0x10;
        assert_eq!(decoder.feed(&bad).count(), 0);

        let events: Vec<_> = decoder.feed(b"\nZERO\n").collect();
        assert_eq!(events, vec![Event::Command(Command::Zero)]);
    }
}
