//! # Frame Codec
//!
//! Cursor-style reader and writer over the byte payloads that follow a
//! command byte, plus the top-level [`decode`]/[`encode`] pair.
//!
//! The writer is infallible (frames are small and heap-backed); the reader
//! is length-checked on every access and converts a short buffer into
//! [`ProtocolError::MalformedFrame`] naming the command being parsed.

use crate::{Command, ProtocolError, ProtocolResult};

/// One decoded application frame: a command plus its raw argument bytes.
///
/// Stateless and transient - produced by [`decode`], consumed by the
/// dispatcher, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    /// The command byte, resolved against the closed table.
    pub command: Command,
    /// Argument bytes exactly as they arrived.
    pub args: Vec<u8>,
}

impl RawFrame {
    /// Builds a frame from parts. Used by the emulator, which produces
    /// frames directly instead of round-tripping through bytes.
    #[must_use]
    pub fn new(command: Command, args: Vec<u8>) -> Self {
        Self { command, args }
    }

    /// Opens a length-checked reader over the argument bytes.
    #[must_use]
    pub fn reader(&self) -> FrameReader<'_> {
        FrameReader::new(self.command, &self.args)
    }
}

/// Splits a raw byte buffer into command and arguments.
///
/// # Errors
///
/// [`ProtocolError::EmptyFrame`] on a zero-length buffer,
/// [`ProtocolError::UnknownCommand`] when the leading byte is not in the
/// command table.
pub fn decode(bytes: &[u8]) -> ProtocolResult<RawFrame> {
    let (&code, args) = bytes.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let command = Command::from_u8(code).ok_or(ProtocolError::UnknownCommand { code })?;
    Ok(RawFrame {
        command,
        args: args.to_vec(),
    })
}

/// Concatenates a command byte and its argument bytes into a wire frame.
#[must_use]
pub fn encode(command: Command, args: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + args.len());
    bytes.push(command as u8);
    bytes.extend_from_slice(args);
    bytes
}

/// Builder for outbound argument payloads.
///
/// Chainable so request construction reads like the wire layout it
/// produces:
///
/// ```
/// use scurry_protocol::FrameWriter;
///
/// let args = FrameWriter::new().put_u8(0).put_str("Bobby").finish();
/// assert_eq!(args, [0, b'B', b'o', b'b', b'b', b'y']);
/// ```
#[derive(Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one byte.
    #[must_use]
    pub fn put_u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    /// Appends a big-endian 16-bit value.
    #[must_use]
    pub fn put_u16_be(mut self, value: u16) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a big-endian 32-bit value.
    #[must_use]
    pub fn put_u32_be(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends string bytes without a terminator (trailing string fields
    /// run to the end of the frame).
    #[must_use]
    pub fn put_str(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Appends string bytes followed by a NUL separator (for frames that
    /// carry several string fields back to back).
    #[must_use]
    pub fn put_str_nul(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    /// Consumes the writer and yields the payload.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Length-checked cursor over a frame's argument bytes.
pub struct FrameReader<'a> {
    command: Command,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader; `command` is only used for error context.
    #[must_use]
    pub const fn new(command: Command, buf: &'a [u8]) -> Self {
        Self {
            command,
            buf,
            pos: 0,
        }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn short(&self, reason: &'static str) -> ProtocolError {
        ProtocolError::MalformedFrame {
            command: self.command,
            reason,
        }
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the buffer is exhausted.
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        let value = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| self.short("unexpected end of frame"))?;
        self.pos += 1;
        Ok(value)
    }

    /// Reads a big-endian 16-bit value.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when fewer than two bytes remain.
    pub fn read_u16_be(&mut self) -> ProtocolResult<u16> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Reads a big-endian 32-bit value.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when fewer than four bytes remain.
    pub fn read_u32_be(&mut self) -> ProtocolResult<u32> {
        if self.remaining() < 4 {
            return Err(self.short("truncated 32-bit field"));
        }
        let bytes = [
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ];
        self.pos += 4;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads string bytes up to a NUL separator or the end of the frame.
    /// The separator, when present, is consumed.
    ///
    /// Non-UTF-8 bytes are replaced rather than rejected: names come from
    /// the server already validated, and a lossy name is better than
    /// tearing the session down over one character.
    pub fn read_str_nul(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos] != 0 {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
        if self.pos < self.buf.len() {
            self.pos += 1; // consume the NUL
        }
        text
    }

    /// Consumes and returns everything left in the frame.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_frame() {
        assert_eq!(decode(&[]), Err(ProtocolError::EmptyFrame));
    }

    #[test]
    fn test_decode_unknown_command() {
        assert_eq!(
            decode(&[0xAB, 1, 2]),
            Err(ProtocolError::UnknownCommand { code: 0xAB })
        );
    }

    #[test]
    fn test_encode_decode_round_trip() {
        // Codec idempotence on well-formed input, across frame shapes.
        let shapes: &[&[u8]] = &[
            &[Command::SignOut as u8],
            &[Command::Attack as u8, 0, b'B', b'o', b'b', b'b', b'y'],
            &[Command::Accept as u8, 0x01, 0x2C],
            &[Command::ScoreChanged as u8, 3, 1],
            &[Command::Move as u8, 4],
            &[Command::UseSkill as u8, 33],
            &[Command::Finished as u8, 0, 1, 3, 2],
        ];
        for &bytes in shapes {
            let frame = decode(bytes).expect("well-formed");
            assert_eq!(encode(frame.command, &frame.args), bytes);
        }
    }

    #[test]
    fn test_reader_big_endian() {
        let frame = RawFrame::new(Command::UserInfo, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x2A]);
        let mut reader = frame.reader();
        assert_eq!(reader.read_u16_be().unwrap(), 1);
        assert_eq!(reader.read_u32_be().unwrap(), 42);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_truncation_is_malformed() {
        let frame = RawFrame::new(Command::Rating, vec![0x00, 0x01]);
        let mut reader = frame.reader();
        let err = reader.read_u32_be().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedFrame {
                command: Command::Rating,
                ..
            }
        ));
    }

    #[test]
    fn test_reader_strings() {
        // Two NUL-separated names, the second unterminated.
        let frame = RawFrame::new(
            Command::FriendList,
            vec![b'A', b'n', b'n', 0, b'B', b'o', b'b'],
        );
        let mut reader = frame.reader();
        assert_eq!(reader.read_str_nul(), "Ann");
        assert_eq!(reader.read_str_nul(), "Bob");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_writer_layout() {
        let args = FrameWriter::new()
            .put_str_nul("tom")
            .put_u16_be(300)
            .put_u32_be(70000)
            .finish();
        assert_eq!(
            args,
            [b't', b'o', b'm', 0, 0x01, 0x2C, 0x00, 0x01, 0x11, 0x70]
        );
    }
}
