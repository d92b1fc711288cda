//! # Session Header
//!
//! Every datagram in either direction is prefixed with the 7-byte session
//! header `[sid: u16 BE][token: u32 BE][flags: u8]`. The server assigns
//! `sid` and `token` at sign-in and echoes them on every push; the client
//! mirrors the latest values back on every request.

/// Size of the outer session header in bytes.
pub const HEADER_LEN: usize = 7;

/// Session identity as assigned by the server.
///
/// Owned exclusively by the transport; everyone else reads copies. The
/// token is held as 64 bits per the session model, its low 32 bits travel
/// on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned session identifier.
    pub sid: u16,
    /// Authentication token bound to the sid.
    pub token: u64,
    /// Both directions of the reliable layer are established.
    pub connected: bool,
}

impl Session {
    /// Zeroes the identity (sign-out / server restart).
    pub fn reset(&mut self) {
        self.sid = 0;
        self.token = 0;
    }

    /// Writes the 7-byte header for an outbound datagram.
    #[must_use]
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let sid = self.sid.to_be_bytes();
        let token = (self.token as u32).to_be_bytes();
        [sid[0], sid[1], token[0], token[1], token[2], token[3], 0]
    }

    /// Adopts the identity carried by an inbound datagram header.
    pub fn absorb(&mut self, header: &[u8; HEADER_LEN]) {
        self.sid = u16::from_be_bytes([header[0], header[1]]);
        self.token = u64::from(u32::from_be_bytes([
            header[2], header[3], header[4], header[5],
        ]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let mut session = Session {
            sid: 300,
            token: 0xDEAD_BEEF,
            connected: true,
        };
        let header = session.header();
        assert_eq!(header, [0x01, 0x2C, 0xDE, 0xAD, 0xBE, 0xEF, 0x00]);

        let mut other = Session::default();
        other.absorb(&header);
        assert_eq!(other.sid, 300);
        assert_eq!(other.token, 0xDEAD_BEEF);

        session.reset();
        assert_eq!(session.header(), [0; HEADER_LEN]);
    }
}
