//! Packet framing: the fixed 20-byte header in front of every payload.
//!
//! Wire format:
//! ```text
//! [length:4][channel:4][offset_hi:4][offset_lo:4][flags:4][payload:length]
//! ```
//! All fields are big-endian.  Command traffic uses
//! [`CONTROL_CHANNEL`]; any other channel carries audio memory blocks.

use thiserror::Error;

/// Size of the packet header in bytes.
pub const HEADER_SIZE: usize = 20;

/// Channel id of command/reply traffic.
pub const CONTROL_CHANNEL: u32 = 0xFFFF_FFFF;

/// Largest payload accepted from the server (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Set on a list reply fragment that is followed by more fragments on the
/// same tag.  A list packet without it ends the list.
pub const FLAG_LIST_CONTINUES: u32 = 0x0800_0000;

/// Seek-mode bits used by memblock packets.
pub const FLAG_SEEK_MASK: u32 = 0x0000_00FF;

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub length: u32,
    pub channel: u32,
    pub offset: u64,
    pub flags: u32,
}

/// Errors produced when a header cannot be accepted.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Declared payload exceeds [`MAX_FRAME_SIZE`].
    #[error("frame too large: {length} bytes (max {max})")]
    TooLarge { length: u32, max: u32 },
}

impl PacketHeader {
    /// Header for a control packet carrying `length` payload bytes.
    pub fn control(length: u32) -> Self {
        Self {
            length,
            channel: CONTROL_CHANNEL,
            offset: 0,
            flags: 0,
        }
    }

    /// Marks the packet as a non-final list fragment.
    pub fn with_continuation(mut self) -> Self {
        self.flags |= FLAG_LIST_CONTINUES;
        self
    }

    pub fn is_control(&self) -> bool {
        self.channel == CONTROL_CHANNEL
    }

    pub fn continues_list(&self) -> bool {
        self.flags & FLAG_LIST_CONTINUES != 0
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.length.to_be_bytes());
        out[4..8].copy_from_slice(&self.channel.to_be_bytes());
        out[8..12].copy_from_slice(&((self.offset >> 32) as u32).to_be_bytes());
        out[12..16].copy_from_slice(&(self.offset as u32).to_be_bytes());
        out[16..20].copy_from_slice(&self.flags.to_be_bytes());
        out
    }

    /// Parses a header and checks the declared length against [`MAX_FRAME_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] for oversized payloads.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self, FrameError> {
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let header = Self {
            length: word(0),
            channel: word(4),
            offset: (u64::from(word(8)) << 32) | u64::from(word(12)),
            flags: word(16),
        };
        if header.length > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge {
                length: header.length,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(header)
    }
}

/// Builds a complete control packet (header plus payload).
pub fn frame_control(payload: &[u8], continues: bool) -> Vec<u8> {
    let mut header = PacketHeader::control(payload.len() as u32);
    if continues {
        header = header.with_continuation();
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_header_layout() {
        // Arrange
        let header = PacketHeader::control(0x10);

        // Act
        let bytes = header.to_bytes();

        // Assert
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0x10]);
        assert_eq!(&bytes[4..8], &[0xFF; 4]);
        assert_eq!(&bytes[8..20], &[0; 12]);
    }

    #[test]
    fn test_offset_splits_into_high_and_low_words() {
        let header = PacketHeader {
            length: 0,
            channel: 3,
            offset: 0x0000_0001_0000_0002,
            flags: 0,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 2]);
        assert_eq!(PacketHeader::from_bytes(&bytes), Ok(header));
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        let mut bytes = PacketHeader::control(0).to_bytes();
        bytes[0..4].copy_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());
        assert!(matches!(
            PacketHeader::from_bytes(&bytes),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_continuation_flag() {
        let header = PacketHeader::control(4).with_continuation();
        assert!(header.continues_list());
        assert!(!PacketHeader::control(4).continues_list());
    }

    #[test]
    fn test_frame_control_prefixes_header() {
        let framed = frame_control(&[1, 2, 3], true);
        assert_eq!(framed.len(), HEADER_SIZE + 3);
        let header_bytes: [u8; HEADER_SIZE] = framed[..HEADER_SIZE].try_into().unwrap();
        let header = PacketHeader::from_bytes(&header_bytes).unwrap();
        assert_eq!(header.length, 3);
        assert!(header.is_control());
        assert!(header.continues_list());
        assert_eq!(&framed[HEADER_SIZE..], &[1, 2, 3]);
    }
}
