//! Sample specifications and channel maps.
//!
//! # What is a sample spec? (for beginners)
//!
//! Every sink and source on the sound server processes audio in one fixed
//! layout: a *sample format* (how one sample is stored, e.g. signed 16-bit
//! little-endian), a *channel count* (1 = mono, 2 = stereo, ...) and a *rate*
//! (samples per second per channel, e.g. 44 100 Hz).  The triple is called
//! the sample spec.
//!
//! A *channel map* gives each of those channels a speaker position, so the
//! server knows that channel 0 is "front-left" and channel 1 "front-right".

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of channels the protocol allows in a spec, map or volume.
pub const CHANNELS_MAX: usize = 32;

/// A channel map or volume was built with more than [`CHANNELS_MAX`] entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} channels exceeds the protocol limit of {CHANNELS_MAX}")]
pub struct TooManyChannels(pub usize);

// ── Sample format ─────────────────────────────────────────────────────────────

/// Sample format byte carried inside a sample spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SampleFormat {
    U8 = 0,
    Alaw = 1,
    Ulaw = 2,
    S16Le = 3,
    S16Be = 4,
    Float32Le = 5,
    Float32Be = 6,
    S32Le = 7,
    S32Be = 8,
    S24Le = 9,
    S24Be = 10,
    S24_32Le = 11,
    S24_32Be = 12,
    /// Sent by the server for devices whose format is not yet configured.
    Invalid = 0xFF,
}

impl From<u8> for SampleFormat {
    /// Unknown format bytes collapse to [`SampleFormat::Invalid`].
    fn from(value: u8) -> Self {
        match value {
            0 => SampleFormat::U8,
            1 => SampleFormat::Alaw,
            2 => SampleFormat::Ulaw,
            3 => SampleFormat::S16Le,
            4 => SampleFormat::S16Be,
            5 => SampleFormat::Float32Le,
            6 => SampleFormat::Float32Be,
            7 => SampleFormat::S32Le,
            8 => SampleFormat::S32Be,
            9 => SampleFormat::S24Le,
            10 => SampleFormat::S24Be,
            11 => SampleFormat::S24_32Le,
            12 => SampleFormat::S24_32Be,
            _ => SampleFormat::Invalid,
        }
    }
}

impl SampleFormat {
    /// Bytes occupied by one sample of this format, `None` for `Invalid`.
    pub fn sample_size(self) -> Option<usize> {
        match self {
            SampleFormat::U8 | SampleFormat::Alaw | SampleFormat::Ulaw => Some(1),
            SampleFormat::S16Le | SampleFormat::S16Be => Some(2),
            SampleFormat::S24Le | SampleFormat::S24Be => Some(3),
            SampleFormat::Float32Le
            | SampleFormat::Float32Be
            | SampleFormat::S32Le
            | SampleFormat::S32Be
            | SampleFormat::S24_32Le
            | SampleFormat::S24_32Be => Some(4),
            SampleFormat::Invalid => None,
        }
    }

    /// Short name as printed by the server tools (`s16le`, `float32le`, ...).
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::Alaw => "aLaw",
            SampleFormat::Ulaw => "uLaw",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S16Be => "s16be",
            SampleFormat::Float32Le => "float32le",
            SampleFormat::Float32Be => "float32be",
            SampleFormat::S32Le => "s32le",
            SampleFormat::S32Be => "s32be",
            SampleFormat::S24Le => "s24le",
            SampleFormat::S24Be => "s24be",
            SampleFormat::S24_32Le => "s24-32le",
            SampleFormat::S24_32Be => "s24-32be",
            SampleFormat::Invalid => "invalid",
        }
    }
}

// ── Sample spec ───────────────────────────────────────────────────────────────

/// Format, channel count and rate of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
}

impl SampleSpec {
    /// Bytes per second of audio in this spec, `None` if the format is invalid.
    pub fn bytes_per_second(&self) -> Option<u64> {
        let size = self.format.sample_size()? as u64;
        Some(size * u64::from(self.channels) * u64::from(self.rate))
    }

    /// True when every component is inside the range the server accepts.
    pub fn is_valid(&self) -> bool {
        self.format != SampleFormat::Invalid
            && self.channels > 0
            && usize::from(self.channels) <= CHANNELS_MAX
            && self.rate > 0
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            format: SampleFormat::S16Le,
            channels: 2,
            rate: 44_100,
        }
    }
}

// ── Channel map ───────────────────────────────────────────────────────────────

/// Speaker position of every channel, as raw position codes.
///
/// Position codes are kept raw so that positions added by newer servers
/// still round-trip; [`position_name`] renders the known ones.  A map never
/// holds more than [`CHANNELS_MAX`] positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct ChannelMap {
    positions: Vec<u8>,
}

impl ChannelMap {
    pub const MONO: u8 = 0;
    pub const FRONT_LEFT: u8 = 1;
    pub const FRONT_RIGHT: u8 = 2;
    pub const FRONT_CENTER: u8 = 3;
    pub const LFE: u8 = 7;

    /// # Errors
    ///
    /// [`TooManyChannels`] when `positions` is longer than [`CHANNELS_MAX`].
    pub fn new(positions: Vec<u8>) -> Result<Self, TooManyChannels> {
        if positions.len() > CHANNELS_MAX {
            return Err(TooManyChannels(positions.len()));
        }
        Ok(Self { positions })
    }

    /// The usual two-channel front-left / front-right layout.
    pub fn stereo() -> Self {
        Self {
            positions: vec![Self::FRONT_LEFT, Self::FRONT_RIGHT],
        }
    }

    /// A single mono channel.
    pub fn mono() -> Self {
        Self {
            positions: vec![Self::MONO],
        }
    }

    pub fn positions(&self) -> &[u8] {
        &self.positions
    }

    pub fn channels(&self) -> usize {
        self.positions.len()
    }

    /// Comma-separated position names, e.g. `"front-left,front-right"`.
    pub fn describe(&self) -> String {
        self.positions
            .iter()
            .map(|p| position_name(*p))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl TryFrom<Vec<u8>> for ChannelMap {
    type Error = TooManyChannels;

    fn try_from(positions: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(positions)
    }
}

impl From<ChannelMap> for Vec<u8> {
    fn from(map: ChannelMap) -> Self {
        map.positions
    }
}

/// Returns the server's canonical name for a channel position code.
pub fn position_name(position: u8) -> &'static str {
    const AUX: [&str; 32] = [
        "aux0", "aux1", "aux2", "aux3", "aux4", "aux5", "aux6", "aux7", "aux8", "aux9", "aux10",
        "aux11", "aux12", "aux13", "aux14", "aux15", "aux16", "aux17", "aux18", "aux19", "aux20",
        "aux21", "aux22", "aux23", "aux24", "aux25", "aux26", "aux27", "aux28", "aux29", "aux30",
        "aux31",
    ];
    match position {
        0 => "mono",
        1 => "front-left",
        2 => "front-right",
        3 => "front-center",
        4 => "rear-center",
        5 => "rear-left",
        6 => "rear-right",
        7 => "lfe",
        8 => "front-left-of-center",
        9 => "front-right-of-center",
        10 => "side-left",
        11 => "side-right",
        12..=43 => AUX[usize::from(position - 12)],
        44 => "top-center",
        45 => "top-front-left",
        46 => "top-front-right",
        47 => "top-front-center",
        48 => "top-rear-left",
        49 => "top-rear-right",
        50 => "top-rear-center",
        _ => "invalid",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_from_unknown_byte_is_invalid() {
        assert_eq!(SampleFormat::from(0x42), SampleFormat::Invalid);
        assert_eq!(SampleFormat::from(0xFF), SampleFormat::Invalid);
    }

    #[test]
    fn test_sample_format_from_known_bytes_round_trips_through_repr() {
        for byte in 0u8..=12 {
            let format = SampleFormat::from(byte);
            assert_eq!(format as u8, byte);
        }
    }

    #[test]
    fn test_bytes_per_second_for_cd_quality() {
        // Arrange
        let spec = SampleSpec::default();

        // Act / Assert – 2 bytes * 2 channels * 44100 Hz
        assert_eq!(spec.bytes_per_second(), Some(176_400));
    }

    #[test]
    fn test_invalid_spec_has_no_byte_rate() {
        let spec = SampleSpec {
            format: SampleFormat::Invalid,
            channels: 2,
            rate: 48_000,
        };
        assert_eq!(spec.bytes_per_second(), None);
        assert!(!spec.is_valid());
    }

    #[test]
    fn test_spec_with_too_many_channels_is_invalid() {
        let spec = SampleSpec {
            format: SampleFormat::S16Le,
            channels: 33,
            rate: 48_000,
        };
        assert!(!spec.is_valid());
    }

    #[test]
    fn test_channel_map_describe_stereo() {
        assert_eq!(ChannelMap::stereo().describe(), "front-left,front-right");
    }

    #[test]
    fn test_channel_map_accepts_exactly_the_channel_limit() {
        let map = ChannelMap::new(vec![ChannelMap::MONO; CHANNELS_MAX]).unwrap();
        assert_eq!(map.channels(), CHANNELS_MAX);
    }

    #[test]
    fn test_channel_map_rejects_more_than_the_channel_limit() {
        // Arrange
        let positions = vec![ChannelMap::FRONT_LEFT; 256];

        // Act
        let result = ChannelMap::new(positions);

        // Assert
        assert_eq!(result, Err(TooManyChannels(256)));
    }

    #[test]
    fn test_position_name_covers_aux_range() {
        assert_eq!(position_name(12), "aux0");
        assert_eq!(position_name(43), "aux31");
        assert_eq!(position_name(200), "invalid");
    }
}
