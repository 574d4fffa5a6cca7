//! Software volume levels.
//!
//! Volumes are linear-ish integers where [`Volume::NORMAL`] (0x10000) means
//! 100 % and [`Volume::MUTED`] means silence.  Values above `NORMAL` are
//! software amplification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::sample::{TooManyChannels, CHANNELS_MAX};

/// A single channel volume level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Volume(pub u32);

impl Volume {
    pub const MUTED: Volume = Volume(0);
    pub const NORMAL: Volume = Volume(0x1_0000);
    /// Largest volume the server accepts.
    pub const MAX: Volume = Volume(u32::MAX / 2);
    /// Marker the server uses for "no volume" (e.g. a missing base volume).
    pub const INVALID: Volume = Volume(u32::MAX);

    /// Converts a percentage (100.0 = normal) to a volume, clamped to [`Volume::MAX`].
    pub fn from_percent(percent: f64) -> Self {
        if percent <= 0.0 || percent.is_nan() {
            return Volume::MUTED;
        }
        let raw = (percent / 100.0 * f64::from(Self::NORMAL.0)).round();
        if raw >= f64::from(Self::MAX.0) {
            Volume::MAX
        } else {
            Volume(raw as u32)
        }
    }

    /// Returns the volume as a percentage of [`Volume::NORMAL`].
    pub fn percent(self) -> f64 {
        f64::from(self.0) * 100.0 / f64::from(Self::NORMAL.0)
    }

    pub fn is_valid(self) -> bool {
        self.0 <= Self::MAX.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:.0}%", self.percent())
        } else {
            f.write_str("(invalid)")
        }
    }
}

/// Per-channel volume of a sink, source or stream, at most [`CHANNELS_MAX`] channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Volume>", into = "Vec<Volume>")]
pub struct CVolume {
    values: Vec<Volume>,
}

impl CVolume {
    /// # Errors
    ///
    /// [`TooManyChannels`] when `values` is longer than [`CHANNELS_MAX`].
    pub fn new(values: Vec<Volume>) -> Result<Self, TooManyChannels> {
        if values.len() > CHANNELS_MAX {
            return Err(TooManyChannels(values.len()));
        }
        Ok(Self { values })
    }

    /// All `channels` set to the same level; `channels` is capped at [`CHANNELS_MAX`].
    pub fn uniform(channels: usize, volume: Volume) -> Self {
        Self {
            values: vec![volume; channels.min(CHANNELS_MAX)],
        }
    }

    pub fn values(&self) -> &[Volume] {
        &self.values
    }

    pub fn channels(&self) -> usize {
        self.values.len()
    }

    /// Arithmetic mean of all channels, [`Volume::MUTED`] when empty.
    pub fn average(&self) -> Volume {
        if self.values.is_empty() {
            return Volume::MUTED;
        }
        let sum: u64 = self.values.iter().map(|v| u64::from(v.0)).sum();
        Volume((sum / self.values.len() as u64) as u32)
    }

    /// Loudest channel, [`Volume::MUTED`] when empty.
    pub fn max(&self) -> Volume {
        self.values.iter().copied().max().unwrap_or(Volume::MUTED)
    }

    pub fn is_muted(&self) -> bool {
        self.values.iter().all(|v| *v == Volume::MUTED)
    }
}

impl TryFrom<Vec<Volume>> for CVolume {
    type Error = TooManyChannels;

    fn try_from(values: Vec<Volume>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<CVolume> for Vec<Volume> {
    fn from(cv: CVolume) -> Self {
        cv.values
    }
}
