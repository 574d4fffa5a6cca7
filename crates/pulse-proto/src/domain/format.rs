//! Stream format descriptors advertised by sinks and sources.

use serde::{Deserialize, Serialize};

use crate::domain::proplist::Proplist;

/// Encoding byte of a [`FormatInfo`].
pub mod encoding {
    pub const ANY: u8 = 0;
    pub const PCM: u8 = 1;
    pub const AC3_IEC61937: u8 = 2;
    pub const EAC3_IEC61937: u8 = 3;
    pub const MPEG_IEC61937: u8 = 4;
    pub const DTS_IEC61937: u8 = 5;
    pub const MPEG2_AAC_IEC61937: u8 = 6;
    pub const TRUEHD_IEC61937: u8 = 7;
    pub const DTSHD_IEC61937: u8 = 8;
    pub const INVALID: u8 = 0xFF;
}

/// One supported format: an encoding plus format-specific properties
/// (`format.rate`, `format.channels`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FormatInfo {
    pub encoding: u8,
    pub proplist: Proplist,
}

impl FormatInfo {
    pub fn pcm() -> Self {
        Self {
            encoding: encoding::PCM,
            proplist: Proplist::new(),
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        match self.encoding {
            encoding::ANY => "any",
            encoding::PCM => "pcm",
            encoding::AC3_IEC61937 => "ac3-iec61937",
            encoding::EAC3_IEC61937 => "eac3-iec61937",
            encoding::MPEG_IEC61937 => "mpeg-iec61937",
            encoding::DTS_IEC61937 => "dts-iec61937",
            encoding::MPEG2_AAC_IEC61937 => "mpeg2-aac-iec61937",
            encoding::TRUEHD_IEC61937 => "truehd-iec61937",
            encoding::DTSHD_IEC61937 => "dtshd-iec61937",
            _ => "invalid",
        }
    }
}
