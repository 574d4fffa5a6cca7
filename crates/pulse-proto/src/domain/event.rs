//! Subscription events: unsolicited "something changed" notifications.
//!
//! An event carries one u32 that packs the facility (low four bits) and the
//! kind of change (bits 4-5), followed by the index of the affected object.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::protocol::tagstruct::{DecodeError, Value};

const FACILITY_MASK: u32 = 0x0F;
const KIND_MASK: u32 = 0x30;

/// The subsystem an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Facility {
    Sink = 0,
    Source = 1,
    SinkInput = 2,
    SourceOutput = 3,
    Module = 4,
    Client = 5,
    SampleCache = 6,
    Server = 7,
    Autoload = 8,
    Card = 9,
}

impl TryFrom<u32> for Facility {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, ()> {
        match value {
            0 => Ok(Facility::Sink),
            1 => Ok(Facility::Source),
            2 => Ok(Facility::SinkInput),
            3 => Ok(Facility::SourceOutput),
            4 => Ok(Facility::Module),
            5 => Ok(Facility::Client),
            6 => Ok(Facility::SampleCache),
            7 => Ok(Facility::Server),
            8 => Ok(Facility::Autoload),
            9 => Ok(Facility::Card),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum EventKind {
    New = 0x00,
    Change = 0x10,
    Remove = 0x20,
}

/// One decoded subscription event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub kind: EventKind,
    pub facility: Facility,
    pub index: u32,
}

impl SubscriptionEvent {
    /// Decodes the body of a `SUBSCRIBE_EVENT` packet.
    ///
    /// # Errors
    ///
    /// Fails on a missing field or an unknown facility or kind.
    pub fn decode(values: &[Value]) -> Result<Self, DecodeError> {
        let mut fields = crate::protocol::fields::Fields::new(values);
        let raw = fields.u32("event")?;
        let index = fields.u32("index")?;
        let facility = Facility::try_from(raw & FACILITY_MASK).map_err(|()| {
            DecodeError::UnexpectedValue {
                expected: "event facility",
                found: format!("0x{raw:08X}"),
            }
        })?;
        let kind = match raw & KIND_MASK {
            0x00 => EventKind::New,
            0x10 => EventKind::Change,
            0x20 => EventKind::Remove,
            _ => {
                return Err(DecodeError::UnexpectedValue {
                    expected: "event kind",
                    found: format!("0x{raw:08X}"),
                })
            }
        };
        Ok(SubscriptionEvent {
            kind,
            facility,
            index,
        })
    }

    pub fn encode(&self) -> Vec<Value> {
        vec![
            Value::U32(self.facility as u32 | self.kind as u32),
            Value::U32(self.index),
        ]
    }
}

// ── Subscription mask ─────────────────────────────────────────────────────────

/// Facilities a client wants events for, one bit per facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SubscriptionMask(pub u32);

impl SubscriptionMask {
    pub const NONE: SubscriptionMask = SubscriptionMask(0x0000);
    pub const SINK: SubscriptionMask = SubscriptionMask(0x0001);
    pub const SOURCE: SubscriptionMask = SubscriptionMask(0x0002);
    pub const SINK_INPUT: SubscriptionMask = SubscriptionMask(0x0004);
    pub const SOURCE_OUTPUT: SubscriptionMask = SubscriptionMask(0x0008);
    pub const MODULE: SubscriptionMask = SubscriptionMask(0x0010);
    pub const CLIENT: SubscriptionMask = SubscriptionMask(0x0020);
    pub const SAMPLE_CACHE: SubscriptionMask = SubscriptionMask(0x0040);
    pub const SERVER: SubscriptionMask = SubscriptionMask(0x0080);
    pub const AUTOLOAD: SubscriptionMask = SubscriptionMask(0x0100);
    pub const CARD: SubscriptionMask = SubscriptionMask(0x0200);
    /// Everything except the obsolete autoload facility.
    pub const ALL: SubscriptionMask = SubscriptionMask(0x02FF);

    pub fn for_facility(facility: Facility) -> Self {
        SubscriptionMask(1 << facility as u32)
    }

    pub fn contains(self, other: SubscriptionMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether events from `facility` pass this mask.
    pub fn matches(self, facility: Facility) -> bool {
        self.contains(Self::for_facility(facility))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SubscriptionMask {
    type Output = SubscriptionMask;

    fn bitor(self, rhs: Self) -> Self {
        SubscriptionMask(self.0 | rhs.0)
    }
}
