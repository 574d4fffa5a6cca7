//! Sink (output) and source (input) device records.
//!
//! Sinks and sources share almost the whole layout; they differ in the
//! monitor link (a sink owns a monitor source, a monitor source points back
//! at its sink) and in the version that introduced format lists.

use serde::{Deserialize, Serialize};

use crate::domain::format::FormatInfo;
use crate::domain::proplist::Proplist;
use crate::domain::sample::{ChannelMap, SampleSpec};
use crate::domain::volume::{CVolume, Volume};
use crate::domain::{opt_index, Record};
use crate::protocol::fields::Fields;
use crate::protocol::tagstruct::{DecodeError, Value};

// ── Shared pieces ─────────────────────────────────────────────────────────────

/// Device flag bits.  Bits above `DECIBEL_VOLUME` differ between sinks and
/// sources; they are kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceFlags(pub u32);

impl DeviceFlags {
    pub const HW_VOLUME_CTRL: u32 = 0x0001;
    pub const LATENCY: u32 = 0x0002;
    pub const HARDWARE: u32 = 0x0004;
    pub const NETWORK: u32 = 0x0008;
    pub const HW_MUTE_CTRL: u32 = 0x0010;
    pub const DECIBEL_VOLUME: u32 = 0x0020;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit == bit
    }
}

/// Run state of a sink or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceState {
    Running,
    Idle,
    Suspended,
    /// Unknown state, or a server older than the field.
    #[default]
    Invalid,
}

impl From<u32> for DeviceState {
    fn from(value: u32) -> Self {
        match value {
            0 => DeviceState::Running,
            1 => DeviceState::Idle,
            2 => DeviceState::Suspended,
            _ => DeviceState::Invalid,
        }
    }
}

impl DeviceState {
    fn to_wire(self) -> u32 {
        match self {
            DeviceState::Running => 0,
            DeviceState::Idle => 1,
            DeviceState::Suspended => 2,
            DeviceState::Invalid => u32::MAX,
        }
    }
}

/// Whether a port (jack) currently has something plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PortAvailable {
    #[default]
    Unknown,
    No,
    Yes,
}

impl From<u32> for PortAvailable {
    fn from(value: u32) -> Self {
        match value {
            1 => PortAvailable::No,
            2 => PortAvailable::Yes,
            _ => PortAvailable::Unknown,
        }
    }
}

impl PortAvailable {
    pub(crate) fn to_wire(self) -> u32 {
        match self {
            PortAvailable::Unknown => 0,
            PortAvailable::No => 1,
            PortAvailable::Yes => 2,
        }
    }
}

/// A port of a sink or source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevicePort {
    pub name: String,
    pub description: String,
    pub priority: u32,
    /// Always `Unknown` before protocol 24.
    pub available: PortAvailable,
    /// Protocol 34+.
    pub availability_group: Option<String>,
    /// Protocol 34+; 0 is "unknown".
    pub port_type: u32,
}

fn decode_ports(
    fields: &mut Fields<'_>,
    version: u32,
) -> Result<(Vec<DevicePort>, Option<String>), DecodeError> {
    let n_ports = fields.u32("n_ports")?;
    let mut ports = Vec::new();
    for _ in 0..n_ports {
        let name = fields.required_string("port.name")?;
        let description = fields.string_or_empty("port.description")?;
        let priority = fields.u32("port.priority")?;
        let available = if version >= 24 {
            PortAvailable::from(fields.u32("port.available")?)
        } else {
            PortAvailable::Unknown
        };
        let (availability_group, port_type) = if version >= 34 {
            (
                fields.string("port.availability_group")?,
                fields.u32("port.type")?,
            )
        } else {
            (None, 0)
        };
        ports.push(DevicePort {
            name,
            description,
            priority,
            available,
            availability_group,
            port_type,
        });
    }
    let active_port = fields.string("active_port")?;
    Ok((ports, active_port))
}

fn encode_ports(ports: &[DevicePort], active_port: Option<&str>, out: &mut Vec<Value>, version: u32) {
    out.push(Value::U32(ports.len() as u32));
    for port in ports {
        out.push(Value::string(port.name.as_str()));
        out.push(Value::string(port.description.as_str()));
        out.push(Value::U32(port.priority));
        if version >= 24 {
            out.push(Value::U32(port.available.to_wire()));
        }
        if version >= 34 {
            out.push(Value::String(port.availability_group.clone()));
            out.push(Value::U32(port.port_type));
        }
    }
    out.push(Value::String(active_port.map(str::to_string)));
}

fn decode_formats(fields: &mut Fields<'_>) -> Result<Vec<FormatInfo>, DecodeError> {
    let n_formats = fields.u8("n_formats")?;
    (0..n_formats).map(|_| fields.format_info("format")).collect()
}

fn encode_formats(formats: &[FormatInfo], out: &mut Vec<Value>) {
    out.push(Value::U8(formats.len() as u8));
    out.extend(formats.iter().cloned().map(Value::FormatInfo));
}

/// The fields both device kinds carry after the monitor link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct DeviceTail {
    latency_usec: u64,
    driver: String,
    flags: DeviceFlags,
    proplist: Proplist,
    configured_latency_usec: u64,
    base_volume: Volume,
    state: DeviceState,
    n_volume_steps: u32,
    card: Option<u32>,
    ports: Vec<DevicePort>,
    active_port: Option<String>,
    formats: Vec<FormatInfo>,
}

impl DeviceTail {
    fn decode(fields: &mut Fields<'_>, version: u32, formats_since: u32) -> Result<Self, DecodeError> {
        let mut tail = DeviceTail {
            latency_usec: fields.usec("latency")?,
            driver: fields.string_or_empty("driver")?,
            flags: DeviceFlags(fields.u32("flags")?),
            base_volume: Volume::NORMAL,
            ..DeviceTail::default()
        };
        if version >= 13 {
            tail.proplist = fields.proplist("proplist")?;
            tail.configured_latency_usec = fields.usec("configured_latency")?;
        }
        if version >= 15 {
            tail.base_volume = fields.volume("base_volume")?;
            tail.state = DeviceState::from(fields.u32("state")?);
            tail.n_volume_steps = fields.u32("n_volume_steps")?;
            tail.card = fields.index("card")?;
        }
        if version >= 16 {
            let (ports, active_port) = decode_ports(fields, version)?;
            tail.ports = ports;
            tail.active_port = active_port;
        }
        if version >= formats_since {
            tail.formats = decode_formats(fields)?;
        }
        Ok(tail)
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32, formats_since: u32) {
        out.push(Value::Usec(self.latency_usec));
        out.push(Value::string(self.driver.as_str()));
        out.push(Value::U32(self.flags.0));
        if version >= 13 {
            out.push(Value::Proplist(self.proplist.clone()));
            out.push(Value::Usec(self.configured_latency_usec));
        }
        if version >= 15 {
            out.push(Value::Volume(self.base_volume));
            out.push(Value::U32(self.state.to_wire()));
            out.push(Value::U32(self.n_volume_steps));
            out.push(opt_index(self.card));
        }
        if version >= 16 {
            encode_ports(&self.ports, self.active_port.as_deref(), out, version);
        }
        if version >= formats_since {
            encode_formats(&self.formats, out);
        }
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

const SINK_FORMATS_SINCE: u32 = 21;
const SOURCE_FORMATS_SINCE: u32 = 22;

/// An output device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SinkInfo {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub owner_module: Option<u32>,
    pub volume: CVolume,
    pub mute: bool,
    pub monitor_source: Option<u32>,
    pub monitor_source_name: Option<String>,
    pub latency_usec: u64,
    pub driver: String,
    pub flags: DeviceFlags,
    pub proplist: Proplist,
    pub configured_latency_usec: u64,
    pub base_volume: Volume,
    pub state: DeviceState,
    pub n_volume_steps: u32,
    pub card: Option<u32>,
    pub ports: Vec<DevicePort>,
    pub active_port: Option<String>,
    pub formats: Vec<FormatInfo>,
}

impl SinkInfo {
    pub fn active_port(&self) -> Option<&DevicePort> {
        let name = self.active_port.as_deref()?;
        self.ports.iter().find(|p| p.name == name)
    }

    fn tail(&self) -> DeviceTail {
        DeviceTail {
            latency_usec: self.latency_usec,
            driver: self.driver.clone(),
            flags: self.flags,
            proplist: self.proplist.clone(),
            configured_latency_usec: self.configured_latency_usec,
            base_volume: self.base_volume,
            state: self.state,
            n_volume_steps: self.n_volume_steps,
            card: self.card,
            ports: self.ports.clone(),
            active_port: self.active_port.clone(),
            formats: self.formats.clone(),
        }
    }
}

impl Record for SinkInfo {
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError> {
        let index = fields.u32("index")?;
        let name = fields.required_string("name")?;
        let description = fields.string_or_empty("description")?;
        let sample_spec = fields.sample_spec("sample_spec")?;
        let channel_map = fields.channel_map("channel_map")?;
        let owner_module = fields.index("owner_module")?;
        let volume = fields.cvolume("volume")?;
        let mute = fields.boolean("mute")?;
        let monitor_source = fields.index("monitor_source")?;
        let monitor_source_name = fields.string("monitor_source_name")?;
        let tail = DeviceTail::decode(fields, version, SINK_FORMATS_SINCE)?;
        Ok(SinkInfo {
            index,
            name,
            description,
            sample_spec,
            channel_map,
            owner_module,
            volume,
            mute,
            monitor_source,
            monitor_source_name,
            latency_usec: tail.latency_usec,
            driver: tail.driver,
            flags: tail.flags,
            proplist: tail.proplist,
            configured_latency_usec: tail.configured_latency_usec,
            base_volume: tail.base_volume,
            state: tail.state,
            n_volume_steps: tail.n_volume_steps,
            card: tail.card,
            ports: tail.ports,
            active_port: tail.active_port,
            formats: tail.formats,
        })
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32) {
        out.push(Value::U32(self.index));
        out.push(Value::string(self.name.as_str()));
        out.push(Value::string(self.description.as_str()));
        out.push(Value::SampleSpec(self.sample_spec));
        out.push(Value::ChannelMap(self.channel_map.clone()));
        out.push(opt_index(self.owner_module));
        out.push(Value::CVolume(self.volume.clone()));
        out.push(Value::Boolean(self.mute));
        out.push(opt_index(self.monitor_source));
        out.push(Value::String(self.monitor_source_name.clone()));
        self.tail().encode(out, version, SINK_FORMATS_SINCE);
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

/// An input device.  Monitor sources carry the sink they mirror.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub owner_module: Option<u32>,
    pub volume: CVolume,
    pub mute: bool,
    pub monitor_of_sink: Option<u32>,
    pub monitor_of_sink_name: Option<String>,
    pub latency_usec: u64,
    pub driver: String,
    pub flags: DeviceFlags,
    pub proplist: Proplist,
    pub configured_latency_usec: u64,
    pub base_volume: Volume,
    pub state: DeviceState,
    pub n_volume_steps: u32,
    pub card: Option<u32>,
    pub ports: Vec<DevicePort>,
    pub active_port: Option<String>,
    pub formats: Vec<FormatInfo>,
}

impl SourceInfo {
    pub fn is_monitor(&self) -> bool {
        self.monitor_of_sink.is_some()
    }

    pub fn active_port(&self) -> Option<&DevicePort> {
        let name = self.active_port.as_deref()?;
        self.ports.iter().find(|p| p.name == name)
    }

    fn tail(&self) -> DeviceTail {
        DeviceTail {
            latency_usec: self.latency_usec,
            driver: self.driver.clone(),
            flags: self.flags,
            proplist: self.proplist.clone(),
            configured_latency_usec: self.configured_latency_usec,
            base_volume: self.base_volume,
            state: self.state,
            n_volume_steps: self.n_volume_steps,
            card: self.card,
            ports: self.ports.clone(),
            active_port: self.active_port.clone(),
            formats: self.formats.clone(),
        }
    }
}

impl Record for SourceInfo {
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError> {
        let index = fields.u32("index")?;
        let name = fields.required_string("name")?;
        let description = fields.string_or_empty("description")?;
        let sample_spec = fields.sample_spec("sample_spec")?;
        let channel_map = fields.channel_map("channel_map")?;
        let owner_module = fields.index("owner_module")?;
        let volume = fields.cvolume("volume")?;
        let mute = fields.boolean("mute")?;
        let monitor_of_sink = fields.index("monitor_of_sink")?;
        let monitor_of_sink_name = fields.string("monitor_of_sink_name")?;
        let tail = DeviceTail::decode(fields, version, SOURCE_FORMATS_SINCE)?;
        Ok(SourceInfo {
            index,
            name,
            description,
            sample_spec,
            channel_map,
            owner_module,
            volume,
            mute,
            monitor_of_sink,
            monitor_of_sink_name,
            latency_usec: tail.latency_usec,
            driver: tail.driver,
            flags: tail.flags,
            proplist: tail.proplist,
            configured_latency_usec: tail.configured_latency_usec,
            base_volume: tail.base_volume,
            state: tail.state,
            n_volume_steps: tail.n_volume_steps,
            card: tail.card,
            ports: tail.ports,
            active_port: tail.active_port,
            formats: tail.formats,
        })
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32) {
        out.push(Value::U32(self.index));
        out.push(Value::string(self.name.as_str()));
        out.push(Value::string(self.description.as_str()));
        out.push(Value::SampleSpec(self.sample_spec));
        out.push(Value::ChannelMap(self.channel_map.clone()));
        out.push(opt_index(self.owner_module));
        out.push(Value::CVolume(self.volume.clone()));
        out.push(Value::Boolean(self.mute));
        out.push(opt_index(self.monitor_of_sink));
        out.push(Value::String(self.monitor_of_sink_name.clone()));
        self.tail().encode(out, version, SOURCE_FORMATS_SINCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{decode_record, decode_records, encode_records};
    use crate::protocol::command::PROTOCOL_VERSION;

    fn sample_sink(index: u32) -> SinkInfo {
        let mut proplist = Proplist::new();
        proplist.set_str("device.description", "Built-in Audio");
        SinkInfo {
            index,
            name: format!("alsa_output.{index}"),
            description: "Built-in Audio".to_string(),
            sample_spec: SampleSpec::default(),
            channel_map: ChannelMap::stereo(),
            owner_module: Some(7),
            volume: CVolume::uniform(2, Volume::NORMAL),
            mute: false,
            monitor_source: Some(index + 100),
            monitor_source_name: Some(format!("alsa_output.{index}.monitor")),
            latency_usec: 0,
            driver: "module-alsa-card.c".to_string(),
            flags: DeviceFlags(DeviceFlags::HARDWARE | DeviceFlags::DECIBEL_VOLUME),
            proplist,
            configured_latency_usec: 25_000,
            base_volume: Volume::NORMAL,
            state: DeviceState::Suspended,
            n_volume_steps: 65_537,
            card: Some(0),
            ports: vec![DevicePort {
                name: "analog-output-speaker".to_string(),
                description: "Speakers".to_string(),
                priority: 10_000,
                available: PortAvailable::Yes,
                availability_group: Some("Legacy 1".to_string()),
                port_type: 1,
            }],
            active_port: Some("analog-output-speaker".to_string()),
            formats: vec![FormatInfo::pcm()],
        }
    }

    #[test]
    fn test_sink_round_trip_at_current_version() {
        // Arrange
        let sink = sample_sink(1);
        let mut values = Vec::new();
        sink.encode(&mut values, PROTOCOL_VERSION);

        // Act
        let decoded: SinkInfo = decode_record(&values, PROTOCOL_VERSION).unwrap();

        // Assert
        assert_eq!(decoded, sink);
        assert_eq!(decoded.active_port().map(|p| p.priority), Some(10_000));
    }

    #[test]
    fn test_sink_at_version_13_stops_after_configured_latency() {
        // Arrange
        let sink = sample_sink(1);
        let mut values = Vec::new();
        sink.encode(&mut values, 13);

        // Act
        let decoded: SinkInfo = decode_record(&values, 13).unwrap();

        // Assert – later fields fall back to defaults
        assert_eq!(values.len(), 15);
        assert_eq!(decoded.configured_latency_usec, 25_000);
        assert_eq!(decoded.base_volume, Volume::NORMAL);
        assert_eq!(decoded.state, DeviceState::Invalid);
        assert!(decoded.ports.is_empty());
        assert!(decoded.formats.is_empty());
    }

    #[test]
    fn test_port_fields_before_version_24() {
        let sink = sample_sink(2);
        let mut values = Vec::new();
        sink.encode(&mut values, 20);
        let decoded: SinkInfo = decode_record(&values, 20).unwrap();
        assert_eq!(decoded.ports[0].available, PortAvailable::Unknown);
        assert_eq!(decoded.ports[0].availability_group, None);
        assert!(decoded.formats.is_empty());
    }

    #[test]
    fn test_multiple_sinks_decode_back_to_back() {
        let sinks = vec![sample_sink(0), sample_sink(1), sample_sink(2)];
        let values = encode_records(&sinks, PROTOCOL_VERSION);
        let decoded: Vec<SinkInfo> = decode_records(&values, PROTOCOL_VERSION).unwrap();
        assert_eq!(decoded, sinks);
    }

    #[test]
    fn test_truncated_sink_reports_missing_field() {
        // Arrange
        let mut values = Vec::new();
        sample_sink(0).encode(&mut values, PROTOCOL_VERSION);
        values.truncate(5);

        // Act
        let result: Result<SinkInfo, _> = decode_record(&values, PROTOCOL_VERSION);

        // Assert
        assert_eq!(result, Err(DecodeError::MissingField("owner_module")));
    }

    #[test]
    fn test_source_formats_start_at_version_22() {
        // Arrange
        let source = SourceInfo {
            index: 3,
            name: "alsa_input.pci".to_string(),
            monitor_of_sink: None,
            formats: vec![FormatInfo::pcm()],
            ..SourceInfo::default()
        };

        // Act
        let mut v21 = Vec::new();
        source.encode(&mut v21, 21);
        let mut v22 = Vec::new();
        source.encode(&mut v22, 22);

        // Assert
        assert_eq!(v22.len(), v21.len() + 2);
        let decoded: SourceInfo = decode_record(&v22, 22).unwrap();
        assert_eq!(decoded.formats.len(), 1);
        assert!(!decoded.is_monitor());
    }

    #[test]
    fn test_device_state_from_wire() {
        assert_eq!(DeviceState::from(0), DeviceState::Running);
        assert_eq!(DeviceState::from(u32::MAX), DeviceState::Invalid);
    }
}
