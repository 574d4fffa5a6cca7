//! Sound card records: profiles and jack ports.

use serde::{Deserialize, Serialize};

use crate::domain::device::PortAvailable;
use crate::domain::proplist::Proplist;
use crate::domain::{opt_index, Record};
use crate::protocol::fields::Fields;
use crate::protocol::tagstruct::{DecodeError, Value};

/// One selectable configuration of a card (e.g. `output:analog-stereo`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardProfile {
    pub name: String,
    pub description: String,
    pub n_sinks: u32,
    pub n_sources: u32,
    pub priority: u32,
    /// Protocol 29+; older servers report every profile as available.
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PortDirection {
    Output,
    Input,
    #[default]
    Unknown,
}

impl From<u8> for PortDirection {
    fn from(value: u8) -> Self {
        match value {
            0x1 => PortDirection::Output,
            0x2 => PortDirection::Input,
            _ => PortDirection::Unknown,
        }
    }
}

impl PortDirection {
    fn to_wire(self) -> u8 {
        match self {
            PortDirection::Output => 0x1,
            PortDirection::Input => 0x2,
            PortDirection::Unknown => 0,
        }
    }
}

/// A physical port of a card and the profiles that expose it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardPort {
    pub name: String,
    pub description: String,
    pub priority: u32,
    pub available: PortAvailable,
    pub direction: PortDirection,
    pub proplist: Proplist,
    pub profiles: Vec<String>,
    /// Protocol 27+.
    pub latency_offset: i64,
    /// Protocol 34+.
    pub availability_group: Option<String>,
    /// Protocol 34+.
    pub port_type: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardInfo {
    pub index: u32,
    pub name: String,
    pub owner_module: Option<u32>,
    pub driver: String,
    pub profiles: Vec<CardProfile>,
    pub active_profile: Option<String>,
    pub proplist: Proplist,
    /// Protocol 26+.
    pub ports: Vec<CardPort>,
}

impl CardInfo {
    pub fn profile(&self, name: &str) -> Option<&CardProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn active_profile(&self) -> Option<&CardProfile> {
        self.profile(self.active_profile.as_deref()?)
    }
}

fn decode_profile(fields: &mut Fields<'_>, version: u32) -> Result<CardProfile, DecodeError> {
    Ok(CardProfile {
        name: fields.required_string("profile.name")?,
        description: fields.string_or_empty("profile.description")?,
        n_sinks: fields.u32("profile.n_sinks")?,
        n_sources: fields.u32("profile.n_sources")?,
        priority: fields.u32("profile.priority")?,
        available: if version >= 29 {
            fields.u32("profile.available")? != 0
        } else {
            true
        },
    })
}

fn decode_port(fields: &mut Fields<'_>, version: u32) -> Result<CardPort, DecodeError> {
    let name = fields.required_string("port.name")?;
    let description = fields.string_or_empty("port.description")?;
    let priority = fields.u32("port.priority")?;
    let available = PortAvailable::from(fields.u32("port.available")?);
    let direction = PortDirection::from(fields.u8("port.direction")?);
    let proplist = fields.proplist("port.proplist")?;
    let n_profiles = fields.u32("port.n_profiles")?;
    let profiles = (0..n_profiles)
        .map(|_| fields.required_string("port.profile"))
        .collect::<Result<Vec<_>, _>>()?;
    let latency_offset = if version >= 27 {
        fields.s64("port.latency_offset")?
    } else {
        0
    };
    let (availability_group, port_type) = if version >= 34 {
        (
            fields.string("port.availability_group")?,
            fields.u32("port.type")?,
        )
    } else {
        (None, 0)
    };
    Ok(CardPort {
        name,
        description,
        priority,
        available,
        direction,
        proplist,
        profiles,
        latency_offset,
        availability_group,
        port_type,
    })
}

impl Record for CardInfo {
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError> {
        let index = fields.u32("index")?;
        let name = fields.required_string("name")?;
        let owner_module = fields.index("owner_module")?;
        let driver = fields.string_or_empty("driver")?;
        let n_profiles = fields.u32("n_profiles")?;
        let profiles = (0..n_profiles)
            .map(|_| decode_profile(fields, version))
            .collect::<Result<Vec<_>, _>>()?;
        let active_profile = fields.string("active_profile")?;
        let proplist = fields.proplist("proplist")?;
        let ports = if version >= 26 {
            let n_ports = fields.u32("n_ports")?;
            (0..n_ports)
                .map(|_| decode_port(fields, version))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(CardInfo {
            index,
            name,
            owner_module,
            driver,
            profiles,
            active_profile,
            proplist,
            ports,
        })
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32) {
        out.push(Value::U32(self.index));
        out.push(Value::string(self.name.as_str()));
        out.push(opt_index(self.owner_module));
        out.push(Value::string(self.driver.as_str()));
        out.push(Value::U32(self.profiles.len() as u32));
        for profile in &self.profiles {
            out.push(Value::string(profile.name.as_str()));
            out.push(Value::string(profile.description.as_str()));
            out.push(Value::U32(profile.n_sinks));
            out.push(Value::U32(profile.n_sources));
            out.push(Value::U32(profile.priority));
            if version >= 29 {
                out.push(Value::U32(u32::from(profile.available)));
            }
        }
        out.push(Value::String(self.active_profile.clone()));
        out.push(Value::Proplist(self.proplist.clone()));
        if version < 26 {
            return;
        }
        out.push(Value::U32(self.ports.len() as u32));
        for port in &self.ports {
            out.push(Value::string(port.name.as_str()));
            out.push(Value::string(port.description.as_str()));
            out.push(Value::U32(port.priority));
            out.push(Value::U32(port.available.to_wire()));
            out.push(Value::U8(port.direction.to_wire()));
            out.push(Value::Proplist(port.proplist.clone()));
            out.push(Value::U32(port.profiles.len() as u32));
            out.extend(port.profiles.iter().map(|p| Value::string(p.as_str())));
            if version >= 27 {
                out.push(Value::S64(port.latency_offset));
            }
            if version >= 34 {
                out.push(Value::String(port.availability_group.clone()));
                out.push(Value::U32(port.port_type));
            }
        }
    }
}
