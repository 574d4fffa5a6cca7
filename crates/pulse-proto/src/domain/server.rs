//! Server-wide information returned by `GET_SERVER_INFO`.

use serde::{Deserialize, Serialize};

use crate::domain::sample::{ChannelMap, SampleSpec};
use crate::domain::Record;
use crate::protocol::fields::Fields;
use crate::protocol::tagstruct::{DecodeError, Value};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    pub package_name: String,
    pub package_version: String,
    pub user_name: String,
    pub host_name: String,
    pub sample_spec: SampleSpec,
    pub default_sink_name: Option<String>,
    pub default_source_name: Option<String>,
    pub cookie: u32,
    /// Protocol 15+.
    pub channel_map: ChannelMap,
}

impl Record for ServerInfo {
    fn decode(fields: &mut Fields<'_>, version: u32) -> Result<Self, DecodeError> {
        let mut info = ServerInfo {
            package_name: fields.string_or_empty("package_name")?,
            package_version: fields.string_or_empty("package_version")?,
            user_name: fields.string_or_empty("user_name")?,
            host_name: fields.string_or_empty("host_name")?,
            sample_spec: fields.sample_spec("sample_spec")?,
            default_sink_name: fields.string("default_sink_name")?,
            default_source_name: fields.string("default_source_name")?,
            cookie: fields.u32("cookie")?,
            channel_map: ChannelMap::default(),
        };
        if version >= 15 {
            info.channel_map = fields.channel_map("channel_map")?;
        }
        Ok(info)
    }

    fn encode(&self, out: &mut Vec<Value>, version: u32) {
        out.push(Value::string(self.package_name.as_str()));
        out.push(Value::string(self.package_version.as_str()));
        out.push(Value::string(self.user_name.as_str()));
        out.push(Value::string(self.host_name.as_str()));
        out.push(Value::SampleSpec(self.sample_spec));
        out.push(Value::String(self.default_sink_name.clone()));
        out.push(Value::String(self.default_source_name.clone()));
        out.push(Value::U32(self.cookie));
        if version >= 15 {
            out.push(Value::ChannelMap(self.channel_map.clone()));
        }
    }
}
