//! Integration tests for decoding list replies into domain records.
//!
//! Replies are built value by value in server order, encoded to bytes and
//! then decoded through the same path the client uses.

use pulse_proto::domain::{
    decode_record, decode_records, encode_records, CardInfo, CardProfile, DeviceState, ModuleInfo,
    PortAvailable, SinkInfo, SourceInfo,
};
use pulse_proto::domain::sample::{ChannelMap, SampleSpec};
use pulse_proto::domain::volume::{CVolume, Volume};
use pulse_proto::protocol::{decode, encode, INVALID_INDEX, PROTOCOL_VERSION};
use pulse_proto::{DecodeError, Proplist, Value};

/// Sink fields exactly as a version-16 server writes them.
fn sink_values_v16(index: u32, name: &str) -> Vec<Value> {
    vec![
        Value::U32(index),
        Value::string(name),
        Value::string("Null Output"),
        Value::SampleSpec(SampleSpec::default()),
        Value::ChannelMap(ChannelMap::stereo()),
        Value::U32(INVALID_INDEX),
        Value::CVolume(CVolume::uniform(2, Volume::NORMAL)),
        Value::Boolean(true),
        Value::U32(index + 1),
        Value::string(format!("{name}.monitor")),
        Value::Usec(0),
        Value::string("module-null-sink.c"),
        Value::U32(0x0002),
        Value::Proplist(Proplist::new()),
        Value::Usec(40_000),
        Value::Volume(Volume::NORMAL),
        Value::U32(1),
        Value::U32(65_537),
        Value::U32(INVALID_INDEX),
        Value::U32(1),
        Value::string("analog-output"),
        Value::string("Analog Output"),
        Value::U32(9_900),
        Value::string("analog-output"),
    ]
}

#[test]
fn test_decode_sink_list_written_by_version_16_server() {
    // Arrange
    let mut values = sink_values_v16(0, "null");
    values.extend(sink_values_v16(2, "null2"));
    let bytes = encode(&values);

    // Act
    let decoded = decode(&bytes).unwrap();
    let sinks: Vec<SinkInfo> = decode_records(&decoded, 16).unwrap();

    // Assert
    assert_eq!(sinks.len(), 2);
    assert_eq!(sinks[0].name, "null");
    assert_eq!(sinks[0].owner_module, None);
    assert!(sinks[0].mute);
    assert_eq!(sinks[0].monitor_source, Some(1));
    assert_eq!(sinks[0].state, DeviceState::Idle);
    assert_eq!(sinks[0].card, None);
    assert_eq!(sinks[0].ports[0].available, PortAvailable::Unknown);
    assert_eq!(
        sinks[0].active_port().map(|p| p.description.as_str()),
        Some("Analog Output")
    );
    assert_eq!(sinks[1].index, 2);
    assert_eq!(sinks[1].monitor_source_name.as_deref(), Some("null2.monitor"));
}

#[test]
fn test_decoding_with_the_wrong_version_fails_instead_of_misreading() {
    // Arrange – v16 layout read as v21 expects a format count after the ports
    let values = sink_values_v16(0, "null");

    // Act
    let result: Result<SinkInfo, _> = decode_record(&values, 21);

    // Assert
    assert_eq!(result, Err(DecodeError::MissingField("n_formats")));
}

#[test]
fn test_wrong_value_type_is_reported() {
    // Arrange – mute sent as u32
    let mut values = sink_values_v16(0, "null");
    values[7] = Value::U32(1);

    // Act
    let result: Result<SinkInfo, _> = decode_record(&values, 16);

    // Assert
    assert!(matches!(
        result,
        Err(DecodeError::UnexpectedValue {
            expected: "boolean",
            ..
        })
    ));
}

#[test]
fn test_source_list_round_trip_with_monitor() {
    let sources = vec![
        SourceInfo {
            index: 1,
            name: "null.monitor".to_string(),
            monitor_of_sink: Some(0),
            monitor_of_sink_name: Some("null".to_string()),
            base_volume: Volume::NORMAL,
            ..SourceInfo::default()
        },
        SourceInfo {
            index: 5,
            name: "alsa_input.usb".to_string(),
            base_volume: Volume::NORMAL,
            ..SourceInfo::default()
        },
    ];
    let bytes = encode(&encode_records(&sources, PROTOCOL_VERSION));
    let decoded: Vec<SourceInfo> =
        decode_records(&decode(&bytes).unwrap(), PROTOCOL_VERSION).unwrap();
    assert_eq!(decoded, sources);
    assert!(decoded[0].is_monitor());
    assert!(!decoded[1].is_monitor());
}

#[test]
fn test_card_list_round_trip_at_every_port_version() {
    let card = CardInfo {
        index: 0,
        name: "card0".to_string(),
        owner_module: Some(4),
        driver: "module-alsa-card.c".to_string(),
        profiles: vec![CardProfile {
            name: "output:analog-stereo".to_string(),
            description: "Analog Stereo Output".to_string(),
            n_sinks: 1,
            n_sources: 0,
            priority: 6_500,
            available: true,
        }],
        active_profile: Some("output:analog-stereo".to_string()),
        proplist: Proplist::new(),
        ports: Vec::new(),
    };
    for version in [13, 26, 27, 29, 34, PROTOCOL_VERSION] {
        let values = encode_records(std::slice::from_ref(&card), version);
        let decoded: Vec<CardInfo> = decode_records(&values, version).unwrap();
        assert_eq!(decoded, vec![card.clone()], "version {version}");
    }
}

#[test]
fn test_module_list_parses_arguments() {
    // Arrange
    let values = vec![
        Value::U32(22),
        Value::string("module-null-sink"),
        Value::string("sink_name=null sink_properties=\"device.description='Null Output'\""),
        Value::U32(INVALID_INDEX),
        Value::Proplist(Proplist::new()),
    ];

    // Act
    let modules: Vec<ModuleInfo> = decode_records(&values, PROTOCOL_VERSION).unwrap();

    // Assert
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].n_used, None);
    let args = modules[0].arguments();
    assert_eq!(args.get("sink_name"), Some("null"));
    assert_eq!(
        args.get("sink_properties"),
        Some("device.description='Null Output'")
    );
}
