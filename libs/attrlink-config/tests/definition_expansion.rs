//! Device definition expansion tests

use std::io::Write;
use std::time::Duration;

use attrlink::{AccessMode, AttrKind};
use attrlink_config::{load_device_definition, DefinitionError, DeviceDefinition};

const SWITCH_DEFINITION: &str = r#"
name: lab-switch
poll_rate_ms: 500
attributes:
  - name: systemName
    oid: 1.3.6.1.2.1.1.5
    suffix: [0]
    access: read-only
    dtype: string
  - name: portState{}
    oid: 1.3.6.1.2.1.2.2.1.7
    indexes:
      - [1, 3]
    polling_period: 2000
    access: read_write
    dtype: enum
    enum_values:
      1: up
      2: down
  - name: alarmBits
    oid: 1.3.6.1.4.1.30966.10.3
    suffix: [0]
    access: readonly
    dtype: bits
    bit_labels:
      0: fan
      9: psu
"#;

#[test]
fn test_expand_switch_definition() {
    let definition = DeviceDefinition::from_yaml(SWITCH_DEFINITION).unwrap();
    assert_eq!(definition.name.as_deref(), Some("lab-switch"));
    assert_eq!(definition.poll_rate(), Duration::from_millis(500));

    let attrs = definition.expand().unwrap();
    let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        ["systemName", "portState1", "portState2", "portState3", "alarmBits"]
    );

    let system_name = &attrs[0];
    assert_eq!(
        system_name.oid.as_deref(),
        Some(&[1, 3, 6, 1, 2, 1, 1, 5, 0][..])
    );
    assert_eq!(system_name.access, AccessMode::ReadOnly);
    assert_eq!(system_name.polling_period, Duration::ZERO);
    assert_eq!(system_name.kind, AttrKind::Str);

    // Index values are appended to the OID base
    let port2 = &attrs[2];
    assert_eq!(
        port2.oid.as_deref(),
        Some(&[1, 3, 6, 1, 2, 1, 2, 2, 1, 7, 2][..])
    );
    assert_eq!(port2.polling_period, Duration::from_millis(2000));
    match &port2.kind {
        AttrKind::Enum(labels) => {
            assert_eq!(labels.label(1), Some("up"));
            assert_eq!(labels.label(2), Some("down"));
            // Gap at 0 is a placeholder
            assert_eq!(labels.label(0), None);
        }
        other => panic!("expected enum kind, got {other:?}"),
    }

    match &attrs[4].kind {
        AttrKind::Bits(field) => {
            assert_eq!(field.width(), 10);
            assert_eq!(field.label(9), Some("psu"));
        }
        other => panic!("expected bits kind, got {other:?}"),
    }
}

#[test]
fn test_expand_relay_definition() {
    // Relay boards carry no OIDs; the relay index is embedded in the name.
    let definition = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: R{}
    indexes:
      - [1, 8]
    access: read-write
    dtype: bool
"#,
    )
    .unwrap();

    let attrs = definition.expand().unwrap();
    assert_eq!(attrs.len(), 8);
    assert_eq!(attrs[0].name, "R1");
    assert_eq!(attrs[7].name, "R8");
    assert!(attrs.iter().all(|a| a.oid.is_none()));
    assert!(attrs.iter().all(|a| a.kind == AttrKind::Bool));
}

#[test]
fn test_stride_and_start_index() {
    // Hardware at addresses 101/103/105, exposed as sensor1..sensor3.
    let definition = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: sensor{}
    oid: 1.3.6.1.4.1.30966.4
    indexes:
      - start: 101
        end: 105
        step: 2
        start_index: 1
    dtype: int
"#,
    )
    .unwrap();

    let attrs = definition.expand().unwrap();
    let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["sensor1", "sensor2", "sensor3"]);
    assert_eq!(
        attrs[1].oid.as_deref(),
        Some(&[1, 3, 6, 1, 4, 1, 30966, 4, 103][..])
    );
}

#[test]
fn test_cartesian_expansion() {
    let definition = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: shelf{}slot{}
    oid: 1.3.6.1.4.1.30966.7
    indexes:
      - [1, 2]
      - [1, 3]
    dtype: int
"#,
    )
    .unwrap();

    let attrs = definition.expand().unwrap();
    let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "shelf1slot1",
            "shelf1slot2",
            "shelf1slot3",
            "shelf2slot1",
            "shelf2slot2",
            "shelf2slot3",
        ]
    );
    assert_eq!(
        attrs[5].oid.as_deref(),
        Some(&[1, 3, 6, 1, 4, 1, 30966, 7, 2, 3][..])
    );
}

#[test]
fn test_indexes_and_placeholders_must_agree() {
    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: fixedName
    oid: 1.3.6.1.2.1.1.5
    indexes:
      - [1, 4]
    dtype: int
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::IndexesWithoutPlaceholders { .. }
    ));

    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: port{}
    oid: 1.3.6.1.2.1.2.2.1.7
    suffix: [0]
    dtype: int
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::PlaceholdersWithoutIndexes { .. }
    ));
}

#[test]
fn test_non_indexed_oid_requires_suffix() {
    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: systemName
    oid: 1.3.6.1.2.1.1.5
    dtype: string
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(err, DefinitionError::MissingSuffix { .. }));
}

#[test]
fn test_expanded_names_must_be_identifiers() {
    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: "{}port"
    oid: 1.3.6.1.2.1.2.2.1.7
    indexes:
      - [1, 2]
    dtype: int
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(err, DefinitionError::InvalidIdentifier { .. }));
}

#[test]
fn test_duplicate_names_rejected() {
    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: R{}
    indexes:
      - [1, 3]
    dtype: bool
  - name: R2
    dtype: bool
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(err, DefinitionError::DuplicateName { .. }));
}

#[test]
fn test_enum_requires_values() {
    let err = DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: mode
    oid: 1.3.6.1.4.1.30966.9
    suffix: [0]
    dtype: enum
"#,
    )
    .unwrap()
    .expand()
    .unwrap_err();
    assert!(matches!(err, DefinitionError::InvalidType { .. }));
}

#[test]
fn test_access_spellings_accepted() {
    for spelling in ["read-only", "read_only", "readonly"] {
        let yaml = format!(
            r#"
attributes:
  - name: x
    access: {spelling}
    dtype: bool
"#
        );
        let definition = DeviceDefinition::from_yaml(&yaml).unwrap();
        assert_eq!(definition.attributes[0].access, AccessMode::ReadOnly);
    }

    assert!(DeviceDefinition::from_yaml(
        r#"
attributes:
  - name: x
    access: sometimes
    dtype: bool
"#
    )
    .is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SWITCH_DEFINITION.as_bytes()).unwrap();

    let definition = load_device_definition(file.path()).unwrap();
    assert_eq!(definition.expand().unwrap().len(), 5);

    let err = load_device_definition("/nonexistent/definition.yaml").unwrap_err();
    assert!(matches!(err, DefinitionError::Read { .. }));
}
