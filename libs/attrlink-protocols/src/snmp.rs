//! SNMP protocol adapter
//!
//! Polls SNMP-managed equipment. Each cycle groups the request into SET and
//! GET commands, chunked so no protocol data unit carries more than
//! `max_objects_per_pdu` objects. SET responses are never used to update
//! state - the device's internal state as returned by a GET may not have
//! changed yet, so state is only trusted from reads (the bonus read issued
//! with every write covers the gap).

pub mod session;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use async_snmp::Oid;
use async_trait::async_trait;
use tracing::warn;

use attrlink::{
    AttrRegistry, AttrSpec, AttrValue, LinkError, PollAdapter, PollRequest, PollResponse,
    Result,
};
use attrlink_config::ExpandedAttr;

pub use session::{SnmpAuthority, SnmpSession, UdpSnmpSession};
pub use types::{native_to_wire, wire_to_native, WireValue};

/// Default cap on objects per protocol data unit (i.e. per packet)
pub const DEFAULT_MAX_OBJECTS_PER_PDU: usize = 24;

fn oid_from_segments(segments: &[u32]) -> Oid {
    Oid::from_slice(segments)
}

/// Build the attribute registry for one SNMP device from expanded
/// definition attributes. Every attribute must carry an OID.
pub fn build_registry(attrs: &[ExpandedAttr]) -> Result<AttrRegistry<Oid>> {
    let specs = attrs
        .iter()
        .map(|attr| {
            let oid = attr.oid.as_deref().ok_or_else(|| {
                LinkError::config(format!("attribute {:?} has no OID", attr.name))
            })?;
            Ok(AttrSpec {
                name: attr.name.clone(),
                kind: attr.kind.clone(),
                access: attr.access,
                polling_period: attr.polling_period,
                identity: oid_from_segments(oid),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    AttrRegistry::new(specs)
}

/// Poll adapter for SNMP devices
pub struct SnmpAdapter<S: SnmpSession> {
    registry: Arc<AttrRegistry<Oid>>,
    session: S,
    max_objects_per_pdu: usize,
    by_oid: HashMap<Oid, String>,
}

impl<S: SnmpSession> SnmpAdapter<S> {
    pub fn new(
        registry: Arc<AttrRegistry<Oid>>,
        session: S,
        max_objects_per_pdu: usize,
    ) -> Self {
        let by_oid = registry
            .iter()
            .map(|spec| (spec.identity.clone(), spec.name.clone()))
            .collect();
        Self {
            registry,
            session,
            max_objects_per_pdu: max_objects_per_pdu.max(1),
            by_oid,
        }
    }
}

#[async_trait]
impl<S: SnmpSession> PollAdapter for SnmpAdapter<S> {
    type Converted = WireValue;

    fn from_native(&self, name: &str, value: &AttrValue) -> Result<WireValue> {
        let spec = self.registry.lookup(name)?;
        types::native_to_wire(spec, value)
    }

    async fn poll(&self, request: PollRequest<WireValue>) -> Result<PollResponse> {
        // Writes first, in registry order, chunked per PDU.
        let writes: Vec<(Oid, WireValue)> = self
            .registry
            .iter()
            .filter_map(|spec| {
                request
                    .writes
                    .get(&spec.name)
                    .map(|value| (spec.identity.clone(), value.clone()))
            })
            .collect();
        for chunk in writes.chunks(self.max_objects_per_pdu) {
            self.session.set(chunk).await?;
        }

        let mut oids = Vec::with_capacity(request.reads.len());
        for name in &request.reads {
            oids.push(self.registry.lookup(name)?.identity.clone());
        }

        let mut response = PollResponse::new();
        for chunk in oids.chunks(self.max_objects_per_pdu) {
            for (oid, value) in self.session.get(chunk).await? {
                let Some(name) = self.by_oid.get(&oid) else {
                    warn!("response for unknown OID {oid}");
                    continue;
                };
                let spec = self.registry.lookup(name)?;
                match types::wire_to_native(spec, &value) {
                    Ok(native) => {
                        response.insert(name.clone(), native);
                    }
                    // A value the device returned in a shape we cannot
                    // coerce: skip it, keep the rest of the cycle.
                    Err(e) => warn!("{e}"),
                }
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use attrlink::{AccessMode, AttrKind, EnumLabels};

    fn expanded(name: &str, tail: u32, kind: AttrKind) -> ExpandedAttr {
        ExpandedAttr {
            name: name.to_string(),
            oid: Some(vec![1, 3, 6, 1, 4, 1, 30966, 1, tail]),
            polling_period: Duration::ZERO,
            access: AccessMode::ReadWrite,
            kind,
        }
    }

    /// Session stub over an in-memory OID table. SETs are recorded but do
    /// not change the table, mirroring a device whose externalized state
    /// lags its acknowledgements.
    #[derive(Default)]
    struct MockSession {
        table: Mutex<HashMap<Oid, WireValue>>,
        gets: Mutex<Vec<Vec<Oid>>>,
        sets: Mutex<Vec<Vec<(Oid, WireValue)>>>,
        fail: AtomicBool,
        stray_response: Mutex<Option<(Oid, WireValue)>>,
    }

    impl MockSession {
        fn seed(&self, oid: Oid, value: WireValue) {
            self.table.lock().expect("lock poisoned").insert(oid, value);
        }

        fn get_chunks(&self) -> Vec<usize> {
            self.gets
                .lock()
                .expect("lock poisoned")
                .iter()
                .map(|chunk| chunk.len())
                .collect()
        }

        fn set_chunks(&self) -> Vec<usize> {
            self.sets
                .lock()
                .expect("lock poisoned")
                .iter()
                .map(|chunk| chunk.len())
                .collect()
        }
    }

    #[async_trait]
    impl SnmpSession for Arc<MockSession> {
        async fn get(&self, oids: &[Oid]) -> Result<Vec<(Oid, WireValue)>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(LinkError::timeout("agent went quiet"));
            }
            self.gets.lock().expect("lock poisoned").push(oids.to_vec());

            let table = self.table.lock().expect("lock poisoned");
            let mut values: Vec<(Oid, WireValue)> = oids
                .iter()
                .filter_map(|oid| table.get(oid).map(|v| (oid.clone(), v.clone())))
                .collect();
            if let Some(stray) = self.stray_response.lock().expect("lock poisoned").take() {
                values.push(stray);
            }
            Ok(values)
        }

        async fn set(&self, bindings: &[(Oid, WireValue)]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(LinkError::timeout("agent went quiet"));
            }
            self.sets
                .lock()
                .expect("lock poisoned")
                .push(bindings.to_vec());
            Ok(())
        }
    }

    fn adapter_with(
        attrs: &[ExpandedAttr],
        max_objects_per_pdu: usize,
    ) -> (SnmpAdapter<Arc<MockSession>>, Arc<MockSession>, Arc<AttrRegistry<Oid>>) {
        let registry = Arc::new(build_registry(attrs).unwrap());
        let session = Arc::new(MockSession::default());
        (
            SnmpAdapter::new(Arc::clone(&registry), Arc::clone(&session), max_objects_per_pdu),
            session,
            registry,
        )
    }

    fn read_request(names: &[&str]) -> PollRequest<WireValue> {
        PollRequest {
            writes: HashMap::new(),
            reads: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_reads_resolve_and_convert() {
        let attrs = [
            expanded("temperature", 1, AttrKind::Int),
            expanded("label", 2, AttrKind::Str),
        ];
        let (adapter, session, registry) = adapter_with(&attrs, DEFAULT_MAX_OBJECTS_PER_PDU);
        session.seed(registry.get("temperature").unwrap().identity.clone(), WireValue::Int(23));
        session.seed(
            registry.get("label").unwrap().identity.clone(),
            WireValue::Bytes(b"rack-4".to_vec()),
        );

        let response = adapter
            .poll(read_request(&["temperature", "label"]))
            .await
            .unwrap();
        assert_eq!(response.get("temperature"), Some(&AttrValue::Int(23)));
        assert_eq!(
            response.get("label"),
            Some(&AttrValue::Str("rack-4".to_string()))
        );
    }

    #[tokio::test]
    async fn test_requests_are_chunked_per_pdu() {
        let attrs: Vec<ExpandedAttr> = (0..5)
            .map(|i| expanded(&format!("a{i}"), i, AttrKind::Int))
            .collect();
        let (adapter, session, registry) = adapter_with(&attrs, 2);
        for spec in registry.iter() {
            session.seed(spec.identity.clone(), WireValue::Int(1));
        }

        let mut request = read_request(&["a0", "a1", "a2", "a3", "a4"]);
        request.writes = HashMap::from([
            ("a0".to_string(), WireValue::Int(9)),
            ("a1".to_string(), WireValue::Int(9)),
            ("a2".to_string(), WireValue::Int(9)),
        ]);

        let response = adapter.poll(request).await.unwrap();
        assert_eq!(response.len(), 5);
        assert_eq!(session.get_chunks(), [2, 2, 1]);
        assert_eq!(session.set_chunks(), [2, 1]);
    }

    #[tokio::test]
    async fn test_set_results_do_not_update_state() {
        let attrs = [expanded("mode", 1, AttrKind::Int)];
        let (adapter, session, registry) = adapter_with(&attrs, DEFAULT_MAX_OBJECTS_PER_PDU);
        let oid = registry.get("mode").unwrap().identity.clone();
        session.seed(oid, WireValue::Int(1));

        // Write 2; the mock device acknowledges but has not externalized
        // the new value, so the bonus read still reports 1.
        let request = PollRequest {
            writes: HashMap::from([("mode".to_string(), WireValue::Int(2))]),
            reads: vec!["mode".to_string()],
        };
        let response = adapter.poll(request).await.unwrap();
        assert_eq!(response.get("mode"), Some(&AttrValue::Int(1)));
        assert_eq!(session.set_chunks(), [1]);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_the_cycle() {
        let attrs = [expanded("temperature", 1, AttrKind::Int)];
        let (adapter, session, _) = adapter_with(&attrs, DEFAULT_MAX_OBJECTS_PER_PDU);
        session.fail.store(true, Ordering::SeqCst);

        let err = adapter
            .poll(read_request(&["temperature"]))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unknown_oid_in_response_is_skipped() {
        let attrs = [expanded("temperature", 1, AttrKind::Int)];
        let (adapter, session, registry) = adapter_with(&attrs, DEFAULT_MAX_OBJECTS_PER_PDU);
        session.seed(registry.get("temperature").unwrap().identity.clone(), WireValue::Int(5));
        *session.stray_response.lock().expect("lock poisoned") =
            Some((oid_from_segments(&[1, 3, 6, 1, 9, 9]), WireValue::Int(99)));

        let response = adapter
            .poll(read_request(&["temperature"]))
            .await
            .unwrap();
        assert_eq!(response.len(), 1);
        assert_eq!(response.get("temperature"), Some(&AttrValue::Int(5)));
    }

    #[tokio::test]
    async fn test_enum_write_validation_via_adapter() {
        let labels =
            EnumLabels::from_named([(1, "on".to_string()), (2, "off".to_string())]).unwrap();
        let attrs = [expanded("outlet", 1, AttrKind::Enum(labels))];
        let (adapter, _, _) = adapter_with(&attrs, DEFAULT_MAX_OBJECTS_PER_PDU);

        let err = adapter.from_native("outlet", &AttrValue::Int(0)).unwrap_err();
        assert!(matches!(err, LinkError::Conversion(_)));
        assert_eq!(
            adapter.from_native("outlet", &AttrValue::Int(1)).unwrap(),
            WireValue::Int(1)
        );
        assert_eq!(
            adapter.from_native("outlet", &AttrValue::Int(2)).unwrap(),
            WireValue::Int(2)
        );
    }

    #[test]
    fn test_build_registry_requires_oids() {
        let mut attr = expanded("temperature", 1, AttrKind::Int);
        attr.oid = None;
        let err = build_registry(&[attr]).unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }
}
