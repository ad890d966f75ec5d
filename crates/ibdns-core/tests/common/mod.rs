//! Test doubles and common utilities for contract tests
//!
//! `MockRecordStore` keeps records in memory, issues WAPI-shaped
//! references, resolves allocation directives and records every call so
//! tests can assert on exactly what reached the store.

#![allow(dead_code)]

use async_trait::async_trait;
use ibdns_core::error::{Error, Result};
use ibdns_core::record::{
    HostIpv4Addr, NEXT_AVAILABLE_IP_PREFIX, RecordBody, RecordDescriptor, RecordType,
    RemoteRecord,
};
use ibdns_core::state::MemoryStateStore;
use ibdns_core::traits::{RecordStore, StateRecord, StateStore};
use ibdns_core::Reconciler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call received by the mock store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create {
        record_type: RecordType,
        body: RecordBody,
        return_fields: Vec<String>,
    },
    Get {
        record_type: RecordType,
        id: String,
        return_fields: Vec<String>,
    },
    Update {
        record_type: RecordType,
        id: String,
        body: RecordBody,
    },
    Delete {
        record_type: RecordType,
        id: String,
    },
}

/// Store operation, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Get,
    Update,
    Delete,
}

/// In-memory record store that records its calls
///
/// Clones share records, calls and failure settings.
#[derive(Clone, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<HashMap<String, RemoteRecord>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    failures: Arc<Mutex<HashMap<StoreOp, String>>>,
    sequence: Arc<AtomicUsize>,
    allocated: Arc<AtomicUsize>,
    reissue_ids: Arc<AtomicBool>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh reference on every update
    pub fn reissue_ids_on_update(&self) {
        self.reissue_ids.store(true, Ordering::SeqCst);
    }

    /// Fail every call of `op` with a store error carrying `message`
    pub fn fail(&self, op: StoreOp, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op, message.to_string());
    }

    /// Stop failing `op`
    pub fn recover(&self, op: StoreOp) {
        self.failures.lock().unwrap().remove(&op);
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Bodies of every create call
    pub fn created_bodies(&self) -> Vec<RecordBody> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Create { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    /// Bodies of every update call
    pub fn updated_bodies(&self) -> Vec<RecordBody> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Update { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    /// Ids of every delete call
    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The stored record, if present
    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Remove a record behind the reconciler's back
    pub fn remove_out_of_band(&self, id: &str) {
        self.records.lock().unwrap().remove(id);
    }

    fn check_failure(&self, op: StoreOp) -> Result<()> {
        match self.failures.lock().unwrap().get(&op) {
            Some(message) => Err(Error::provider("mock", message.clone())),
            None => Ok(()),
        }
    }

    fn next_ref(&self, record_type: RecordType, name: &str, view: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "record:{}/ZG5z{:04}:{}/{}",
            record_type.as_str().to_lowercase(),
            seq,
            name,
            view
        )
    }

    /// Resolve an allocation directive to a concrete address
    ///
    /// `10.0.0.0/24` yields `10.0.0.10`, `10.0.0.11`, ... and
    /// `2001:db8::/64` yields `2001:db8::a`, `2001:db8::b`, ...
    fn resolve(&self, value: &str) -> String {
        let Some(range) = value.strip_prefix(NEXT_AVAILABLE_IP_PREFIX) else {
            return value.to_string();
        };
        let n = self.allocated.fetch_add(1, Ordering::SeqCst) + 10;
        let base = range.split('/').next().unwrap_or_default();
        if base.contains(':') {
            format!("{}{:x}", base, n)
        } else {
            let (prefix, _) = base.rsplit_once('.').unwrap_or((base, ""));
            format!("{}.{}", prefix, n)
        }
    }

    fn apply_body(&self, record: &mut RemoteRecord, body: &RecordBody) {
        record.name = Some(body.name().to_string());
        match body {
            RecordBody::A(a) => {
                record.ipv4addr = Some(self.resolve(&a.ipv4addr));
                record.ttl = a.ttl.or(record.ttl);
                record.comment = a.comment.clone().or(record.comment.take());
            }
            RecordBody::Aaaa(aaaa) => {
                record.ipv6addr = Some(self.resolve(&aaaa.ipv6addr));
                record.ttl = aaaa.ttl.or(record.ttl);
                record.comment = aaaa.comment.clone().or(record.comment.take());
            }
            RecordBody::Cname(cname) => {
                record.canonical = Some(cname.canonical.clone());
                record.ttl = cname.ttl.or(record.ttl);
                record.comment = cname.comment.clone().or(record.comment.take());
            }
            RecordBody::Host(host) => {
                record.ipv4addrs = Some(
                    host.ipv4addrs
                        .iter()
                        .map(|a| HostIpv4Addr {
                            ipv4addr: self.resolve(&a.ipv4addr),
                        })
                        .collect(),
                );
                record.ttl = host.ttl.or(record.ttl);
                record.comment = host.comment.clone().or(record.comment.take());
            }
        }
    }

    fn not_found(id: &str) -> Error {
        Error::not_found(format!(
            "AdmConDataNotFoundError: Reference {} not found",
            id
        ))
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn create_record(
        &self,
        record_type: RecordType,
        body: &RecordBody,
        return_fields: &[&str],
    ) -> Result<String> {
        self.calls.lock().unwrap().push(StoreCall::Create {
            record_type,
            body: body.clone(),
            return_fields: return_fields.iter().map(|f| f.to_string()).collect(),
        });
        self.check_failure(StoreOp::Create)?;

        let view = body.view().unwrap_or("default").to_string();
        let id = self.next_ref(record_type, body.name(), &view);

        let mut record = RemoteRecord {
            reference: id.clone(),
            view: Some(view),
            ..RemoteRecord::default()
        };
        self.apply_body(&mut record, body);

        self.records.lock().unwrap().insert(id.clone(), record);
        Ok(id)
    }

    async fn get_record(
        &self,
        record_type: RecordType,
        id: &str,
        return_fields: &[&str],
    ) -> Result<RemoteRecord> {
        self.calls.lock().unwrap().push(StoreCall::Get {
            record_type,
            id: id.to_string(),
            return_fields: return_fields.iter().map(|f| f.to_string()).collect(),
        });
        self.check_failure(StoreOp::Get)?;

        self.record(id).ok_or_else(|| Self::not_found(id))
    }

    async fn update_record(
        &self,
        record_type: RecordType,
        id: &str,
        body: &RecordBody,
        _return_fields: &[&str],
    ) -> Result<String> {
        self.calls.lock().unwrap().push(StoreCall::Update {
            record_type,
            id: id.to_string(),
            body: body.clone(),
        });
        self.check_failure(StoreOp::Update)?;

        let mut records = self.records.lock().unwrap();
        let mut record = records.remove(id).ok_or_else(|| Self::not_found(id))?;
        self.apply_body(&mut record, body);

        if self.reissue_ids.load(Ordering::SeqCst) {
            let view = record.view.clone().unwrap_or_default();
            record.reference = self.next_ref(record_type, body.name(), &view);
        }

        let new_id = record.reference.clone();
        records.insert(new_id.clone(), record);
        Ok(new_id)
    }

    async fn delete_record(&self, record_type: RecordType, id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(StoreCall::Delete {
            record_type,
            id: id.to_string(),
        });
        self.check_failure(StoreOp::Delete)?;

        self.records
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// A state store that counts writes and can be made to fail
#[derive(Clone, Default)]
pub struct RecordingStateStore {
    inner: MemoryStateStore,
    set_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl RecordingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_call_count(&self) -> usize {
        self.set_call_count.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// The stored descriptor for a resource
    pub async fn descriptor(&self, resource: &str) -> Option<RecordDescriptor> {
        self.inner
            .get_record(resource)
            .await
            .unwrap()
            .map(|r| r.descriptor)
    }
}

#[async_trait]
impl StateStore for RecordingStateStore {
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>> {
        self.inner.get_record(resource).await
    }

    async fn set_record(&self, resource: &str, record: &StateRecord) -> Result<()> {
        self.set_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk full"));
        }
        self.inner.set_record(resource, record).await
    }

    async fn delete_record(&self, resource: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk full"));
        }
        self.inner.delete_record(resource).await
    }

    async fn list_records(&self) -> Result<Vec<String>> {
        self.inner.list_records().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A reconciler over a clone of `store`
pub fn reconciler(store: &MockRecordStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()))
}

pub fn a_record() -> RecordDescriptor {
    RecordDescriptor::new("A", "www", "example.com", "10.0.0.5")
}
