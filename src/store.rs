//! The value type stored in the DHT: domain-name records.

use std::collections::HashMap;
use std::net::IpAddr;

/// Mapping from (domain, record type) to an address.
///
/// Last write wins per (domain, type) pair; there is no versioning or
/// expiry. Every node accepting a store RPC upserts here unconditionally,
/// without any ownership check.
#[derive(Debug, Default)]
pub struct DomainStore {
    records: HashMap<String, HashMap<String, IpAddr>>,
}

impl DomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a record.
    pub fn store_record(&mut self, domain: &str, record_type: &str, addr: IpAddr) {
        self.records
            .entry(domain.to_owned())
            .or_default()
            .insert(record_type.to_owned(), addr);
    }

    /// Look up a record; `None` is the normal "not held here" case, not an
    /// error.
    pub fn retrieve(&self, domain: &str, record_type: &str) -> Option<IpAddr> {
        self.records.get(domain)?.get(record_type).copied()
    }

    /// Number of (domain, type) pairs held.
    pub fn len(&self) -> usize {
        self.records.values().map(|types| types.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
