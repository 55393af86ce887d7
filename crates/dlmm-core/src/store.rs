//! # Account Store
//!
//! The engine persists Pool, BinArray and Position records through the
//! [`AccountStore`] key-value interface. Records cross the boundary as borsh
//! bytes, so every operation starts from what the store holds and nothing
//! survives in memory between calls.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::debug;

use crate::error::{DlmmError, DlmmResult};
use crate::state::{BinArray, Pool, Position, RecordKey};

/// Key-value persistence for engine records
pub trait AccountStore {
    fn get(&self, key: &RecordKey) -> Option<Vec<u8>>;
    fn put(&mut self, key: RecordKey, data: Vec<u8>);
    fn remove(&mut self, key: &RecordKey);
}

/// A record that can be written to and read from an [`AccountStore`]
pub trait Record: BorshSerialize + BorshDeserialize + Sized {
    const NAME: &'static str;

    fn encode(&self) -> DlmmResult<Vec<u8>> {
        self.try_to_vec().map_err(DlmmError::corrupt)
    }

    fn decode(bytes: &[u8]) -> DlmmResult<Self> {
        Self::try_from_slice(bytes)
            .map_err(|e| DlmmError::CorruptRecord(format!("{}: {}", Self::NAME, e)))
    }
}

impl Record for Pool {
    const NAME: &'static str = "pool";
}

impl Record for Position {
    const NAME: &'static str = "position";
}

impl Record for BinArray {
    const NAME: &'static str = "bin_array";

    fn decode(bytes: &[u8]) -> DlmmResult<Self> {
        let array = Self::try_from_slice(bytes)
            .map_err(|e| DlmmError::CorruptRecord(format!("{}: {}", Self::NAME, e)))?;
        array.validate()?;
        Ok(array)
    }
}

/// Read and decode a record, `None` when the key is absent
pub fn load_record<R: Record, S: AccountStore + ?Sized>(
    store: &S,
    key: &RecordKey,
) -> DlmmResult<Option<R>> {
    match store.get(key) {
        Some(bytes) => {
            debug!(record = R::NAME, ?key, len = bytes.len(), "Loaded record");
            R::decode(&bytes).map(Some)
        }
        None => Ok(None),
    }
}

/// Encode and write a record
pub fn save_record<R: Record, S: AccountStore + ?Sized>(
    store: &mut S,
    key: RecordKey,
    record: &R,
) -> DlmmResult<()> {
    let bytes = record.encode()?;
    store.put(key, bytes);
    Ok(())
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Process-local store keyed by each record's byte address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw bytes stored under `key`; lets tests corrupt a record
    pub fn raw_mut(&mut self, key: &RecordKey) -> Option<&mut Vec<u8>> {
        self.records.get_mut(&key.to_bytes())
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> Option<Vec<u8>> {
        self.records.get(&key.to_bytes()).cloned()
    }

    fn put(&mut self, key: RecordKey, data: Vec<u8>) {
        self.records.insert(key.to_bytes(), data);
    }

    fn remove(&mut self, key: &RecordKey) {
        self.records.remove(&key.to_bytes());
    }
}
