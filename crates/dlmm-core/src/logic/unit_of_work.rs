//! Unit of Work pattern for state management
//!
//! Tracks every record loaded during one operation and the pending version
//! of each. Nothing reaches the store until [`WorkUnit::commit`]; dropping
//! an uncommitted unit discards all pending changes, which is how a failed
//! operation rolls back. A unit opened with [`WorkUnit::read_only`] borrows
//! the store shared and can never commit.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{DlmmError, DlmmResult};
use crate::state::{BinArray, BinArrayKey, Pool, PoolKey, Position, PositionKey, RecordKey};
use crate::store::{load_record, AccountStore, Record};

// ============================================================================
// Core Unit of Work Types
// ============================================================================

/// Pending version of a tracked record
#[derive(Clone, Debug)]
enum StateChange {
    Pool(Box<Pool>),
    BinArray(Box<BinArray>),
    Position(Box<Position>),
    /// Record is deleted on commit
    Removed,
}

// ============================================================================
// Unit of Work Implementation
// ============================================================================

/// Store borrow held by a unit
enum StoreHandle<'s, S: ?Sized> {
    Shared(&'s S),
    Exclusive(&'s mut S),
}

impl<S: ?Sized> StoreHandle<'_, S> {
    fn get(&self) -> &S {
        match self {
            Self::Shared(store) => *store,
            Self::Exclusive(store) => &**store,
        }
    }
}

pub struct WorkUnit<'s, S: AccountStore + ?Sized> {
    store: StoreHandle<'s, S>,

    /// Pending changes to be committed
    pending_changes: BTreeMap<RecordKey, StateChange>,

    committed: bool,
}

impl<'s, S: AccountStore + ?Sized> WorkUnit<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self::with_handle(StoreHandle::Exclusive(store))
    }

    /// Working set over a shared borrow; changes can be staged but not committed
    pub fn read_only(store: &'s S) -> Self {
        Self::with_handle(StoreHandle::Shared(store))
    }

    fn with_handle(store: StoreHandle<'s, S>) -> Self {
        Self {
            store,
            pending_changes: BTreeMap::new(),
            committed: false,
        }
    }

    /// Read a record from the store without tracking it
    fn fetch<R: Record>(&self, key: &RecordKey) -> DlmmResult<Option<R>> {
        load_record::<R, S>(self.store.get(), key)
    }

    // ========================================================================
    // Pool
    // ========================================================================

    /// Load the pool, preferring the pending version
    pub fn load_pool(&mut self, key: &PoolKey) -> DlmmResult<Pool> {
        let record_key = RecordKey::Pool(*key);
        match self.pending_changes.get(&record_key) {
            Some(StateChange::Pool(pool)) => return Ok((**pool).clone()),
            Some(_) => return Err(DlmmError::PoolNotFound),
            None => {}
        }

        let pool: Pool = self.fetch(&record_key)?.ok_or(DlmmError::PoolNotFound)?;
        if pool.key() != *key {
            return Err(DlmmError::PoolMismatch);
        }
        Ok(pool)
    }

    /// True when the store or the pending set holds this pool
    pub fn pool_exists(&self, key: &PoolKey) -> bool {
        let record_key = RecordKey::Pool(*key);
        match self.pending_changes.get(&record_key) {
            Some(StateChange::Pool(_)) => true,
            Some(_) => false,
            None => self.store.get().get(&record_key).is_some(),
        }
    }

    pub fn stage_pool(&mut self, pool: Pool) {
        self.pending_changes
            .insert(RecordKey::Pool(pool.key()), StateChange::Pool(Box::new(pool)));
    }

    // ========================================================================
    // Bin Arrays
    // ========================================================================

    /// Mutable pending bin array, `None` when it does not exist
    pub fn bin_array_mut(&mut self, key: &BinArrayKey) -> DlmmResult<Option<&mut BinArray>> {
        let record_key = RecordKey::BinArray(*key);

        if !self.pending_changes.contains_key(&record_key) {
            let loaded: Option<BinArray> = self.fetch(&record_key)?;
            let Some(array) = loaded else {
                return Ok(None);
            };
            if array.pool != key.pool || array.index != key.index {
                return Err(DlmmError::PoolMismatch);
            }
            self.pending_changes
                .insert(record_key, StateChange::BinArray(Box::new(array)));
        }

        match self.pending_changes.get_mut(&record_key) {
            Some(StateChange::BinArray(array)) => Ok(Some(array.as_mut())),
            _ => Ok(None),
        }
    }

    /// Mutable pending bin array, created empty when it does not exist
    pub fn bin_array_or_init(&mut self, key: &BinArrayKey) -> DlmmResult<&mut BinArray> {
        if self.bin_array_mut(key)?.is_none() {
            debug!(index = key.index, "Creating bin array");
            self.stage_bin_array(BinArray::new(key.pool, key.index));
        }
        match self.pending_changes.get_mut(&RecordKey::BinArray(*key)) {
            Some(StateChange::BinArray(array)) => Ok(array.as_mut()),
            _ => Err(DlmmError::BinArrayNotFound(key.index)),
        }
    }

    pub fn bin_array_exists(&self, key: &BinArrayKey) -> bool {
        let record_key = RecordKey::BinArray(*key);
        match self.pending_changes.get(&record_key) {
            Some(StateChange::BinArray(_)) => true,
            Some(_) => false,
            None => self.store.get().get(&record_key).is_some(),
        }
    }

    pub fn stage_bin_array(&mut self, array: BinArray) {
        let key = RecordKey::BinArray(BinArrayKey {
            pool: array.pool,
            index: array.index,
        });
        self.pending_changes
            .insert(key, StateChange::BinArray(Box::new(array)));
    }

    // ========================================================================
    // Positions
    // ========================================================================

    /// Load a position, `None` when the owner has none in this pool
    pub fn load_position(&mut self, key: &PositionKey) -> DlmmResult<Option<Position>> {
        let record_key = RecordKey::Position(*key);
        match self.pending_changes.get(&record_key) {
            Some(StateChange::Position(position)) => return Ok(Some((**position).clone())),
            Some(_) => return Ok(None),
            None => {}
        }

        let loaded: Option<Position> = self.fetch(&record_key)?;
        if let Some(position) = &loaded {
            if position.key() != *key {
                return Err(DlmmError::PoolMismatch);
            }
        }
        Ok(loaded)
    }

    /// Stage a position; an empty one is pruned on commit
    pub fn stage_position(&mut self, position: Position) {
        let key = RecordKey::Position(position.key());
        let change = if position.is_empty() {
            StateChange::Removed
        } else {
            StateChange::Position(Box::new(position))
        };
        self.pending_changes.insert(key, change);
    }

    // ========================================================================
    // Commit & Rollback
    // ========================================================================

    /// Write every pending change back to the store
    pub fn commit(mut self) -> DlmmResult<()> {
        let store = match &mut self.store {
            StoreHandle::Exclusive(store) => &mut **store,
            StoreHandle::Shared(_) => return Err(DlmmError::ReadOnlyCommit),
        };

        // Encode everything first so a failure leaves the store untouched
        let mut writes = Vec::with_capacity(self.pending_changes.len());
        for (key, change) in &self.pending_changes {
            let bytes = match change {
                StateChange::Pool(pool) => Some(pool.encode()?),
                StateChange::BinArray(array) => Some(array.encode()?),
                StateChange::Position(position) => Some(position.encode()?),
                StateChange::Removed => None,
            };
            writes.push((*key, bytes));
        }

        let count = writes.len();
        for (key, bytes) in writes {
            match bytes {
                Some(bytes) => store.put(key, bytes),
                None => store.remove(&key),
            }
        }

        self.committed = true;
        debug!(records = count, "Committed work unit");
        Ok(())
    }

    pub fn has_changes(&self) -> bool {
        !self.pending_changes.is_empty()
    }

    pub fn tracked_count(&self) -> usize {
        self.pending_changes.len()
    }
}

// ============================================================================
// Drop Implementation
// ============================================================================

impl<'s, S: AccountStore + ?Sized> Drop for WorkUnit<'s, S> {
    fn drop(&mut self) {
        if !self.committed && self.has_changes() {
            debug!(
                records = self.pending_changes.len(),
                "WorkUnit dropped with uncommitted changes"
            );
        }
    }
}
