//! Test helpers shared by the timestamp chain VM crates.
//! Everything here is for tests only, don't depend on it from production code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use timestampvm_common::{BlockId, Clock};
use timestampvm_module_block_store::{InMemoryStore, Store, StoredBlock};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock starting at the given Unix time in seconds.
    pub fn at_secs(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).expect("timestamp in range"))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory store whose write path can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_get: AtomicBool,
    fail_put: AtomicBool,
    fail_set_last_accepted: AtomicBool,
    fail_commit: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_last_accepted(&self, fail: bool) {
        self.fail_set_last_accepted.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }
}

impl Store for FlakyStore {
    fn get_block(&self, id: &BlockId) -> Result<Option<StoredBlock>> {
        if self.fail_get.load(Ordering::SeqCst) {
            bail!("injected get failure");
        }
        self.inner.get_block(id)
    }

    fn put_block(&self, id: &BlockId, block: &StoredBlock) -> Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            bail!("injected put failure");
        }
        self.inner.put_block(id, block)
    }

    fn get_last_accepted(&self) -> Result<Option<BlockId>> {
        self.inner.get_last_accepted()
    }

    fn set_last_accepted(&self, id: &BlockId) -> Result<()> {
        if self.fail_set_last_accepted.load(Ordering::SeqCst) {
            bail!("injected last accepted failure");
        }
        self.inner.set_last_accepted(id)
    }

    fn commit(&self) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            bail!("injected commit failure");
        }
        self.inner.commit()
    }

    fn discard(&self) {
        self.inner.discard()
    }
}

/// 32-byte payload filled with `n`.
pub fn payload(n: u8) -> [u8; 32] {
    [n; 32]
}
