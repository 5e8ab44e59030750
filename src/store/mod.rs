//! Embedded SQLite store for plants, units, readings, alarms, and tickets.
//!
//! One connection behind a mutex: ingest calls from many threads are safe,
//! and a correlation pass holds the lock only per statement batch while
//! SQLite transactions make each multi-row mutation atomic. Writes go
//! through a bounded [`RetryPolicy`] so lock contention surfaces as a
//! retried transient error and never as an indefinite hang.

mod alarms;
mod registry;
mod tickets;

pub use alarms::AlarmRecord;
pub use registry::{ModuleRangeIds, PlantRecord, UnitContext};
pub use tickets::TicketRecord;

use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::db;
use crate::error::{MonitorError, Result};

/// Bounded retry for transient storage failures: up to `max_attempts`
/// attempts with a fixed `delay` between them. Exhaustion converts the last
/// transient error into a fatal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op() {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "transient storage failure, retrying"
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    return Err(MonitorError::FatalStorage(format!(
                        "retry budget exhausted after {max_attempts} attempts: {err}"
                    )));
                }
                other => return other,
            }
        }
    }
}

pub struct Store {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

impl Store {
    pub fn open(path: &Path, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open(path)?),
            retry,
        })
    }

    pub fn in_memory(retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
            retry,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MonitorError::FatalStorage("store mutex poisoned".to_string()))
    }

    /// Read-only access; no retry, reads do not conflict on a single
    /// connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// One transaction: committed when `f` returns `Ok`, rolled back on
    /// `Err` (the transaction drop path), so partial writes never survive.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// A transactional write under the retry policy. Only transient errors
    /// re-run `f`; validation, not-found, and consistency violations pass
    /// straight through.
    pub(crate) fn with_retried_tx<T>(
        &self,
        mut f: impl FnMut(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let retry = self.retry;
        retry.run(|| self.with_tx(&mut f))
    }
}
