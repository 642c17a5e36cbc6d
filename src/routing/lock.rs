//! Reader/writer lock discipline for rule tables.
//!
//! # Responsibilities
//! - Bound every acquisition with a timeout (fail loudly, never hang)
//! - Let a thread that already holds a table's lock nest calls safely
//! - Release on every exit path, panics included
//!
//! # Design Decisions
//! - Held locks are tracked per thread in a thread-local list keyed by lock id
//! - A nested reader or writer request on a held lock runs the closure directly
//! - Asking for the writer while holding only the reader is refused
//!   (`LockUpgrade`) instead of self-deadlocking until the timeout

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::routing::error::{LockMode, RouteError};

/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(20_000);

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HELD: RefCell<Vec<(u64, LockMode)>> = const { RefCell::new(Vec::new()) };
}

/// A timed, thread-reentrant reader/writer lock scoped to one table.
#[derive(Debug)]
pub struct TableLock {
    id: u64,
    name: String,
    timeout: Duration,
    raw: RwLock<()>,
}

impl TableLock {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            timeout,
            raw: RwLock::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Strongest mode this thread currently holds on this lock.
    pub fn held_by_current_thread(&self) -> Option<LockMode> {
        HELD.with(|held| {
            let held = held.borrow();
            let mut mode = None;
            for (id, m) in held.iter() {
                if *id == self.id {
                    if *m == LockMode::Writer {
                        return Some(LockMode::Writer);
                    }
                    mode = Some(LockMode::Reader);
                }
            }
            mode
        })
    }

    /// Run `f` with shared access.
    pub fn with_reader<R>(&self, f: impl FnOnce() -> R) -> Result<R, RouteError> {
        if self.held_by_current_thread().is_some() {
            return Ok(f());
        }

        let _guard = self
            .raw
            .try_read_for(self.timeout)
            .ok_or_else(|| self.timeout_error(LockMode::Reader))?;
        let _held = HeldMarker::push(self.id, LockMode::Reader);
        Ok(f())
    }

    /// Run `f` with exclusive access.
    pub fn with_writer<R>(&self, f: impl FnOnce() -> R) -> Result<R, RouteError> {
        match self.held_by_current_thread() {
            Some(LockMode::Writer) => return Ok(f()),
            Some(LockMode::Reader) => {
                return Err(RouteError::LockUpgrade {
                    table: self.name.clone(),
                })
            }
            None => {}
        }

        let _guard = self
            .raw
            .try_write_for(self.timeout)
            .ok_or_else(|| self.timeout_error(LockMode::Writer))?;
        let _held = HeldMarker::push(self.id, LockMode::Writer);
        Ok(f())
    }

    fn timeout_error(&self, mode: LockMode) -> RouteError {
        tracing::error!(
            table = %self.name,
            mode = %mode,
            timeout_ms = self.timeout.as_millis() as u64,
            "Rule table lock acquisition timed out"
        );
        RouteError::LockTimeout {
            table: self.name.clone(),
            mode,
            timeout: self.timeout,
        }
    }
}

/// Records a held lock for the current thread; forgets it on drop.
///
/// Declared after the guard so it is dropped first.
struct HeldMarker {
    id: u64,
}

impl HeldMarker {
    fn push(id: u64, mode: LockMode) -> Self {
        HELD.with(|held| held.borrow_mut().push((id, mode)));
        Self { id }
    }
}

impl Drop for HeldMarker {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|(id, _)| *id == self.id) {
                held.remove(pos);
            }
        });
    }
}
