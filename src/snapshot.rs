//! # Copy-on-write snapshot cell.
//!
//! [`SnapshotCell`] holds the observable state of one task and hands out
//! consistent, immutable [`Snapshot`]s of it while the owning body keeps
//! mutating.
//!
//! ## Discipline
//! ```text
//! body (one writer)                 observers (any number)
//!   write() ──► WriteGuard          snapshot() ──► Snapshot (Arc clone)
//!     │   DerefMut = Arc::make_mut     │
//!     └── drop: unlock + written hook  └── never blocks another snapshot,
//!                                         blocks at most for an in-flight
//!                                         write guard
//! ```
//!
//! ## Rules
//! - The value lives in an `Arc`; a snapshot clones the `Arc` under the read
//!   lock. The next write detaches (`Arc::make_mut`), so existing snapshots
//!   keep the value they saw.
//! - A write guard must not be taken while one is already held on the same
//!   cell: the `locked_for_write` flag makes that a fail-fast panic instead
//!   of a silent self-deadlock.
//! - Guards are synchronous and must not be held across `.await`; they are
//!   not `Send`, so the compiler enforces this inside task bodies.
//! - Releasing a write guard fires the cell's written hook, which is how a
//!   task's observers learn that there is something new to snapshot.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

type WrittenHook = Box<dyn Fn() + Send + Sync>;

/// Copy-on-write container for one task's observable state.
///
/// Readers and snapshots share the current value; writers detach a private
/// copy only when snapshots are still alive. See the module docs for the
/// locking discipline.
pub struct SnapshotCell<D: Clone> {
    d: RwLock<Arc<D>>,
    locked_for_write: AtomicBool,
    written: OnceLock<WrittenHook>,
}

impl<D: Clone> SnapshotCell<D> {
    /// Creates a cell owning `data` as its initial value.
    pub fn new(data: D) -> Self {
        Self {
            d: RwLock::new(Arc::new(data)),
            locked_for_write: AtomicBool::new(false),
            written: OnceLock::new(),
        }
    }

    /// Installs the hook fired each time a write guard is released.
    ///
    /// Installed once by the runner when the cell is attached to a task;
    /// a bare cell without a hook is fine (unit tests use one).
    pub(crate) fn on_written(&self, hook: impl Fn() + Send + Sync + 'static) {
        if self.written.set(Box::new(hook)).is_err() {
            panic!("snapshot cell written hook installed twice");
        }
    }

    /// Borrows the current value read-only.
    ///
    /// Writes are mediated by [`write`](Self::write), so the body may read
    /// freely between its own writes; the short read lock only orders this
    /// borrow against concurrent snapshots and the write guard.
    pub fn read(&self) -> ReadGuard<'_, D> {
        ReadGuard {
            guard: self.d.read().expect("snapshot cell lock poisoned"),
        }
    }

    /// Acquires scoped exclusive write access.
    ///
    /// # Panics
    /// Panics if a write guard for this cell is already outstanding —
    /// re-entrant write locking is a programming error.
    #[track_caller]
    pub fn write(&self) -> WriteGuard<'_, D> {
        if self.locked_for_write.swap(true, Ordering::Acquire) {
            panic!("re-entrant write guard on a snapshot cell");
        }
        WriteGuard {
            cell: self,
            guard: Some(self.d.write().expect("snapshot cell lock poisoned")),
        }
    }

    /// Takes an immutable snapshot of the current value.
    ///
    /// Cheap: clones the shared handle under the read lock. The physical
    /// copy happens later, inside the next write, and only if needed.
    pub fn snapshot(&self) -> Snapshot<D> {
        let guard = self.d.read().expect("snapshot cell lock poisoned");
        Snapshot(Arc::clone(&guard))
    }
}

/// Read-only borrow of a cell's current value.
pub struct ReadGuard<'a, D> {
    guard: RwLockReadGuard<'a, Arc<D>>,
}

impl<D> Deref for ReadGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.guard
    }
}

/// Scoped exclusive write access to a cell.
///
/// Mutable access detaches the value from outstanding snapshots. Dropping
/// the guard releases the lock and fires the written hook.
pub struct WriteGuard<'a, D: Clone> {
    cell: &'a SnapshotCell<D>,
    guard: Option<RwLockWriteGuard<'a, Arc<D>>>,
}

impl<D: Clone> Deref for WriteGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.guard.as_ref().expect("guard present until drop")
    }
}

impl<D: Clone> DerefMut for WriteGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        // Detaches from live snapshots on first mutable access after a
        // snapshot; a no-op (refcount check) otherwise.
        Arc::make_mut(self.guard.as_mut().expect("guard present until drop"))
    }
}

impl<D: Clone> Drop for WriteGuard<'_, D> {
    fn drop(&mut self) {
        self.cell.locked_for_write.store(false, Ordering::Release);
        drop(self.guard.take());
        if let Some(hook) = self.cell.written.get() {
            hook();
        }
    }
}

/// Immutable view of a task's state at the instant it was taken.
///
/// Cloning is cheap (shared handle). Later writes to the originating cell
/// never show through an existing snapshot.
pub struct Snapshot<D>(Arc<D>);

impl<D> Snapshot<D> {
    /// True if both snapshots view the very same underlying value.
    ///
    /// Snapshots taken at the same quiescent point compare pointer-equal;
    /// equal *contents* after independent writes do not.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<D> Clone for Snapshot<D> {
    fn clone(&self) -> Self {
        Snapshot(Arc::clone(&self.0))
    }
}

impl<D> Deref for Snapshot<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.0
    }
}

impl<D: PartialEq> PartialEq for Snapshot<D> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for Snapshot<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Snapshot").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let cell = SnapshotCell::new(vec![1, 2, 3]);
        let before = cell.snapshot();

        {
            let mut w = cell.write();
            w.push(4);
        }

        let after = cell.snapshot();
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*after, vec![1, 2, 3, 4]);
        assert!(!before.ptr_eq(&after));
    }

    #[test]
    fn snapshots_at_quiescent_point_share_storage() {
        let cell = SnapshotCell::new(7u64);
        let a = cell.snapshot();
        let b = cell.snapshot();
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn write_without_snapshot_does_not_copy() {
        let cell = SnapshotCell::new(0u64);
        {
            let mut w = cell.write();
            *w = 1;
        }
        assert_eq!(*cell.read(), 1);
    }

    #[test]
    #[should_panic(expected = "re-entrant write guard")]
    fn reentrant_write_guard_panics() {
        let cell = SnapshotCell::new(0u64);
        let _w1 = cell.write();
        let _w2 = cell.write();
    }

    #[test]
    fn written_hook_fires_on_guard_release() {
        let fired = Arc::new(AtomicUsize::new(0));
        let cell = SnapshotCell::new(0u64);
        let counter = Arc::clone(&fired);
        cell.on_written(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        {
            let mut w = cell.write();
            *w += 1;
            // not fired while the guard is alive
            assert_eq!(fired.load(Ordering::SeqCst), 0);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
