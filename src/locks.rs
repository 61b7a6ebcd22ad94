use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::record::Rid;

/// Uniquely identifies a running transaction.
pub type TransactionId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Per-record lock state: any number of shared holders, or one exclusive
/// holder.
#[derive(Debug, Default)]
struct LockEntry {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockEntry {
    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }
}

/// Record-level two-phase locking with shared/exclusive modes and upgrade.
/// Acquisition is non-blocking: a refused request returns `false`
/// immediately and the caller is expected to abort. With no waiting there
/// are no deadlocks; heavy contention shows up as aborts instead.
#[derive(Debug)]
pub struct LockManager {
    entries: Mutex<HashMap<Rid, LockEntry>>,

    /// Next transaction identifier to hand out.
    next_transaction_id: AtomicU64,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            entries: Mutex::new(HashMap::new()),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh transaction identifier.
    pub fn next_transaction_id(&self) -> TransactionId {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Try to acquire `rid` in `mode` for transaction `tid`.
    ///
    /// Shared: granted iff there is no exclusive holder, or the caller
    /// already holds the record exclusively. Exclusive: granted iff there
    /// are no other holders, the caller is the sole shared holder
    /// (upgrade), or the caller already holds it exclusively (idempotent).
    pub fn acquire(&self, tid: TransactionId, rid: Rid, mode: LockMode) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(rid).or_default();

        match mode {
            LockMode::Shared => {
                if let Some(owner) = entry.exclusive {
                    return owner == tid;
                }

                entry.shared.insert(tid);
                true
            }

            LockMode::Exclusive => {
                if entry.exclusive == Some(tid) {
                    return true;
                }

                if entry.exclusive.is_some() {
                    return false;
                }

                let sole_shared_holder =
                    entry.shared.is_empty() || (entry.shared.len() == 1 && entry.shared.contains(&tid));

                if sole_shared_holder {
                    entry.shared.remove(&tid);
                    entry.exclusive = Some(tid);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Release whatever `tid` holds on `rid`. The entry is dropped once no
    /// holders remain.
    pub fn release(&self, tid: TransactionId, rid: Rid) {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get_mut(&rid) {
            entry.shared.remove(&tid);

            if entry.exclusive == Some(tid) {
                entry.exclusive = None;
            }

            if entry.is_empty() {
                entries.remove(&rid);
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        LockManager::new()
    }
}
