//! Child Records
//!
//! Each process owns the records of the processes it spawned, indexed by
//! pid. A record lives exactly as long as its entry in the map: it is
//! created when the spawn succeeds and destroyed when the parent finishes
//! waiting on it or exits itself.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use crate::syscall::SyscallError;

use super::rendezvous::Rendezvous;
use super::Pid;

/// Parent-side bookkeeping for one spawned process.
pub struct ChildRecord {
    pid: Pid,
    waited: bool,
    status: Arc<Rendezvous<i32>>,
}

impl ChildRecord {
    /// Track a child whose exit status will appear in `status`.
    pub fn new(pid: Pid, status: Arc<Rendezvous<i32>>) -> Self {
        Self {
            pid,
            waited: false,
            status,
        }
    }

    /// The child's pid.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Whether the parent already called wait on this child.
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// Whether the child has terminated.
    pub fn exited(&self) -> bool {
        self.status.is_set()
    }

    /// The child's exit code, once it has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.get()
    }
}

/// The children of one process.
#[derive(Default)]
pub struct Children {
    records: BTreeMap<Pid, ChildRecord>,
}

impl Children {
    /// Create an empty collection.
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Start tracking a child.
    pub fn insert(&mut self, record: ChildRecord) {
        self.records.insert(record.pid, record);
    }

    /// Look up a child.
    pub fn get(&self, pid: Pid) -> Option<&ChildRecord> {
        self.records.get(&pid)
    }

    /// Stop tracking a child.
    pub fn remove(&mut self, pid: Pid) -> Option<ChildRecord> {
        self.records.remove(&pid)
    }

    /// Claim the single wait on `pid`.
    ///
    /// Marks the record waited and hands back the status cell to block on.
    /// Fails for pids that are not children and for a second wait, whether
    /// or not the child has exited yet.
    pub fn claim_wait(&mut self, pid: Pid) -> Result<Arc<Rendezvous<i32>>, SyscallError> {
        let record = self.records.get_mut(&pid).ok_or(SyscallError::NoSuchChild)?;
        if record.waited {
            return Err(SyscallError::AlreadyWaited);
        }
        record.waited = true;
        Ok(record.status.clone())
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of tracked children.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check for no tracked children.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
