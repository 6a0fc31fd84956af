//! Background writer for the history document.
//!
//! Mutations hand over a finished snapshot and return immediately. The slot
//! holds at most one pending snapshot; a newer one replaces it. The worker
//! thread writes outside every store lock, through a gate that keeps two
//! writes (or a write and a reload read) from touching the file at once.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use super::HistoryData;
use crate::error::{Result, StoreError};
use crate::storage::SharedDocumentStore;

/// Counters for completed background writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub scheduled: u64,
    pub superseded: u64,
    pub written: u64,
    pub failed: u64,
}

#[derive(Default)]
struct PersistSlot {
    pending: Option<HistoryData>,
    writing: bool,
    shutdown: bool,
    stats: PersistStats,
}

struct PersistShared {
    store: SharedDocumentStore<HistoryData>,
    slot: Mutex<PersistSlot>,
    wake: Condvar,
    idle: Condvar,
    write_gate: Mutex<()>,
}

pub(crate) struct PersistWorker {
    shared: Arc<PersistShared>,
    handle: Option<JoinHandle<()>>,
}

impl PersistWorker {
    pub(crate) fn spawn(store: SharedDocumentStore<HistoryData>) -> Result<Self> {
        let shared = Arc::new(PersistShared {
            store,
            slot: Mutex::new(PersistSlot::default()),
            wake: Condvar::new(),
            idle: Condvar::new(),
            write_gate: Mutex::new(()),
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("history-persist".to_string())
            .spawn(move || run(&worker_shared))
            .map_err(|error| {
                StoreError::Worker(format!("failed to start history writer: {error}"))
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Queues `snapshot`, replacing any snapshot not yet picked up.
    pub(crate) fn schedule(&self, snapshot: HistoryData) {
        let mut slot = self.shared.slot.lock();
        slot.stats.scheduled += 1;
        if slot.pending.replace(snapshot).is_some() {
            slot.stats.superseded += 1;
        }
        self.shared.wake.notify_one();
    }

    /// Blocks until nothing is pending or being written.
    pub(crate) fn wait_idle(&self) {
        let mut slot = self.shared.slot.lock();
        while slot.pending.is_some() || slot.writing {
            self.shared.idle.wait(&mut slot);
        }
    }

    /// Reads the document while no write is in progress.
    pub(crate) fn load(&self) -> Result<HistoryData> {
        let _gate = self.shared.write_gate.lock();
        self.shared.store.load_or_create()
    }

    pub(crate) fn stats(&self) -> PersistStats {
        self.shared.slot.lock().stats
    }

    pub(crate) fn location(&self) -> &std::path::Path {
        self.shared.store.location()
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("history writer thread panicked");
            }
        }
    }
}

fn run(shared: &PersistShared) {
    loop {
        let snapshot = {
            let mut slot = shared.slot.lock();
            loop {
                if let Some(snapshot) = slot.pending.take() {
                    slot.writing = true;
                    break snapshot;
                }
                if slot.shutdown {
                    return;
                }
                shared.wake.wait(&mut slot);
            }
        };

        let result = {
            let _gate = shared.write_gate.lock();
            shared.store.save(&snapshot)
        };

        let mut slot = shared.slot.lock();
        slot.writing = false;
        match result {
            Ok(()) => {
                slot.stats.written += 1;
                tracing::debug!(shortcuts = snapshot.len(), "history save succeeded");
            }
            Err(error) => {
                slot.stats.failed += 1;
                tracing::warn!(
                    path = %shared.store.location().display(),
                    "history save failed: {error}"
                );
            }
        }
        shared.idle.notify_all();
    }
}
