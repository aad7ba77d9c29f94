//! Periodic write-back and reload of the tables.
//!
//! Long-running processes accumulate spare capacity in the in-memory maps.
//! The daemon flushes each table and reloads it from disk on a fixed
//! interval. A failed reload keeps the table's in-memory state, so a sync
//! never leaves the registry unusable.

use crate::admission::AdmissionController;
use crate::error::{RegistryError, Result};
use crate::table::Table;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one sync pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every table was visited; `failures` of them could not be reloaded.
    Synced { failures: usize },
    /// Another pass was still running.
    Skipped,
}

/// Flushes and reloads a set of tables, and drops expired cooldowns.
pub struct SyncDaemon {
    tables: Vec<Arc<Table>>,
    admission: Option<Arc<AdmissionController>>,
    in_flight: Mutex<()>,
}

impl SyncDaemon {
    pub fn new(tables: Vec<Arc<Table>>) -> Self {
        Self {
            tables,
            admission: None,
            in_flight: Mutex::new(()),
        }
    }

    /// Also clear expired cooldown windows on every pass.
    pub fn with_admission(mut self, admission: Arc<AdmissionController>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Run one pass. Passes never overlap: a call made while another is
    /// running returns `Skipped`.
    pub fn tick(&self) -> TickOutcome {
        let Some(_guard) = self.in_flight.try_lock() else {
            debug!("sync already in flight, skipping");
            return TickOutcome::Skipped;
        };

        if let Some(admission) = &self.admission {
            let expired = admission.cleanup();
            if expired > 0 {
                debug!(expired, "cleared expired cooldowns");
            }
        }

        let mut failures = 0;
        for table in &self.tables {
            if let Err(e) = table.reopen() {
                warn!(path = %table.path().display(), error = %e, "sync failed");
                failures += 1;
            }
        }

        debug!(tables = self.tables.len(), failures, "sync pass complete");
        TickOutcome::Synced { failures }
    }

    /// Start the background thread, ticking every `interval`.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> Result<SyncHandle> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let thread = thread::Builder::new()
            .name("notice-sync".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        self.tick();
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })
            .map_err(RegistryError::Io)?;

        info!(interval_secs = interval.as_secs(), "sync daemon started");
        Ok(SyncHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

/// Handle to a running sync thread. Dropping it stops the thread.
pub struct SyncHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Stop the thread and wait for it to exit. A pass in progress runs
    /// to completion first.
    pub fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the loop
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("sync thread panicked");
            }
            info!("sync daemon stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
