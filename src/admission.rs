//! Cooldown gate for expensive realm-wide scans.
//!
//! Each (realm, operation class) pair has its own window. Once a call is
//! admitted, further calls of the same class in the same realm are turned
//! away until the window has elapsed. Realms never block each other.

use crate::types::OperationClass;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

/// Decides whether an actor is privileged (skips every cooldown).
pub trait OwnerCheck: Send + Sync {
    fn is_owner(&self, actor: &str) -> bool;
}

impl<F> OwnerCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_owner(&self, actor: &str) -> bool {
        self(actor)
    }
}

/// A fixed set of owner identities.
#[derive(Clone, Debug, Default)]
pub struct StaticOwners {
    owners: HashSet<String>,
}

impl StaticOwners {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

impl OwnerCheck for StaticOwners {
    fn is_owner(&self, actor: &str) -> bool {
        self.owners.contains(actor)
    }
}

/// Per-realm cooldown tracker.
pub struct AdmissionController {
    /// Window for listing subjects and aliases.
    list_window: Duration,
    /// Window for per-actor scans (unsubscribe-all, my-notices).
    scan_window: Duration,
    /// Last admission per (realm, class).
    admitted: Mutex<HashMap<(String, OperationClass), Instant>>,
}

impl AdmissionController {
    pub fn new(list_window: Duration, scan_window: Duration) -> Self {
        Self {
            list_window,
            scan_window,
            admitted: Mutex::new(HashMap::new()),
        }
    }

    /// Cooldown window for `class`.
    pub fn window(&self, class: OperationClass) -> Duration {
        if class.is_listing() {
            self.list_window
        } else {
            self.scan_window
        }
    }

    /// Admit a call, or return how long until the next one will be.
    ///
    /// An admitted call starts a new window for its realm and class.
    pub fn admit(
        &self,
        realm: &str,
        class: OperationClass,
    ) -> std::result::Result<(), Duration> {
        let window = self.window(class);
        let now = Instant::now();
        let mut admitted = self.admitted.lock();

        if let Some(last) = admitted.get(&(realm.to_string(), class)) {
            let elapsed = now.duration_since(*last);
            if elapsed < window {
                let retry_after = window - elapsed;
                debug!(realm = %realm, %class, retry_ms = retry_after.as_millis() as u64, "on cooldown");
                return Err(retry_after);
            }
        }

        admitted.insert((realm.to_string(), class), now);
        Ok(())
    }

    /// Forget every cooldown of `realm`.
    pub fn reset(&self, realm: &str) {
        self.admitted.lock().retain(|(r, _), _| r != realm);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut admitted = self.admitted.lock();
        let before = admitted.len();
        admitted.retain(|(_, class), last| now.duration_since(*last) < self.window(*class));
        before - admitted.len()
    }

    /// Number of tracked (realm, class) windows.
    pub fn tracked(&self) -> usize {
        self.admitted.lock().len()
    }
}
