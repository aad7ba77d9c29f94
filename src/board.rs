//! The notice board: tables, registry, cooldowns and sync in one handle.

use crate::admission::{AdmissionController, OwnerCheck, StaticOwners};
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::keys;
use crate::registry::Registry;
use crate::sync::{SyncDaemon, SyncHandle, TickOutcome};
use crate::table::Table;
use crate::types::{
    AliasEntry, DefineOutcome, DumpEntry, Gated, NoticeOutcome, OperationClass, QueryOutcome,
    RemoveOutcome, RenameOutcome, SubscribeOutcome, UnsubscribeOutcome,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The subscription registry as a running service.
///
/// Opening a board opens both tables, takes their lock files and starts
/// the sync daemon. A successfully opened board is ready; `shutdown` stops
/// the daemon and flushes both tables.
///
/// Listing and per-actor scan operations are cooldown-gated per realm and
/// take the calling actor, so owners can skip the gate.
pub struct NoticeBoard {
    config: RegistryConfig,

    subscriptions: Arc<Table>,
    aliases: Arc<Table>,

    registry: Registry,
    admission: Arc<AdmissionController>,
    owners: Box<dyn OwnerCheck>,

    daemon: Arc<SyncDaemon>,
    sync_handle: Mutex<Option<SyncHandle>>,

    ready: AtomicBool,
}

impl NoticeBoard {
    /// Open the board, using `config.owners` as the owner list.
    pub fn open(config: RegistryConfig) -> Result<Self> {
        let owners = StaticOwners::new(config.owners.iter().cloned());
        Self::open_with_owner_check(config, owners)
    }

    /// Open the board with a custom owner check.
    pub fn open_with_owner_check(
        config: RegistryConfig,
        owners: impl OwnerCheck + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let subscriptions = Arc::new(Table::open(&config.subscriptions_path)?);
        let aliases = Arc::new(Table::open(&config.aliases_path)?);

        let registry = Registry::new(
            Arc::clone(&subscriptions),
            Arc::clone(&aliases),
            config.verbose,
        );
        let admission = Arc::new(AdmissionController::new(
            config.list_cooldown(),
            config.scan_cooldown(),
        ));

        let daemon = Arc::new(
            SyncDaemon::new(vec![Arc::clone(&subscriptions), Arc::clone(&aliases)])
                .with_admission(Arc::clone(&admission)),
        );
        let sync_handle = match config.sync_interval() {
            Some(interval) => Some(Arc::clone(&daemon).spawn(interval)?),
            None => None,
        };

        info!(
            subscriptions = %config.subscriptions_path.display(),
            aliases = %config.aliases_path.display(),
            "notice board ready"
        );

        Ok(Self {
            config,
            subscriptions,
            aliases,
            registry,
            admission,
            owners: Box::new(owners),
            daemon,
            sync_handle: Mutex::new(sync_handle),
            ready: AtomicBool::new(true),
        })
    }

    /// True from a successful open until shutdown.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The underlying registry, ungated.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_owner(&self, actor: &str) -> bool {
        self.owners.is_owner(actor)
    }

    // --- Subscriptions ---

    pub fn subscribe(&self, realm: &str, actor: &str, subject: &str) -> Result<SubscribeOutcome> {
        self.registry.subscribe(realm, actor, subject)
    }

    pub fn subscribe_many<S: AsRef<str>>(
        &self,
        realm: &str,
        actor: &str,
        subjects: &[S],
    ) -> Result<Vec<(String, SubscribeOutcome)>> {
        self.registry.subscribe_many(realm, actor, subjects)
    }

    pub fn unsubscribe(
        &self,
        realm: &str,
        actor: &str,
        subject: &str,
    ) -> Result<UnsubscribeOutcome> {
        self.registry.unsubscribe(realm, actor, subject)
    }

    pub fn query(&self, realm: &str, actor: &str, subject: &str) -> Result<QueryOutcome> {
        self.registry.query(realm, actor, subject)
    }

    pub fn notice(&self, realm: &str, subject: &str) -> Result<NoticeOutcome> {
        self.registry.notice(realm, subject)
    }

    pub fn notices<S: AsRef<str>>(&self, realm: &str, subjects: &[S]) -> Result<Vec<NoticeOutcome>> {
        self.registry.notices(realm, subjects)
    }

    // --- Gated scans ---

    /// Remove `actor` from every subject in `realm`.
    pub fn unsubscribe_all(&self, realm: &str, actor: &str) -> Result<Gated<Vec<String>>> {
        self.gated(realm, actor, OperationClass::UnsubscribeAll, || {
            self.registry.unsubscribe_all(realm, actor)
        })
    }

    /// Subjects in `realm` that `actor` is subscribed to.
    pub fn my_notices(&self, realm: &str, actor: &str) -> Result<Gated<Vec<String>>> {
        self.gated(realm, actor, OperationClass::MyNotices, || {
            self.registry.my_notices(realm, actor)
        })
    }

    /// Known subjects in `realm`.
    pub fn list_subjects(&self, realm: &str, actor: &str) -> Result<Gated<Vec<String>>> {
        self.gated(realm, actor, OperationClass::ListSubjects, || {
            self.registry.list_subjects(realm)
        })
    }

    /// Aliases defined in `realm`.
    pub fn list_aliases(&self, realm: &str, actor: &str) -> Result<Gated<Vec<AliasEntry>>> {
        self.gated(realm, actor, OperationClass::ListAliases, || {
            self.registry.list_aliases(realm)
        })
    }

    // --- Aliases ---

    pub fn define_alias(&self, realm: &str, alias: &str, target: &str) -> Result<DefineOutcome> {
        self.registry.define_alias(realm, alias, target)
    }

    pub fn remove_alias(&self, realm: &str, alias: &str) -> Result<RemoveOutcome> {
        self.registry.remove_alias(realm, alias)
    }

    // --- Administration ---

    pub fn remove(&self, realm: &str, subject: &str) -> Result<RemoveOutcome> {
        self.registry.remove(realm, subject)
    }

    pub fn rename(&self, realm: &str, from: &str, to: &str) -> Result<RenameOutcome> {
        self.registry.rename(realm, from, to)
    }

    /// Delete every subscription of `realm` and forget its cooldowns.
    pub fn drop_realm(&self, realm: &str) -> Result<usize> {
        let dropped = self.registry.drop_realm(realm)?;
        self.admission.reset(realm);
        Ok(dropped)
    }

    pub fn drop_realm_aliases(&self, realm: &str) -> Result<usize> {
        self.registry.drop_realm_aliases(realm)
    }

    pub fn drop_subscriptions(&self) {
        self.registry.drop_subscriptions();
    }

    pub fn drop_aliases(&self) {
        self.registry.drop_aliases();
    }

    pub fn drop_all(&self) {
        self.registry.drop_all();
    }

    pub fn dump(&self) -> Vec<DumpEntry> {
        self.registry.dump()
    }

    // --- Lifecycle ---

    /// Run one sync pass now.
    pub fn sync_now(&self) -> TickOutcome {
        self.daemon.tick()
    }

    /// Write both tables to disk.
    pub fn flush(&self) -> Result<()> {
        self.subscriptions.flush()?;
        self.aliases.flush()?;
        Ok(())
    }

    /// Stop the sync daemon and flush both tables.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(mut handle) = self.sync_handle.lock().take() {
            handle.shutdown();
        }
        self.ready.store(false, Ordering::Release);
        self.flush()?;
        info!("notice board shut down");
        Ok(())
    }

    fn gated<T>(
        &self,
        realm: &str,
        actor: &str,
        class: OperationClass,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<Gated<T>> {
        keys::validate(realm)?;

        if self.owners.is_owner(actor) {
            debug!(realm = %realm, actor = %actor, %class, "owner skips cooldown");
        } else if let Err(retry_after) = self.admission.admit(realm, class) {
            return Ok(Gated::OnCooldown { retry_after });
        }

        op().map(Gated::Ready)
    }
}

impl Drop for NoticeBoard {
    fn drop(&mut self) {
        // Best-effort shutdown on drop
        if self.is_ready() {
            let _ = self.shutdown();
        }
    }
}
