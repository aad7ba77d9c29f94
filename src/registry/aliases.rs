//! Realm-scoped alias table.

use crate::error::Result;
use crate::keys;
use crate::table::Table;
use crate::types::{AliasEntry, DefineOutcome, RemoveOutcome, TableValue};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Resolves alias names to canonical subjects, one hop only.
///
/// The table never holds a chain: targets are collapsed on definition and a
/// name that other aliases point at cannot itself become an alias. That
/// keeps `resolve` idempotent without any cycle detection.
pub struct AliasResolver {
    table: Arc<Table>,
    /// Serializes alias writes, which read more than one key.
    write_lock: Mutex<()>,
    verbose: bool,
}

impl AliasResolver {
    pub fn new(table: Arc<Table>, verbose: bool) -> Self {
        Self {
            table,
            write_lock: Mutex::new(()),
            verbose,
        }
    }

    /// Resolve `name` in `realm` to its canonical, normalized subject.
    ///
    /// A name that is not an alias resolves to itself. The output is never
    /// looked up again.
    pub fn resolve(&self, realm: &str, name: &str) -> String {
        let name = keys::normalize(name);
        let key = keys::encode(realm, &name);

        let resolved = match self.table.get(&key) {
            Some(TableValue::Alias(target)) if !target.is_empty() => target,
            _ => name,
        };

        if self.verbose {
            debug!(realm = %realm, key = %key, resolved = %resolved, "resolved alias");
        }
        resolved
    }

    /// Point `alias` at `target` in `realm`.
    ///
    /// Existing aliases are never overwritten; remove them first. If
    /// `target` is itself an alias it is collapsed to what that alias
    /// points at.
    pub fn define(&self, realm: &str, alias: &str, target: &str) -> Result<DefineOutcome> {
        let key = keys::encode_checked(realm, alias)?;
        keys::validate(target)?;
        let alias = keys::normalize(alias);

        let _lock = self.write_lock.lock();

        if let Some(TableValue::Alias(existing)) = self.table.get(&key) {
            if !existing.is_empty() {
                return Ok(DefineOutcome::AlreadyExists { target: existing });
            }
        }

        let mut referrers = self.referrers(realm, &alias);
        if !referrers.is_empty() {
            referrers.sort();
            return Ok(DefineOutcome::IsTarget {
                aliased_by: referrers.swap_remove(0),
            });
        }

        let target = self.resolve(realm, target);
        debug!(realm = %realm, alias = %alias, target = %target, "defined alias");
        self.table.set(key, TableValue::Alias(target));

        Ok(DefineOutcome::Defined)
    }

    /// Delete `alias` from `realm`.
    pub fn remove(&self, realm: &str, alias: &str) -> Result<RemoveOutcome> {
        let key = keys::encode_checked(realm, alias)?;

        let _lock = self.write_lock.lock();
        match self.table.delete(&key) {
            Some(_) => Ok(RemoveOutcome::Removed),
            None => Ok(RemoveOutcome::NotFound),
        }
    }

    /// Re-point every alias in `realm` that targets `from` at `to`.
    /// Returns how many aliases moved.
    pub fn retarget(&self, realm: &str, from: &str, to: &str) -> usize {
        let _lock = self.write_lock.lock();
        let mut moved = 0;

        self.table.retain(|key, value| {
            if keys::belongs_to_realm(key, realm) {
                if let TableValue::Alias(target) = value {
                    if *target == from {
                        *target = to.to_string();
                        moved += 1;
                    }
                }
            }
            true
        });

        moved
    }

    /// All aliases of `realm`, sorted by alias name.
    pub fn list(&self, realm: &str) -> Vec<AliasEntry> {
        let mut entries = self.table.collect(|key, value| {
            let alias = keys::name_in_realm(key, realm)?;
            let target = value.as_alias().filter(|t| !t.is_empty())?;
            Some(AliasEntry {
                alias: alias.to_string(),
                target: target.to_string(),
            })
        });
        entries.sort_by(|a, b| a.alias.cmp(&b.alias));
        entries
    }

    /// Delete every alias of `realm`. Returns the number deleted.
    pub fn drop_realm(&self, realm: &str) -> usize {
        let _lock = self.write_lock.lock();
        self.table.retain(|key, _| !keys::belongs_to_realm(key, realm))
    }

    /// Delete every alias in every realm.
    pub fn clear(&self) {
        let _lock = self.write_lock.lock();
        self.table.clear();
    }

    /// Aliases in `realm` whose target is `name`.
    fn referrers(&self, realm: &str, name: &str) -> Vec<String> {
        self.table.collect(|key, value| {
            let alias = keys::name_in_realm(key, realm)?;
            (value.as_alias()? == name).then(|| alias.to_string())
        })
    }
}
