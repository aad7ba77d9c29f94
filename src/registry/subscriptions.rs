//! Subscription registry over the subscription and alias tables.

use crate::error::Result;
use crate::keys;
use crate::table::Table;
use crate::types::{
    AliasEntry, DefineOutcome, DumpEntry, NoticeOutcome, QueryOutcome, RemoveOutcome,
    RenameOutcome, SubscribeOutcome, TableValue, UnsubscribeOutcome,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::aliases::AliasResolver;

/// Realm-scoped subscriptions to named subjects.
///
/// Every subject argument is validated, normalized and resolved through the
/// alias table before it touches the subscription table. Read-modify-write
/// sequences run inside `Table::update`, so concurrent subscribers to the
/// same subject cannot lose each other's writes.
///
/// A subject whose subscriber list has become empty keeps its key but reads
/// exactly like an unknown subject.
pub struct Registry {
    subscriptions: Arc<Table>,
    aliases: AliasResolver,
    verbose: bool,
}

impl Registry {
    /// Create a registry over the two tables.
    pub fn new(subscriptions: Arc<Table>, aliases: Arc<Table>, verbose: bool) -> Self {
        Self {
            subscriptions,
            aliases: AliasResolver::new(aliases, verbose),
            verbose,
        }
    }

    /// The alias resolver used by this registry.
    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    // --- Per-actor operations ---

    /// Add `actor` to the subscribers of `subject`.
    pub fn subscribe(&self, realm: &str, actor: &str, subject: &str) -> Result<SubscribeOutcome> {
        let (_, outcome) = self.subscribe_resolved(realm, actor, subject)?;
        Ok(outcome)
    }

    /// Subscribe `actor` to several subjects. Each outcome is paired with
    /// the canonical subject that was written.
    pub fn subscribe_many<S: AsRef<str>>(
        &self,
        realm: &str,
        actor: &str,
        subjects: &[S],
    ) -> Result<Vec<(String, SubscribeOutcome)>> {
        subjects
            .iter()
            .map(|subject| self.subscribe_resolved(realm, actor, subject.as_ref()))
            .collect()
    }

    fn subscribe_resolved(
        &self,
        realm: &str,
        actor: &str,
        subject: &str,
    ) -> Result<(String, SubscribeOutcome)> {
        let (canonical, key) = self.subject_key(realm, subject)?;

        let outcome = self.subscriptions.update(&key, |slot| match slot {
            Some(TableValue::Subscribers(list)) if list.iter().any(|s| s == actor) => {
                SubscribeOutcome::AlreadyJoined
            }
            Some(TableValue::Subscribers(list)) => {
                list.push(actor.to_string());
                SubscribeOutcome::Added
            }
            _ => {
                *slot = Some(TableValue::Subscribers(vec![actor.to_string()]));
                SubscribeOutcome::Added
            }
        });

        debug!(realm = %realm, key = %key, ?outcome, "subscribe");
        Ok((canonical, outcome))
    }

    /// Remove `actor` from the subscribers of `subject`.
    ///
    /// The key stays in the table even when the list becomes empty.
    pub fn unsubscribe(
        &self,
        realm: &str,
        actor: &str,
        subject: &str,
    ) -> Result<UnsubscribeOutcome> {
        let (_, key) = self.subject_key(realm, subject)?;

        let outcome = self.subscriptions.update(&key, |slot| match slot {
            Some(TableValue::Subscribers(list)) if !list.is_empty() => {
                match list.iter().position(|s| s == actor) {
                    Some(pos) => {
                        list.remove(pos);
                        UnsubscribeOutcome::Removed
                    }
                    None => UnsubscribeOutcome::NotSubscribed,
                }
            }
            _ => UnsubscribeOutcome::NoSuchSubject,
        });

        debug!(realm = %realm, key = %key, ?outcome, "unsubscribe");
        Ok(outcome)
    }

    /// Remove `actor` from every subject in `realm`.
    ///
    /// Returns the affected subjects, sorted. The scan holds the table lock
    /// for its whole duration.
    pub fn unsubscribe_all(&self, realm: &str, actor: &str) -> Result<Vec<String>> {
        keys::validate(realm)?;
        let mut affected = Vec::new();

        self.subscriptions.retain(|key, value| {
            let Some(subject) = keys::name_in_realm(key, realm) else {
                return true;
            };
            if let TableValue::Subscribers(list) = value {
                if let Some(pos) = list.iter().position(|s| s == actor) {
                    list.remove(pos);
                    affected.push(subject.to_string());
                }
            }
            true
        });

        affected.sort();
        info!(realm = %realm, actor = %actor, count = affected.len(), "unsubscribed from all");
        Ok(affected)
    }

    /// Whether `subject` is known in `realm`, and if `actor` is on it.
    pub fn query(&self, realm: &str, actor: &str, subject: &str) -> Result<QueryOutcome> {
        let (_, key) = self.subject_key(realm, subject)?;

        let outcome = match self.subscriptions.get(&key) {
            Some(TableValue::Subscribers(list)) if !list.is_empty() => QueryOutcome::Known {
                subscribed: list.iter().any(|s| s == actor),
            },
            _ => QueryOutcome::Unknown,
        };
        Ok(outcome)
    }

    /// The subscribers to ping for `subject`.
    pub fn notice(&self, realm: &str, subject: &str) -> Result<NoticeOutcome> {
        let (subject, key) = self.subject_key(realm, subject)?;

        let outcome = match self.subscriptions.get(&key) {
            Some(TableValue::Subscribers(subscribers)) if !subscribers.is_empty() => {
                NoticeOutcome::Notice {
                    subject,
                    subscribers,
                }
            }
            _ => NoticeOutcome::Unknown { subject },
        };
        Ok(outcome)
    }

    /// `notice` for several subjects, in argument order.
    pub fn notices<S: AsRef<str>>(&self, realm: &str, subjects: &[S]) -> Result<Vec<NoticeOutcome>> {
        subjects
            .iter()
            .map(|subject| self.notice(realm, subject.as_ref()))
            .collect()
    }

    /// Subjects in `realm` that `actor` is subscribed to, sorted.
    pub fn my_notices(&self, realm: &str, actor: &str) -> Result<Vec<String>> {
        keys::validate(realm)?;
        let mut subjects = self.subscriptions.collect(|key, value| {
            let subject = keys::name_in_realm(key, realm)?;
            let list = value.as_subscribers()?;
            list.iter().any(|s| s == actor).then(|| subject.to_string())
        });
        subjects.sort();
        Ok(subjects)
    }

    // --- Listings ---

    /// Known subjects in `realm`, sorted. Subjects with no subscribers left
    /// are not listed.
    pub fn list_subjects(&self, realm: &str) -> Result<Vec<String>> {
        keys::validate(realm)?;
        let mut subjects = self.subscriptions.collect(|key, value| {
            let subject = keys::name_in_realm(key, realm)?;
            let list = value.as_subscribers()?;
            (!list.is_empty()).then(|| subject.to_string())
        });
        subjects.sort();
        Ok(subjects)
    }

    /// Aliases defined in `realm`, sorted by alias.
    pub fn list_aliases(&self, realm: &str) -> Result<Vec<AliasEntry>> {
        keys::validate(realm)?;
        Ok(self.aliases.list(realm))
    }

    /// Every non-empty subscription in every realm, sorted by realm then
    /// subject.
    pub fn dump(&self) -> Vec<DumpEntry> {
        let mut entries = self.subscriptions.collect(|key, value| {
            let (realm, subject) = keys::decode(key)?;
            let subscribers = value.as_subscribers().filter(|list| !list.is_empty())?;
            Some(DumpEntry {
                realm: realm.to_string(),
                subject: subject.to_string(),
                subscribers: subscribers.to_vec(),
            })
        });
        entries.sort_by(|a, b| (&a.realm, &a.subject).cmp(&(&b.realm, &b.subject)));
        entries
    }

    // --- Aliases ---

    pub fn define_alias(&self, realm: &str, alias: &str, target: &str) -> Result<DefineOutcome> {
        self.aliases.define(realm, alias, target)
    }

    pub fn remove_alias(&self, realm: &str, alias: &str) -> Result<RemoveOutcome> {
        self.aliases.remove(realm, alias)
    }

    // --- Administration ---

    /// Delete `subject` and all its subscribers. The name is taken as the
    /// canonical subject; aliases are not followed.
    ///
    /// A subject with no subscribers left is `NotFound`, though its stale
    /// key is still deleted.
    pub fn remove(&self, realm: &str, subject: &str) -> Result<RemoveOutcome> {
        let key = keys::encode_checked(realm, subject)?;

        let outcome = self.subscriptions.update(&key, |slot| match slot.take() {
            Some(value) if !value.is_empty() => RemoveOutcome::Removed,
            _ => RemoveOutcome::NotFound,
        });
        info!(realm = %realm, key = %key, ?outcome, "remove subject");
        Ok(outcome)
    }

    /// Move the subscribers of `from` to `to`.
    ///
    /// If `to` already has subscribers the two lists are merged. Aliases
    /// that pointed at `from` are re-pointed at `to`. A `from` with no
    /// subscribers left is `NotFound`.
    pub fn rename(&self, realm: &str, from: &str, to: &str) -> Result<RenameOutcome> {
        let from_key = keys::encode_checked(realm, from)?;
        keys::validate(to)?;
        let from = keys::normalize(from);
        let to = self.aliases.resolve(realm, to);
        let to_key = keys::encode(realm, &to);

        let renamed = self
            .subscriptions
            .rename(&from_key, &to_key, |moved, existing| {
                let mut merged = existing.as_subscribers().unwrap_or_default().to_vec();
                for actor in moved.as_subscribers().unwrap_or_default() {
                    if !merged.contains(actor) {
                        merged.push(actor.clone());
                    }
                }
                TableValue::Subscribers(merged)
            });

        if !renamed {
            return Ok(RenameOutcome::NotFound);
        }

        let moved = self.aliases.retarget(realm, &from, &to);
        info!(realm = %realm, from = %from, to = %to, aliases = moved, "renamed subject");
        Ok(RenameOutcome::Renamed)
    }

    /// Delete every subscription of `realm`. Returns the number deleted.
    pub fn drop_realm(&self, realm: &str) -> Result<usize> {
        keys::validate(realm)?;
        let dropped = self
            .subscriptions
            .retain(|key, _| !keys::belongs_to_realm(key, realm));
        info!(realm = %realm, dropped, "dropped realm subscriptions");
        Ok(dropped)
    }

    /// Delete every alias of `realm`. Returns the number deleted.
    pub fn drop_realm_aliases(&self, realm: &str) -> Result<usize> {
        keys::validate(realm)?;
        let dropped = self.aliases.drop_realm(realm);
        info!(realm = %realm, dropped, "dropped realm aliases");
        Ok(dropped)
    }

    /// Clear the subscription table.
    pub fn drop_subscriptions(&self) {
        self.subscriptions.clear();
        info!("dropped all subscriptions");
    }

    /// Clear the alias table.
    pub fn drop_aliases(&self) {
        self.aliases.clear();
        info!("dropped all aliases");
    }

    /// Clear both tables.
    pub fn drop_all(&self) {
        self.drop_subscriptions();
        self.drop_aliases();
    }

    /// Validate, resolve and encode a subject. Returns the canonical subject
    /// and its subscription key.
    fn subject_key(&self, realm: &str, subject: &str) -> Result<(String, String)> {
        keys::validate(realm)?;
        keys::validate(subject)?;

        let canonical = self.aliases.resolve(realm, subject);
        let key = keys::encode(realm, &canonical);

        if self.verbose {
            debug!(realm = %realm, subject = %subject, key = %key, "subscription key");
        }
        Ok((canonical, key))
    }
}
