//! Actor resolution and identity tracking.
//!
//! Every prefix in an IRC line names an actor: a user (`nick!user@host`),
//! a channel, or a server. [`ActorTracker`] classifies raw actor strings
//! and maintains one canonical record per known nick, keyed under the
//! server's advertised case mapping.
//!
//! Identity churn (nick changes, host changes, quits) never mutates a
//! handed-out reference: consumers hold [`Arc<UserSnapshot>`] values that
//! are point-in-time snapshots. A superseded or retired snapshot is
//! flagged stale and stays valid; re-resolve by name to observe updates.
//!
//! The user map is the one structure in this crate read from outside the
//! processing thread, so it lives behind a read-write lock with a single
//! writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::casemap::CaseMapping;

/// Default channel-type prefixes used until ISUPPORT CHANTYPES arrives.
pub const DEFAULT_CHAN_TYPES: [char; 2] = ['#', '&'];

/// An immutable snapshot of a user's identity.
#[derive(Debug)]
pub struct UserSnapshot {
    /// Nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Hostname.
    pub host: String,
    /// Services account, if logged in.
    pub account: Option<String>,
    version: u64,
    stale: AtomicBool,
}

impl UserSnapshot {
    /// Monotonic version of this identity; superseding snapshots carry a
    /// higher version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether this snapshot has been superseded or its entry retired.
    ///
    /// A stale snapshot is still a valid point-in-time view.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    /// The `nick!user@host` form of this snapshot.
    #[must_use]
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.host)
    }

    fn retire(&self) {
        self.stale.store(true, Ordering::Relaxed);
    }
}

impl PartialEq for UserSnapshot {
    fn eq(&self, other: &Self) -> bool {
        // The stale flag is advisory and excluded from identity.
        self.version == other.version
            && self.nick == other.nick
            && self.user == other.user
            && self.host == other.host
            && self.account == other.account
    }
}

impl Eq for UserSnapshot {}

/// A named protocol entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A user with full `nick!user@host` identity.
    User(Arc<UserSnapshot>),
    /// A channel name (leading CHANTYPES prefix).
    Channel(String),
    /// A server name (contains a dot).
    Server(String),
    /// Anything else, kept verbatim.
    Raw(String),
}

impl Actor {
    /// The display name of this actor.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User(user) => &user.nick,
            Self::Channel(name) | Self::Server(name) | Self::Raw(name) => name,
        }
    }

    /// The user snapshot, if this is a user.
    #[must_use]
    pub fn user(&self) -> Option<&Arc<UserSnapshot>> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }
}

/// A channel's member list, in membership (insertion) order.
#[derive(Debug, Clone)]
pub struct ChannelRoster {
    /// Channel name as first seen.
    pub name: String,
    /// Members in join order, current snapshots.
    pub members: Vec<Arc<UserSnapshot>>,
}

/// Resolver and cache for actor identities.
pub struct ActorTracker {
    users: RwLock<HashMap<String, Arc<UserSnapshot>>>,
    rosters: RwLock<HashMap<String, ChannelRoster>>,
    casemap: RwLock<CaseMapping>,
    chan_types: RwLock<Vec<char>>,
    versions: AtomicU64,
}

impl ActorTracker {
    /// Create a tracker with default case mapping and channel types.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            rosters: RwLock::new(HashMap::new()),
            casemap: RwLock::new(CaseMapping::default()),
            chan_types: RwLock::new(DEFAULT_CHAN_TYPES.to_vec()),
            versions: AtomicU64::new(1),
        }
    }

    /// The case mapping in use for nick and channel keys.
    #[must_use]
    pub fn case_mapping(&self) -> CaseMapping {
        *self.casemap.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Adopt a server-advertised case mapping, re-keying cached entries.
    pub fn set_case_mapping(&self, mapping: CaseMapping) {
        {
            let mut casemap = self.casemap.write().unwrap_or_else(|e| e.into_inner());
            if *casemap == mapping {
                return;
            }
            *casemap = mapping;
        }

        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let rekeyed = users
            .drain()
            .map(|(_, snap)| (mapping.fold(&snap.nick), snap))
            .collect();
        *users = rekeyed;
        drop(users);

        let mut rosters = self.rosters.write().unwrap_or_else(|e| e.into_inner());
        let rekeyed = rosters
            .drain()
            .map(|(_, roster)| (mapping.fold(&roster.name), roster))
            .collect();
        *rosters = rekeyed;
    }

    /// Channel-type prefixes used for classification.
    #[must_use]
    pub fn chan_types(&self) -> Vec<char> {
        self.chan_types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Adopt server-advertised channel-type prefixes.
    pub fn set_chan_types(&self, types: impl IntoIterator<Item = char>) {
        let mut chan_types = self.chan_types.write().unwrap_or_else(|e| e.into_inner());
        *chan_types = types.into_iter().collect();
    }

    /// Resolve a raw actor string to a classified [`Actor`].
    ///
    /// Classification order: user grammar, then channel prefix, then
    /// server (dotted), then raw. Never fails; an unparseable string
    /// degrades to [`Actor::Raw`].
    pub fn resolve(&self, raw: &str) -> Actor {
        if let Some((nick, user, host)) = split_userhost(raw) {
            return Actor::User(self.resolve_user(nick, user, host));
        }

        if let Some(first) = raw.chars().next() {
            let rest = &raw[first.len_utf8()..];
            if self.chan_types().contains(&first)
                && !rest.is_empty()
                && rest.chars().all(|c| c != ' ' && !c.is_control())
            {
                return Actor::Channel(raw.to_string());
            }
        }

        if raw.contains('.') {
            Actor::Server(raw.to_string())
        } else {
            Actor::Raw(raw.to_string())
        }
    }

    /// The current snapshot for a nick, if known.
    #[must_use]
    pub fn user(&self, nick: &str) -> Option<Arc<UserSnapshot>> {
        let key = self.case_mapping().fold(nick);
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(&key).cloned()
    }

    /// Apply a nick change, retiring the old key and publishing a
    /// superseding snapshot under the new one.
    ///
    /// Returns the new snapshot, or `None` if the old nick was unknown.
    pub fn note_nick_change(&self, old: &str, new: &str) -> Option<Arc<UserSnapshot>> {
        let mapping = self.case_mapping();
        let old_key = mapping.fold(old);
        let new_key = mapping.fold(new);

        let snap = {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            let prev = users.remove(&old_key)?;
            prev.retire();
            let snap = Arc::new(UserSnapshot {
                nick: new.to_string(),
                user: prev.user.clone(),
                host: prev.host.clone(),
                account: prev.account.clone(),
                version: self.next_version(),
                stale: AtomicBool::new(false),
            });
            users.insert(new_key, snap.clone());
            snap
        };

        self.replace_in_rosters(&old_key, &snap);
        Some(snap)
    }

    /// Apply an account login/logout for a known nick.
    pub fn note_account(&self, nick: &str, account: Option<String>) -> Option<Arc<UserSnapshot>> {
        self.supersede(nick, |prev, version| UserSnapshot {
            nick: prev.nick.clone(),
            user: prev.user.clone(),
            host: prev.host.clone(),
            account,
            version,
            stale: AtomicBool::new(false),
        })
    }

    /// Apply a user/host change (CHGHOST) for a known nick.
    pub fn note_host_change(
        &self,
        nick: &str,
        user: &str,
        host: &str,
    ) -> Option<Arc<UserSnapshot>> {
        self.supersede(nick, |prev, version| UserSnapshot {
            nick: prev.nick.clone(),
            user: user.to_string(),
            host: host.to_string(),
            account: prev.account.clone(),
            version,
            stale: AtomicBool::new(false),
        })
    }

    /// Retire a user entirely (quit): the cache entry is removed and the
    /// last snapshot flagged stale; outstanding references stay valid.
    pub fn remove_user(&self, nick: &str) {
        let key = self.case_mapping().fold(nick);

        let removed = {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            users.remove(&key)
        };
        if let Some(snap) = removed {
            snap.retire();
        }

        let mapping = self.case_mapping();
        let mut rosters = self.rosters.write().unwrap_or_else(|e| e.into_inner());
        for roster in rosters.values_mut() {
            roster.members.retain(|m| mapping.fold(&m.nick) != key);
        }
    }

    /// Record a channel join, preserving membership order.
    pub fn note_join(&self, channel: &str, user: Arc<UserSnapshot>) {
        let mapping = self.case_mapping();
        let chan_key = mapping.fold(channel);
        let nick_key = mapping.fold(&user.nick);

        let mut rosters = self.rosters.write().unwrap_or_else(|e| e.into_inner());
        let roster = rosters.entry(chan_key).or_insert_with(|| ChannelRoster {
            name: channel.to_string(),
            members: Vec::new(),
        });
        if !roster
            .members
            .iter()
            .any(|m| mapping.fold(&m.nick) == nick_key)
        {
            roster.members.push(user);
        }
    }

    /// Record a channel part or kick.
    ///
    /// A user no longer sharing any channel is retired from the cache.
    pub fn note_part(&self, channel: &str, nick: &str) {
        let mapping = self.case_mapping();
        let chan_key = mapping.fold(channel);
        let nick_key = mapping.fold(nick);

        let still_shared = {
            let mut rosters = self.rosters.write().unwrap_or_else(|e| e.into_inner());
            if let Some(roster) = rosters.get_mut(&chan_key) {
                roster.members.retain(|m| mapping.fold(&m.nick) != nick_key);
            }
            rosters
                .values()
                .any(|r| r.members.iter().any(|m| mapping.fold(&m.nick) == nick_key))
        };

        if !still_shared {
            let removed = {
                let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
                users.remove(&nick_key)
            };
            if let Some(snap) = removed {
                snap.retire();
            }
        }
    }

    /// A copy of the channel's current roster, if known.
    #[must_use]
    pub fn channel_roster(&self, channel: &str) -> Option<ChannelRoster> {
        let key = self.case_mapping().fold(channel);
        let rosters = self.rosters.read().unwrap_or_else(|e| e.into_inner());
        rosters.get(&key).cloned()
    }

    /// Discard all cached identity state, restoring defaults.
    pub fn clear(&self) {
        {
            let users = self.users.read().unwrap_or_else(|e| e.into_inner());
            for snap in users.values() {
                snap.retire();
            }
        }
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.rosters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.casemap.write().unwrap_or_else(|e| e.into_inner()) = CaseMapping::default();
        *self.chan_types.write().unwrap_or_else(|e| e.into_inner()) = DEFAULT_CHAN_TYPES.to_vec();
    }

    fn resolve_user(&self, nick: &str, user: &str, host: &str) -> Arc<UserSnapshot> {
        let key = self.case_mapping().fold(nick);

        {
            let users = self.users.read().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = users.get(&key) {
                if existing.nick == nick && existing.user == user && existing.host == host {
                    return existing.clone();
                }
            }
        }

        let snap = {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            let account = users.get(&key).and_then(|u| u.account.clone());
            if let Some(prev) = users.get(&key) {
                prev.retire();
            }
            let snap = Arc::new(UserSnapshot {
                nick: nick.to_string(),
                user: user.to_string(),
                host: host.to_string(),
                account,
                version: self.next_version(),
                stale: AtomicBool::new(false),
            });
            users.insert(key.clone(), snap.clone());
            snap
        };

        self.replace_in_rosters(&key, &snap);
        snap
    }

    fn supersede<F>(&self, nick: &str, build: F) -> Option<Arc<UserSnapshot>>
    where
        F: FnOnce(&UserSnapshot, u64) -> UserSnapshot,
    {
        let key = self.case_mapping().fold(nick);
        let snap = {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            let prev = users.get(&key)?;
            prev.retire();
            let snap = Arc::new(build(prev, self.next_version()));
            users.insert(key.clone(), snap.clone());
            snap
        };
        self.replace_in_rosters(&key, &snap);
        Some(snap)
    }

    fn replace_in_rosters(&self, nick_key: &str, snap: &Arc<UserSnapshot>) {
        let mapping = self.case_mapping();
        let mut rosters = self.rosters.write().unwrap_or_else(|e| e.into_inner());
        for roster in rosters.values_mut() {
            for member in &mut roster.members {
                if mapping.fold(&member.nick) == nick_key {
                    *member = snap.clone();
                }
            }
        }
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ActorTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActorTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let rosters = self.rosters.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ActorTracker")
            .field("users", &users.len())
            .field("rosters", &rosters.len())
            .field("casemap", &self.case_mapping())
            .finish()
    }
}

/// Split `nick!user@host`, requiring each piece to be a nonempty run of
/// non-`!`/non-`@` characters.
fn split_userhost(raw: &str) -> Option<(&str, &str, &str)> {
    let (nick, rest) = raw.split_once('!')?;
    let (user, host) = rest.split_once('@')?;
    if nick.is_empty() || user.is_empty() || host.is_empty() {
        return None;
    }
    if nick.contains('@') || user.contains('!') || host.contains('!') || host.contains('@') {
        return None;
    }
    Some((nick, user, host))
}
