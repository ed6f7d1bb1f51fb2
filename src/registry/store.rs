//! Directory implementation
//!
//! The single shared structure holding the live-connection set, the name
//! registry and the group directory. Every read and write goes through one
//! `RwLock`; callers only ever see cloned snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::entry::{ConnectionEntry, ConnectionId, Group, GroupCreated, Recipient};
use super::error::RegistryError;
use crate::fanout::{self, Delivery};
use crate::protocol::ServerMessage;
use crate::stats::RelayMetrics;

/// A registry mutation and the `CLIENTLIST` notification it produced
#[derive(Debug, Clone)]
pub struct RegistryChange {
    /// Name registered or removed
    pub name: String,
    /// Registry snapshot after the change
    pub names: Vec<String>,
    /// Delivery of the `CLIENTLIST` notification
    pub delivery: Delivery,
    /// Groups the connection was pruned from (removals only)
    pub pruned_groups: Vec<String>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    /// Live connections, in accept order
    live: BTreeMap<ConnectionId, ConnectionEntry>,
    /// Registered connections, in registration order
    registered: Vec<ConnectionId>,
    /// Groups by name
    groups: HashMap<String, Group>,
}

impl DirectoryState {
    fn names(&self) -> Vec<String> {
        self.registered
            .iter()
            .filter_map(|id| self.live.get(id))
            .filter_map(|entry| entry.name.clone())
            .collect()
    }

    fn find(&self, name: &str) -> Option<&ConnectionEntry> {
        self.registered
            .iter()
            .filter_map(|id| self.live.get(id))
            .find(|entry| entry.name.as_deref() == Some(name))
    }

    fn recipient(&self, id: ConnectionId) -> Option<Recipient> {
        let entry = self.live.get(&id)?;
        Some(Recipient {
            id,
            name: entry.name.clone()?,
            outbound: entry.outbound.clone(),
        })
    }

    /// Queue `CLIENTLIST` to every live connection while the lock is held,
    /// so concurrent changes are observed in the order they were applied
    fn announce_names(&self, metrics: &RelayMetrics) -> (Vec<String>, Delivery) {
        let names = self.names();
        let frame = ServerMessage::ClientList(names.clone()).encode();
        let delivery = fanout::broadcast(
            self.live.values().map(|entry| &entry.outbound),
            &frame,
            None,
            metrics,
        );
        (names, delivery)
    }

    fn unregister(&mut self, id: ConnectionId) -> Option<(String, Vec<String>)> {
        let position = self.registered.iter().position(|r| *r == id)?;
        self.registered.remove(position);

        let name = self.live.get_mut(&id).and_then(|entry| entry.name.take())?;

        let mut pruned: Vec<String> = self
            .groups
            .values_mut()
            .filter_map(|group| group.prune(id).then(|| group.name.clone()))
            .collect();
        pruned.sort();

        Some((name, pruned))
    }

    /// Unregister `id`, optionally evict it from the live set, then announce
    /// the new list to every connection still live
    fn release(
        &mut self,
        id: ConnectionId,
        evict: bool,
        metrics: &RelayMetrics,
    ) -> (Option<ConnectionEntry>, Option<RegistryChange>) {
        let unregistered = self.unregister(id);
        let entry = if evict { self.live.remove(&id) } else { None };

        let change = unregistered.map(|(name, pruned_groups)| {
            let (names, delivery) = self.announce_names(metrics);
            RegistryChange {
                name,
                names,
                delivery,
                pruned_groups,
            }
        });

        (entry, change)
    }
}

/// Shared registry, group directory and live-connection set
#[derive(Debug)]
pub struct Directory {
    state: RwLock<DirectoryState>,
    metrics: Arc<RelayMetrics>,
}

impl Directory {
    /// Create an empty directory with its own metrics
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(RelayMetrics::new()))
    }

    /// Create an empty directory that records into `metrics`
    pub fn with_metrics(metrics: Arc<RelayMetrics>) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    // --- live-connection set ---

    /// Add an accepted connection to the live set
    pub async fn add_connection(&self, entry: ConnectionEntry) {
        let mut state = self.state.write().await;
        state.live.insert(entry.id, entry);
    }

    /// Remove a connection from the live set, unregistering it if needed
    ///
    /// Returns the removed entry (None if already gone, e.g. after `clear`)
    /// and the registry change if the connection had a name.
    pub async fn remove_connection(
        &self,
        id: ConnectionId,
    ) -> (Option<ConnectionEntry>, Option<RegistryChange>) {
        let mut state = self.state.write().await;
        state.release(id, true, &self.metrics)
    }

    /// Drop every live connection and registration
    ///
    /// Groups survive; their memberships are emptied since every member is
    /// gone. Returns the removed entries.
    pub async fn clear(&self) -> Vec<ConnectionEntry> {
        let mut state = self.state.write().await;

        state.registered.clear();
        for group in state.groups.values_mut() {
            group.members.clear();
        }

        std::mem::take(&mut state.live).into_values().collect()
    }

    /// Number of live connections (handshaked or not)
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.live.len()
    }

    /// Queue a frame for every live connection except `excluding`
    pub async fn broadcast(&self, frame: &Bytes, excluding: Option<ConnectionId>) -> Delivery {
        let state = self.state.read().await;
        fanout::broadcast(
            state.live.values().map(|entry| &entry.outbound),
            frame,
            excluding,
            &self.metrics,
        )
    }

    // --- name registry ---

    /// Register (or rename) a live connection
    ///
    /// With `unique` set, a name held by another connection is rejected.
    /// Otherwise duplicates are allowed and resolution favors the earliest
    /// registration.
    pub async fn register(
        &self,
        id: ConnectionId,
        name: &str,
        unique: bool,
    ) -> Result<RegistryChange, RegistryError> {
        let mut state = self.state.write().await;

        if unique {
            if let Some(holder) = state.find(name) {
                if holder.id != id {
                    return Err(RegistryError::NameTaken(name.to_string()));
                }
            }
        }

        let entry = state
            .live
            .get_mut(&id)
            .ok_or(RegistryError::UnknownConnection(id))?;
        entry.name = Some(name.to_string());

        if !state.registered.contains(&id) {
            state.registered.push(id);
        }

        let (names, delivery) = state.announce_names(&self.metrics);
        Ok(RegistryChange {
            name: name.to_string(),
            names,
            delivery,
            pruned_groups: Vec::new(),
        })
    }

    /// Remove a connection's registration, keeping it in the live set
    pub async fn unregister(&self, id: ConnectionId) -> Option<RegistryChange> {
        let mut state = self.state.write().await;
        state.release(id, false, &self.metrics).1
    }

    /// First registered connection with this name
    pub async fn resolve(&self, name: &str) -> Option<Recipient> {
        let state = self.state.read().await;
        let entry = state.find(name)?;
        state.recipient(entry.id)
    }

    /// Registered names in registration order
    pub async fn snapshot_names(&self) -> Vec<String> {
        self.state.read().await.names()
    }

    pub async fn registered_count(&self) -> usize {
        self.state.read().await.registered.len()
    }

    // --- group directory ---

    /// Create a group with fixed membership
    ///
    /// Membership is the creator followed by every member name that resolves,
    /// duplicates collapsed. Unresolved names are reported, not fatal.
    pub async fn create_group(
        &self,
        name: &str,
        creator: ConnectionId,
        member_names: &[String],
    ) -> Result<GroupCreated, RegistryError> {
        let mut state = self.state.write().await;

        if state.groups.contains_key(name) {
            return Err(RegistryError::GroupAlreadyExists(name.to_string()));
        }

        let creator_entry = state
            .recipient(creator)
            .ok_or(RegistryError::CreatorNotRegistered(creator))?;

        let mut members = vec![creator_entry];
        let mut unresolved = Vec::new();

        for member_name in member_names {
            match state.find(member_name).map(|entry| entry.id) {
                Some(id) if members.iter().any(|m| m.id == id) => {
                    tracing::debug!(group = %name, member = %member_name, "Duplicate member ignored");
                }
                Some(id) => {
                    if let Some(recipient) = state.recipient(id) {
                        members.push(recipient);
                    }
                }
                None => unresolved.push(member_name.clone()),
            }
        }

        let group = Group::new(
            name.to_string(),
            creator,
            members.iter().map(|m| m.id).collect(),
        );
        state.groups.insert(name.to_string(), group.clone());

        Ok(GroupCreated {
            group,
            members,
            unresolved,
        })
    }

    /// Look up a group by name
    pub async fn lookup_group(&self, name: &str) -> Option<Group> {
        self.state.read().await.groups.get(name).cloned()
    }

    /// Member IDs of a group (empty if the group is unknown)
    pub async fn group_members(&self, name: &str) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .groups
            .get(name)
            .map(|group| group.members.clone())
            .unwrap_or_default()
    }

    /// Live, registered members of a group; None if the group is unknown
    pub async fn group_recipients(&self, name: &str) -> Option<Vec<Recipient>> {
        let state = self.state.read().await;
        let group = state.groups.get(name)?;
        Some(
            group
                .members
                .iter()
                .filter_map(|id| state.recipient(*id))
                .collect(),
        )
    }

    /// All group names, sorted
    pub async fn group_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.groups.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn group_count(&self) -> usize {
        self.state.read().await.groups.len()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
