//! Cluster membership snapshot.
//!
//! The balancer names nodes; members map those names to public addresses
//! per protocol (`https`, `rtmp`, ...). The table is read on every playback
//! redirect and swapped wholesale when discovery produces a new list.
//!
//! Discovery itself runs outside this service. The binary seeds the table
//! from `PLAYGATE_MEMBERS`; an embedder that follows cluster changes shares
//! a [`MemberTable`] through [`AppState::with_membership`] and calls
//! [`MemberTable::replace`] on each new list.
//!
//! [`AppState::with_membership`]: crate::AppState::with_membership

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// One cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    /// protocol -> base address
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, protocol: impl Into<String>, address: impl Into<String>) -> Self {
        self.tags.insert(protocol.into(), address.into());
        self
    }

    pub fn address_for(&self, protocol: &str) -> Option<&str> {
        self.tags.get(protocol).map(String::as_str)
    }
}

/// Read access to the current cluster members.
pub trait ClusterMembership: Send + Sync {
    fn members(&self) -> Arc<Vec<Member>>;

    /// Public base address of `node` for `protocol`.
    ///
    /// Nodes unknown to the membership resolve to themselves when the
    /// balancer already handed out an absolute URL.
    fn resolve(&self, node: &str, protocol: &str) -> Option<String> {
        let members = self.members();
        match members.iter().find(|m| m.name == node) {
            Some(member) => member.address_for(protocol).map(str::to_string),
            None if node.starts_with("http://") || node.starts_with("https://") => {
                Some(node.to_string())
            }
            None => None,
        }
    }
}

/// In-process membership table.
#[derive(Debug, Default)]
pub struct MemberTable {
    members: RwLock<Arc<Vec<Member>>>,
}

impl MemberTable {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members: RwLock::new(Arc::new(members)),
        }
    }

    /// Swap in a new member list. Readers holding the old snapshot keep it.
    pub fn replace(&self, members: Vec<Member>) {
        let count = members.len();
        *self.members.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(members);
        tracing::info!(members = count, "cluster membership replaced");
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }
}

impl ClusterMembership for MemberTable {
    fn members(&self) -> Arc<Vec<Member>> {
        Arc::clone(&self.members.read().unwrap_or_else(PoisonError::into_inner))
    }
}
