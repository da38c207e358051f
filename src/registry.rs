//! Connection Registry (C1).
//!
//! Maps `connection_id -> User`. Owned by the engine's single coarse lock
//! (see `engine`) rather than a concurrent map, so that registry mutations
//! are serializable with Queue Set mutations in the same atomic region,
//! the atomicity `match` and `teardown` both need.

use std::collections::HashMap;

use crate::id::ConnectionId;
use crate::models::User;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: HashMap<ConnectionId, User>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, user: User) {
        self.users.insert(user.connection_id, user);
    }

    pub fn lookup(&self, connection_id: ConnectionId) -> Option<&User> {
        self.users.get(&connection_id)
    }

    pub fn lookup_mut(&mut self, connection_id: ConnectionId) -> Option<&mut User> {
        self.users.get_mut(&connection_id)
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<User> {
        self.users.remove(&connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.users.contains_key(&connection_id)
    }

    /// Diagnostics only, never consulted by matching logic.
    pub fn snapshot(&self) -> Vec<&User> {
        self.users.values().collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
