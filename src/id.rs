//! Connection identity.
//!
//! A [`ConnectionId`] is assigned by the Transport Adapter on accept and is
//! globally unique for the lifetime of the connection. It is opaque to
//! every other component: the Matcher, Queue Set, and Session Supervisor
//! never parse it, only compare and hash it.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Ulid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
