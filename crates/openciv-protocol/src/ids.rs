use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a client's persistent connection.
///
/// The server never interprets the value; it is whatever id the transport
/// assigned when the connection was accepted (the renet client id in
/// production).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientHandle(pub u64);

impl ClientHandle {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

impl From<u64> for ClientHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
