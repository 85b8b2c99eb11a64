//! Connection identifiers.
//!
//! Session ids are UUID v7 (time-ordered), so log lines sorted by session
//! also come out in connection order.

use serde::Serialize;
use uuid::Uuid;

/// Identifier for one accepted ingest or viewer connection.
///
/// Only ever appears in logs; clients never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate the id for a freshly accepted connection.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying [`Uuid`].
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
