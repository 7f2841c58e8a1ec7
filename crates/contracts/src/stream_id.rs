//! Stream identifiers.
//!
//! Ids are created once from the blueprint and then cloned into every
//! packet, gate slot and snapshot, so they share one `Arc<str>`.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of one declared input stream, e.g. `laser_cloud_less_flat`.
///
/// Hashes like `str`, so gate indices keyed by `StreamId` can be queried
/// with the `&str` a producer reports.
///
/// ```
/// use contracts::StreamId;
///
/// let id: StreamId = "laser_cloud_flat".into();
/// assert_eq!(id, "laser_cloud_flat");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StreamId(Arc<str>);

impl StreamId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for StreamId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.0.to_string()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for StreamId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for StreamId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl PartialEq<String> for StreamId {
    fn eq(&self, other: &String) -> bool {
        &*self.0 == other.as_str()
    }
}
