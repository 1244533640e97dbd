use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// The transaction identifier shared with the payment gateway. It correlates a
/// pending vote with the gateway's later callback, so it must be unique across
/// all votes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Generate a new identifier of the form `<prefix>_<nanoseconds since epoch>`.
    ///
    /// The timestamp part is strictly increasing within this process, even if
    /// the clock stalls or steps backwards.
    pub fn generate(prefix: &str) -> Self {
        static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

        // Out of range only after the year 2262.
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let previous = LAST_STAMP
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last); // The closure never declines.
        let stamp = now.max(previous + 1);
        Self(format!("{prefix}_{stamp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ExternalId> for Bson {
    fn from(id: &ExternalId) -> Self {
        Bson::String(id.0.clone())
    }
}
