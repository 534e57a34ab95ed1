use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// Liveness of a device as seen by the kernel at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Offline,
    /// Never heard from since the kernel started.
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Offline => "offline",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides the status of a device from its last contact.
///
/// A device is active while `now - last_contact <= threshold`. A contact
/// stamped later than `now` (device clock ahead of ours) counts as active.
pub fn evaluate(last_contact: Option<OffsetDateTime>, now: OffsetDateTime, threshold: Duration) -> Status {
    let Some(last) = last_contact else {
        return Status::Unknown;
    };

    let age = now - last;
    if age.is_negative() || age.unsigned_abs() <= threshold {
        Status::Active
    } else {
        Status::Offline
    }
}
