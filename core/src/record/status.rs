use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an observation record.
///
/// `Draft -> ToSync -> SyncInProgress -> {SyncSuccessful | SyncError}`, the
/// last two falling back to `ToSync` on retry. Ordinals are persisted and must
/// stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Status {
    #[default]
    Draft = 0,
    ToSync = 1,
    SyncInProgress = 2,
    SyncSuccessful = 3,
    SyncError = 4,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Draft,
        Status::ToSync,
        Status::SyncInProgress,
        Status::SyncSuccessful,
        Status::SyncError,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Status::ALL.get(usize::from(ordinal)).copied()
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::ToSync => "to_sync",
            Status::SyncInProgress => "sync_in_progress",
            Status::SyncSuccessful => "sync_successful",
            Status::SyncError => "sync_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
