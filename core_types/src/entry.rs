//! Handle vocabulary: entry kinds and permission states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entry a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// Access mode asked for in a permission query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    #[default]
    Read,
    ReadWrite,
}

/// Answer to a permission query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
}

impl PermissionState {
    /// Reading is always granted; writing follows the handle's writability.
    pub fn for_mode(mode: PermissionMode, writable: bool) -> Self {
        match mode {
            PermissionMode::Read => PermissionState::Granted,
            PermissionMode::ReadWrite if writable => PermissionState::Granted,
            PermissionMode::ReadWrite => PermissionState::Denied,
        }
    }
}
