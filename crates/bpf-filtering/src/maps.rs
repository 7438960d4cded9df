//! Keys and values of the filtering maps.
//!
//! | Map | Key | Value |
//! |---|---|---|
//! | `inode_discarders` | event type (8) + path key (16) | `0u8` |
//! | basename approvers | zero-padded basename (configured size) | `0u8` |
//! | flags approvers | `0u32` | flags mask (4) |

use bpf_common::parsing::{StringArrayError, zero_padded};
use dentry_resolver::{KeyError, PathKey, key::PATH_KEY_SIZE};

use crate::event_type::EventType;

pub const DEFAULT_INODE_DISCARDERS: &str = "inode_discarders";

pub const INODE_DISCARDER_KEY_SIZE: usize = 8 + PATH_KEY_SIZE;

/// Value stored by discarders and basename approvers: the key presence
/// is the only information.
pub const ZERO_U8: [u8; 1] = [0];

/// Key of the single entry of a flags approver map.
pub const ZERO_U32: [u8; 4] = [0; 4];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeDiscarderKey {
    pub event_type: EventType,
    pub path_key: PathKey,
}

impl InodeDiscarderKey {
    /// Discarders apply to every path id of an inode, so it's left to zero.
    pub fn new(event_type: EventType, mount_id: u32, inode: u64) -> Self {
        Self {
            event_type,
            path_key: PathKey::new(mount_id, inode, 0),
        }
    }

    pub fn encode(&self) -> Result<[u8; INODE_DISCARDER_KEY_SIZE], KeyError> {
        let mut buffer = [0; INODE_DISCARDER_KEY_SIZE];
        let (event_type, path_key) = buffer.split_at_mut(8);
        event_type.copy_from_slice(&self.event_type.as_raw().to_ne_bytes());
        path_key.copy_from_slice(&self.path_key.encode()?);
        Ok(buffer)
    }
}

pub fn basename_key(basename: &str, size: usize) -> Result<Vec<u8>, StringArrayError> {
    zero_padded(basename, size)
}

/// OR all flags together.
pub fn flags_mask(flags: impl IntoIterator<Item = u32>) -> u32 {
    flags.into_iter().fold(0, |mask, flag| mask | flag)
}
