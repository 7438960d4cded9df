//! Fixed-size records embedded at the start of process cache entries.
//!
//! ```text
//! file identity     (16 bytes): inode u64 | mount_id u32 | overlay_numlower u32
//! container context (64 bytes): container id (zero terminated)
//! ```

use bpf_common::parsing::StringArray;
use bytes::Buf;
use thiserror::Error;

pub const FILE_IDENTITY_SIZE: usize = 16;
pub const CONTAINER_ID_SIZE: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not enough data: expected at least {expected} bytes, got {got}")]
    NotEnoughData { expected: usize, got: usize },
}

/// Decoding of a record from the head of a buffer shared with other records.
///
/// On success, returns the record and how many bytes it took. On failure
/// nothing is consumed.
pub trait Unmarshal: Sized {
    fn unmarshal(data: &[u8]) -> Result<(Self, usize), DecodeError>;
}

pub(crate) fn ensure_len(data: &[u8], expected: usize) -> Result<(), DecodeError> {
    if data.len() < expected {
        return Err(DecodeError::NotEnoughData {
            expected,
            got: data.len(),
        });
    }
    Ok(())
}

/// The file a process was executed from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileIdentity {
    pub inode: u64,
    pub mount_id: u32,
    pub overlay_numlower: u32,
}

impl Unmarshal for FileIdentity {
    fn unmarshal(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure_len(data, FILE_IDENTITY_SIZE)?;
        let mut cursor = data;
        let identity = Self {
            inode: cursor.get_u64_ne(),
            mount_id: cursor.get_u32_ne(),
            overlay_numlower: cursor.get_u32_ne(),
        };
        Ok((identity, FILE_IDENTITY_SIZE))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerContext {
    pub container_id: StringArray<CONTAINER_ID_SIZE>,
}

impl ContainerContext {
    /// Empty when the process doesn't run in a container.
    pub fn container_id(&self) -> String {
        self.container_id.to_string()
    }
}

impl Unmarshal for ContainerContext {
    fn unmarshal(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure_len(data, CONTAINER_ID_SIZE)?;
        let container_id = StringArray::from_bytes(&data[..CONTAINER_ID_SIZE]).map_err(|_| {
            DecodeError::NotEnoughData {
                expected: CONTAINER_ID_SIZE,
                got: data.len(),
            }
        })?;
        Ok((Self { container_id }, CONTAINER_ID_SIZE))
    }
}
