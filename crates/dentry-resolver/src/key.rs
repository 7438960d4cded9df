//! Binary layout of the `pathnames` map records.
//!
//! ```text
//! key   (16 bytes): inode u64 | mount_id u32 | path_id u32
//! value (144 bytes): parent key (16 bytes) | name (128 bytes, zero terminated)
//! ```
//!
//! All integers use the host byte order, like the eBPF programs writing them.

use std::fmt;

use bpf_common::parsing::StringArray;
use bytes::{Buf, BufMut};
use thiserror::Error;

pub const PATH_KEY_SIZE: usize = 16;
pub const NAME_SIZE: usize = 128;
pub const PATH_VALUE_SIZE: usize = PATH_KEY_SIZE + NAME_SIZE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid inode/mountID couple: {inode}/{mount_id}")]
    InvalidKey { inode: u64, mount_id: u32 },
    #[error("invalid path record size: expected {expected} bytes, got {got}")]
    ValueSize { expected: usize, got: usize },
}

/// Identifies one path-cache record held by the kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub inode: u64,
    pub mount_id: u32,
    pub path_id: u32,
}

impl PathKey {
    pub const fn new(mount_id: u32, inode: u64, path_id: u32) -> Self {
        Self {
            inode,
            mount_id,
            path_id,
        }
    }

    /// A null key means "no such record" and is never sent to the kernel.
    pub fn is_null(&self) -> bool {
        self.inode == 0 && self.mount_id == 0
    }

    pub fn encode(&self) -> Result<[u8; PATH_KEY_SIZE], KeyError> {
        let mut buffer = [0; PATH_KEY_SIZE];
        self.write(&mut &mut buffer[..])?;
        Ok(buffer)
    }

    /// Append the encoded key to `buffer`, failing on null keys.
    pub fn write(&self, buffer: &mut impl BufMut) -> Result<(), KeyError> {
        if self.is_null() {
            return Err(KeyError::InvalidKey {
                inode: self.inode,
                mount_id: self.mount_id,
            });
        }
        self.write_unchecked(buffer);
        Ok(())
    }

    fn write_unchecked(&self, buffer: &mut impl BufMut) {
        buffer.put_u64_ne(self.inode);
        buffer.put_u32_ne(self.mount_id);
        buffer.put_u32_ne(self.path_id);
    }

    pub fn decode(buffer: &[u8; PATH_KEY_SIZE]) -> Self {
        Self::read(&mut &buffer[..])
    }

    fn read(buffer: &mut impl Buf) -> Self {
        let inode = buffer.get_u64_ne();
        let mount_id = buffer.get_u32_ne();
        let path_id = buffer.get_u32_ne();
        Self {
            inode,
            mount_id,
            path_id,
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}/{:x}", self.mount_id, self.inode)
    }
}

/// One path segment fetched from the `pathnames` map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathValue {
    pub parent: PathKey,
    pub name: StringArray<NAME_SIZE>,
}

impl PathValue {
    pub fn new(parent: PathKey, name: StringArray<NAME_SIZE>) -> Self {
        Self { parent, name }
    }

    pub fn decode(buffer: &[u8]) -> Result<Self, KeyError> {
        if buffer.len() != PATH_VALUE_SIZE {
            return Err(KeyError::ValueSize {
                expected: PATH_VALUE_SIZE,
                got: buffer.len(),
            });
        }
        let (parent, name) = buffer.split_at(PATH_KEY_SIZE);
        let parent = PathKey::read(&mut &parent[..]);
        let name = StringArray::from_bytes(name).map_err(|_| KeyError::ValueSize {
            expected: PATH_VALUE_SIZE,
            got: buffer.len(),
        })?;
        Ok(Self { parent, name })
    }

    /// Values are never used as lookup keys, so a null parent is valid here.
    pub fn encode(&self) -> [u8; PATH_VALUE_SIZE] {
        let mut buffer = [0; PATH_VALUE_SIZE];
        let mut cursor = &mut buffer[..];
        self.parent.write_unchecked(&mut cursor);
        cursor.put_slice(self.name.as_bytes());
        buffer
    }

    /// The root dentry carries an empty name or `/`.
    pub fn has_root_name(&self) -> bool {
        matches!(self.name.first_byte(), b'\0' | b'/')
    }

    pub fn is_root(&self) -> bool {
        self.has_root_name() || self.parent.inode == 0
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name.c_str()).into_owned()
    }
}
