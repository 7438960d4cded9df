use std::{sync::OnceLock, time::Duration};

use bpf_common::parsing::StringArray;
use bytes::Buf;
use dentry_resolver::DentryResolver;
use strum::{Display, EnumString};

use crate::decode::{
    CONTAINER_ID_SIZE, ContainerContext, DecodeError, FILE_IDENTITY_SIZE, FileIdentity, Unmarshal,
    ensure_len,
};

pub const TTY_NAME_SIZE: usize = 64;

/// timestamp u64 | cookie u32 | padding u32
const TIMESTAMP_COOKIE_SIZE: usize = 16;

/// Layout of the process cache entries emitted by the loaded eBPF programs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Frame {
    /// File identity, container context, timestamp and cookie.
    Baseline,
    /// Baseline followed by the 64 bytes tty name.
    #[default]
    #[strum(serialize = "tty")]
    WithTty,
}

impl Frame {
    /// Minimum number of bytes needed to decode one entry.
    pub const fn size(self) -> usize {
        let baseline = FILE_IDENTITY_SIZE + CONTAINER_ID_SIZE + TIMESTAMP_COOKIE_SIZE;
        match self {
            Frame::Baseline => baseline,
            Frame::WithTty => baseline + TTY_NAME_SIZE,
        }
    }
}

/// Tty name as stored by the kernel, converted to a string on first access.
#[derive(Clone, Debug)]
pub struct TtyName {
    raw: StringArray<TTY_NAME_SIZE>,
    name: OnceLock<String>,
}

impl TtyName {
    pub fn new(raw: StringArray<TTY_NAME_SIZE>) -> Self {
        Self {
            raw,
            name: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &StringArray<TTY_NAME_SIZE> {
        &self.raw
    }

    pub fn get(&self) -> &str {
        self.name
            .get_or_init(|| String::from_utf8_lossy(self.raw.trim_zeros()).into_owned())
    }

    /// Whether [`TtyName::get`] already ran the conversion.
    pub fn is_decoded(&self) -> bool {
        self.name.get().is_some()
    }
}

/// Per-process context kept by the kernel and shipped with exec events.
#[derive(Clone, Debug)]
pub struct ProcessCacheEntry {
    pub file: FileIdentity,
    pub container: ContainerContext,
    /// Nanoseconds since boot, from the monotonic clock.
    pub timestamp_raw: u64,
    pub cookie: u32,
    /// Only present in [`Frame::WithTty`] entries.
    pub tty: Option<TtyName>,
}

impl ProcessCacheEntry {
    /// Decode one entry from the head of `data`, returning it with the number
    /// of bytes it took. A short buffer fails with
    /// [`DecodeError::NotEnoughData`] and consumes nothing.
    pub fn unmarshal(frame: Frame, data: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure_len(data, frame.size())?;

        let (file, file_len) = FileIdentity::unmarshal(data)?;
        let (container, container_len) = ContainerContext::unmarshal(&data[file_len..])?;
        let mut read = file_len + container_len;

        let tail = match frame {
            Frame::Baseline => TIMESTAMP_COOKIE_SIZE,
            Frame::WithTty => TIMESTAMP_COOKIE_SIZE + TTY_NAME_SIZE,
        };
        ensure_len(data, read + tail)?;

        let mut cursor = &data[read..];
        let timestamp_raw = cursor.get_u64_ne();
        let cookie = cursor.get_u32_ne();
        // padding
        cursor.advance(4);
        read += TIMESTAMP_COOKIE_SIZE;

        let tty = match frame {
            Frame::Baseline => None,
            Frame::WithTty => {
                let raw = StringArray::from_bytes(&cursor[..TTY_NAME_SIZE]).map_err(|_| {
                    DecodeError::NotEnoughData {
                        expected: read + TTY_NAME_SIZE,
                        got: data.len(),
                    }
                })?;
                read += TTY_NAME_SIZE;
                Some(TtyName::new(raw))
            }
        };

        let entry = Self {
            file,
            container,
            timestamp_raw,
            cookie,
            tty,
        };
        Ok((entry, read))
    }

    /// Name of the controlling terminal, empty when there's none or the
    /// frame doesn't carry it.
    pub fn tty(&self) -> &str {
        self.tty.as_ref().map_or("", TtyName::get)
    }

    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_raw)
    }

    pub fn executable_path(&self, resolver: &DentryResolver) -> String {
        resolver.resolve(self.file.mount_id, self.file.inode, 0)
    }
}
