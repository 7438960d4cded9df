use std::num::NonZeroUsize;

use bpf_common::config::{ConfigError, ModuleConfig};

use crate::entry::Frame;

pub const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Layout of the entries emitted by the loaded programs
    pub frame: Frame,
    /// Maximum number of processes kept in memory
    pub cache_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame: Frame::default(),
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl TryFrom<&ModuleConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        Ok(Config {
            frame: config.with_default("frame", Frame::default())?,
            cache_size: config.with_default("cache_size", DEFAULT_CACHE_SIZE)?,
        })
    }
}
