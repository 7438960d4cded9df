use std::num::NonZeroUsize;

use bpf_common::config::{ConfigError, ModuleConfig};
use strum::{Display, EnumString};

pub const PATHNAMES_MAP: &str = "pathnames";
pub const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(size) => size,
    None => unreachable!(),
};

/// What to do when a cached record was fetched with a different path id
/// than the one being resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PathIdPolicy {
    /// Serve the cached record. Staleness is bounded by LRU turnover.
    #[default]
    Ignore,
    /// Fetch the record again and replace the cached one.
    Invalidate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub pathnames_map: String,
    pub cache_size: NonZeroUsize,
    pub pathid_policy: PathIdPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pathnames_map: PATHNAMES_MAP.to_string(),
            cache_size: DEFAULT_CACHE_SIZE,
            pathid_policy: PathIdPolicy::default(),
        }
    }
}

impl TryFrom<&ModuleConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        Ok(Config {
            pathnames_map: config.with_default("pathnames_map", PATHNAMES_MAP.to_string())?,
            cache_size: config.with_default("cache_size", DEFAULT_CACHE_SIZE)?,
            pathid_policy: config.with_default("pathid_policy", PathIdPolicy::default())?,
        })
    }
}
