use bpf_common::config::{ConfigError, ModuleConfig};

use crate::maps::DEFAULT_INODE_DISCARDERS;

pub const DEFAULT_BASENAME_FILTER_SIZE: usize = 32;
const BASENAME_FILTER_SIZE_RANGE: std::ops::RangeInclusive<usize> = 2..=256;

/// [`Config`] names the filtering maps and sizes their keys. It must match
/// the map definitions of the loaded eBPF programs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Map name of the inode discarders map
    pub inode_discarders_map: String,
    /// Size in bytes of basename approver keys, terminator included
    pub basename_filter_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inode_discarders_map: DEFAULT_INODE_DISCARDERS.to_string(),
            basename_filter_size: DEFAULT_BASENAME_FILTER_SIZE,
        }
    }
}

/// Extract Config from configuration file
impl TryFrom<&ModuleConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        let basename_filter_size =
            config.with_default("basename_filter_size", DEFAULT_BASENAME_FILTER_SIZE)?;
        if !BASENAME_FILTER_SIZE_RANGE.contains(&basename_filter_size) {
            return Err(ConfigError::InvalidValue {
                field: "basename_filter_size".to_string(),
                value: basename_filter_size.to_string(),
                err: format!(
                    "must be between {} and {}",
                    BASENAME_FILTER_SIZE_RANGE.start(),
                    BASENAME_FILTER_SIZE_RANGE.end()
                ),
            });
        }
        Ok(Config {
            inode_discarders_map: config
                .with_default("inode_discarders_map", DEFAULT_INODE_DISCARDERS.to_string())?,
            basename_filter_size,
        })
    }
}
