use std::sync::Arc;

use bpf_common::maps::{KernelMap, MapError, MapRegistry};
use dentry_resolver::{DentryResolver, KeyError, ResolverError};
use thiserror::Error;

use crate::{
    config::Config,
    event_type::EventType,
    maps::{InodeDiscarderKey, ZERO_U8, ZERO_U32, basename_key, flags_mask},
    rules::ParentDiscarderCheck,
};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("map {0} not found")]
    MapNotFound(String),
    #[error("opening map {name}")]
    Registry {
        name: String,
        #[source]
        source: MapError,
    },
    #[error("writing to map {name}")]
    Map {
        name: String,
        #[source]
        source: MapError,
    },
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("resolving parent directory")]
    Resolver(#[from] ResolverError),
    #[error("evaluating rules on {field} for {event_type} events")]
    RuleEvaluation {
        event_type: EventType,
        field: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("basename {basename:?} is longer than {max} bytes")]
    BasenameTooLong { basename: String, max: usize },
    #[error("empty basename")]
    EmptyBasename,
}

/// Installs discarders and approvers in the kernel filtering maps.
///
/// Every operation is a single-key update, so it's safe to call from
/// several workers at once: installing the same filter twice just
/// overwrites it with the same value.
pub struct Filters {
    registry: Arc<dyn MapRegistry + Send + Sync>,
    inode_discarders: Arc<dyn KernelMap>,
    dentry_resolver: Arc<DentryResolver>,
    config: Config,
}

impl Filters {
    pub fn new(
        registry: Arc<dyn MapRegistry + Send + Sync>,
        dentry_resolver: Arc<DentryResolver>,
        config: Config,
    ) -> Result<Self, FilterError> {
        let inode_discarders = open_map(registry.as_ref(), &config.inode_discarders_map)?;
        Ok(Self {
            registry,
            inode_discarders,
            dentry_resolver,
            config,
        })
    }

    fn map(&self, name: &str) -> Result<Arc<dyn KernelMap>, FilterError> {
        open_map(self.registry.as_ref(), name)
    }

    /// Stop the kernel from sending `event_type` events for this inode.
    pub fn discard_inode(
        &self,
        event_type: EventType,
        mount_id: u32,
        inode: u64,
    ) -> Result<bool, FilterError> {
        let key = InodeDiscarderKey::new(event_type, mount_id, inode).encode()?;
        self.inode_discarders
            .put(&key, &ZERO_U8)
            .map_err(|source| FilterError::Map {
                name: self.config.inode_discarders_map.clone(),
                source,
            })?;
        log::debug!("discarding {event_type} events for {mount_id:x}/{inode:x}");
        Ok(true)
    }

    /// Stop the kernel from sending `event_type` events for the whole parent
    /// directory of this file, when the rule set allows it.
    ///
    /// Returns `Ok(false)` without touching any map when `rule_set` doesn't
    /// approve. An error from `rule_set` never leads to an installation.
    #[allow(clippy::too_many_arguments)]
    pub fn discard_parent_inode<R: ParentDiscarderCheck>(
        &self,
        rule_set: &R,
        event_type: EventType,
        field: &str,
        filename: &str,
        mount_id: u32,
        inode: u64,
        path_id: u32,
    ) -> Result<bool, FilterError> {
        let is_discarder = rule_set
            .is_parent_path_discarder(event_type, field, filename)
            .map_err(|err| FilterError::RuleEvaluation {
                event_type,
                field: field.to_string(),
                source: Box::new(err),
            })?;
        if !is_discarder {
            return Ok(false);
        }

        let (parent_mount_id, parent_inode) =
            self.dentry_resolver.get_parent(mount_id, inode, path_id)?;
        if parent_inode == 0 {
            log::debug!("{filename} has no parent directory, not discarding");
            return Ok(false);
        }

        self.discard_inode(event_type, parent_mount_id, parent_inode)
    }

    /// Remove the discarders of every event type for this inode, returning
    /// how many were installed. Needed when an inode number gets reused.
    pub fn remove_inode_discarders(&self, mount_id: u32, inode: u64) -> Result<usize, FilterError> {
        let mut removed = 0;
        for event_type in EventType::iter() {
            let key = InodeDiscarderKey::new(event_type, mount_id, inode).encode()?;
            let deleted = self
                .inode_discarders
                .delete(&key)
                .map_err(|source| FilterError::Map {
                    name: self.config.inode_discarders_map.clone(),
                    source,
                })?;
            if deleted {
                removed += 1;
            }
        }
        if removed > 0 {
            log::debug!("removed {removed} discarders for {mount_id:x}/{inode:x}");
        }
        Ok(removed)
    }

    /// Let the kernel forward events for files named `basename`.
    pub fn approve_basename(&self, table_name: &str, basename: &str) -> Result<(), FilterError> {
        if basename.is_empty() {
            return Err(FilterError::EmptyBasename);
        }
        let size = self.config.basename_filter_size;
        let key = basename_key(basename, size).map_err(|_| FilterError::BasenameTooLong {
            basename: basename.to_string(),
            max: size - 1,
        })?;
        let table = self.map(table_name)?;
        table
            .put(&key, &ZERO_U8)
            .map_err(|source| FilterError::Map {
                name: table_name.to_string(),
                source,
            })?;
        log::debug!("approved basename {basename} in {table_name}");
        Ok(())
    }

    /// Approve every basename, stopping at the first failure.
    pub fn approve_basenames<I, S>(&self, table_name: &str, basenames: I) -> Result<(), FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for basename in basenames {
            self.approve_basename(table_name, basename.as_ref())?;
        }
        Ok(())
    }

    /// Store the union of `flags` as the flags approver of `table_name`.
    ///
    /// An empty mask isn't written: it would block every event.
    pub fn set_flags_filter(
        &self,
        table_name: &str,
        flags: impl IntoIterator<Item = u32>,
    ) -> Result<(), FilterError> {
        let mask = flags_mask(flags);
        if mask == 0 {
            return Ok(());
        }
        let table = self.map(table_name)?;
        table
            .put(&ZERO_U32, &mask.to_ne_bytes())
            .map_err(|source| FilterError::Map {
                name: table_name.to_string(),
                source,
            })?;
        log::debug!("approved flags {mask:#x} in {table_name}");
        Ok(())
    }

    pub fn approve_flags(
        &self,
        table_name: &str,
        flags: impl IntoIterator<Item = u32>,
    ) -> Result<(), FilterError> {
        self.set_flags_filter(table_name, flags)
    }
}

fn open_map(registry: &dyn MapRegistry, name: &str) -> Result<Arc<dyn KernelMap>, FilterError> {
    registry
        .get_map(name)
        .map_err(|source| FilterError::Registry {
            name: name.to_string(),
            source,
        })?
        .ok_or_else(|| FilterError::MapNotFound(name.to_string()))
}
