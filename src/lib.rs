//! Vigil turns the raw identifiers carried by kernel security events into
//! something meaningful, and keeps uninteresting events from leaving the
//! kernel at all.
//!
//! The work is split into three components, each in its own crate:
//!
//! - [dentry resolution](dentry_resolver): `(mount_id, inode, path_id)`
//!   to absolute path, walking the records the eBPF programs store in the
//!   `pathnames` map;
//! - [kernel filters](bpf_filtering): discarders and approvers written to
//!   the maps the eBPF programs check before emitting an event;
//! - [process resolution](process_resolver): decoding of the per-process
//!   context shipped with exec events.
//!
//! [`Resolvers`] starts all of them on top of one [`MapRegistry`], with the
//! settings of a [`VigilConfig`]. Loading and attaching the eBPF programs,
//! and dispatching their events, is left to the caller.

use std::sync::Arc;

use anyhow::{Context, Result};
use bpf_common::{MapRegistry, Pid, log_error};
use bpf_filtering::{EventType, Filters, ParentDiscarderCheck};
use dentry_resolver::DentryResolver;
use process_resolver::ProcessResolver;

pub mod config;

pub use config::VigilConfig;

/// Init logger. We log from info level and above.
/// If RUST_LOG is set, we assume the user wants to debug something
/// and use env_logger default behaviour.
pub fn init_logger(override_log_level: Option<log::LevelFilter>) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
    } else {
        let level_filter = override_log_level.unwrap_or(log::LevelFilter::Info);

        env_logger::builder().filter_level(level_filter).init();
    }
}

/// All the components, started and wired together.
pub struct Resolvers {
    pub dentry: Arc<DentryResolver>,
    pub filters: Filters,
    pub processes: ProcessResolver,
}

impl Resolvers {
    /// Start every component. Fails when a required kernel map is missing or
    /// the configuration is invalid: nothing can be resolved in that case.
    pub fn start(
        registry: Arc<dyn MapRegistry + Send + Sync>,
        config: &VigilConfig,
    ) -> Result<Self> {
        let dentry_config = config.dentry_resolver()?;
        let filtering_config = config.bpf_filtering()?;
        let process_config = config.process_resolver()?;

        let dentry = DentryResolver::start(registry.as_ref(), &dentry_config)
            .context("Error starting dentry resolver")?;
        let dentry = Arc::new(dentry);
        let filters = Filters::new(registry, dentry.clone(), filtering_config)
            .context("Error starting kernel filters")?;
        let processes = ProcessResolver::new(&process_config);

        log::info!(
            "Resolvers started (process entry frame: {})",
            process_config.frame
        );

        Ok(Self {
            dentry,
            filters,
            processes,
        })
    }

    /// Path of the file `pid` last executed, if the process is known.
    pub fn executable_path(&self, pid: Pid) -> Option<String> {
        self.processes
            .get(pid)
            .map(|entry| entry.executable_path(&self.dentry))
    }

    /// Install a parent directory discarder, logging failures. Filtering only
    /// reduces volume, so a failure never stops event processing.
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
    ) -> bool {
        match self.filters.discard_parent_inode(
            rule_set, event_type, field, filename, mount_id, inode, path_id,
        ) {
            Ok(discarded) => discarded,
            Err(err) => {
                log_error(&format!("Error discarding parent of {filename}"), err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use bpf_common::{parsing::StringArray, test_utils::MemoryRegistry};
    use dentry_resolver::{PathKey, PathValue};

    use super::*;

    struct AllowAll;

    impl ParentDiscarderCheck for AllowAll {
        type Error = Infallible;

        fn is_parent_path_discarder(
            &self,
            _event_type: EventType,
            _field: &str,
            _filename: &str,
        ) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        let pathnames = registry.add("pathnames");
        registry.add("inode_discarders");
        // /usr/bin/bash
        for (key, parent, name) in [
            (PathKey::new(1, 2, 0), PathKey::new(1, 0, 0), ""),
            (PathKey::new(1, 3, 0), PathKey::new(1, 2, 0), "usr"),
            (PathKey::new(1, 4, 0), PathKey::new(1, 3, 0), "bin"),
            (PathKey::new(1, 5, 0), PathKey::new(1, 4, 0), "bash"),
        ] {
            let value = PathValue::new(parent, StringArray::try_from(name).unwrap());
            pathnames.seed(&key.encode().unwrap(), &value.encode());
        }
        registry
    }

    fn exec_event(pid: u32, inode: u64) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&inode.to_ne_bytes());
        data.extend_from_slice(&1_u32.to_ne_bytes());
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&[0; 64]);
        data.extend_from_slice(&0_u64.to_ne_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&pid.to_ne_bytes());
        data.extend_from_slice(&[0; 4]);
        data
    }

    #[test]
    fn start_and_resolve() {
        let config = VigilConfig::from_ini_str("[process-resolver]\nframe=baseline\n").unwrap();
        let resolvers = Resolvers::start(Arc::new(registry()), &config).unwrap();

        resolvers.processes.handle_exec(&exec_event(300, 5)).unwrap();
        assert_eq!(
            resolvers.executable_path(Pid::from_raw(300)).as_deref(),
            Some("/usr/bin/bash")
        );
        assert_eq!(resolvers.executable_path(Pid::from_raw(301)), None);

        assert!(resolvers.discard_parent_inode(
            &AllowAll,
            EventType::Open,
            "open.filename",
            "/usr/bin/bash",
            1,
            5,
            0
        ));
        // unknown file: logged, nothing installed
        assert!(!resolvers.discard_parent_inode(
            &AllowAll,
            EventType::Open,
            "open.filename",
            "/tmp/x",
            1,
            77,
            0
        ));
    }

    #[test]
    fn missing_pathnames_map() {
        let mut registry = MemoryRegistry::new();
        registry.add("inode_discarders");
        let err = Resolvers::start(Arc::new(registry), &VigilConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("dentry resolver"));
    }

    #[test]
    fn invalid_config() {
        let config = VigilConfig::from_ini_str("[dentry-resolver]\ncache_size=0\n").unwrap();
        assert!(Resolvers::start(Arc::new(registry()), &config).is_err());
    }
}
