use std::sync::Arc;

use bpf_common::{Pid, cache::BoundedCache};

use crate::{
    config::Config,
    decode::{DecodeError, Unmarshal},
    entry::{Frame, ProcessCacheEntry},
    events::{ExecEvent, ExitEvent},
};

/// Keeps the cache entry of every known process, mirroring what the kernel
/// holds in its `proc_cache` and `pid_cookie` maps.
pub struct ProcessResolver {
    frame: Frame,
    entries: BoundedCache<Pid, Arc<ProcessCacheEntry>>,
}

impl ProcessResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            frame: config.frame,
            entries: BoundedCache::new(config.cache_size),
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Decode an exec event and remember its entry, replacing whatever the
    /// process executed before. Returns the number of bytes consumed.
    pub fn handle_exec(&self, data: &[u8]) -> Result<usize, DecodeError> {
        let (event, read) = ExecEvent::unmarshal(self.frame, data)?;
        log::trace!(
            "exec of {} (cookie {:#x}, tty {:?})",
            event.pid,
            event.entry.cookie,
            event.entry.tty()
        );
        self.entries.insert(event.pid, Arc::new(event.entry));
        Ok(read)
    }

    /// Decode an exit event and forget the process.
    pub fn handle_exit(&self, data: &[u8]) -> Result<usize, DecodeError> {
        let (event, read) = ExitEvent::unmarshal(data)?;
        if self.entries.remove(&event.pid).is_none() {
            log::trace!("exit of unknown process {}", event.pid);
        }
        Ok(read)
    }

    /// The child shares the parent's entry until it executes something else.
    /// Returns false when the parent is unknown.
    pub fn handle_fork(&self, parent: Pid, child: Pid) -> bool {
        match self.entries.get(&parent) {
            Some(entry) => {
                self.entries.insert(child, entry);
                true
            }
            None => {
                log::trace!("fork of unknown process {parent} into {child}");
                false
            }
        }
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<ProcessCacheEntry>> {
        self.entries.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
