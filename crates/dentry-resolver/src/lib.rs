//! # Dentry resolution
//!
//! Kernel events only carry the `(mount_id, inode, path_id)` of the files
//! they refer to. The eBPF programs store every dentry they see in the
//! `pathnames` map, keyed by those identifiers and pointing to their parent
//! dentry. [`DentryResolver`] rebuilds absolute paths by walking that chain
//! from the leaf up to the root.
//!
//! Walked records are kept in a bounded LRU cache keyed by
//! `(mount_id, inode)`. Entries are never invalidated proactively: see
//! [`config::PathIdPolicy`] for how a changed path id is handled.

pub mod config;
pub mod key;
mod resolver;

pub use config::Config;
pub use key::{KeyError, PathKey, PathValue};
pub use resolver::{DENTRY_PATH_KEY_NOT_FOUND, DentryResolver, MAX_PATH_DEPTH, ResolverError};
