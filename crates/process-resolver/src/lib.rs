//! # Process resolution
//!
//! Exec events carry the process cache entry the kernel keeps for every
//! process: the executed file, the container it runs in, its start time and
//! a random cookie, optionally followed by the controlling terminal name.
//! [`ProcessCacheEntry`] decodes that record and [`ProcessResolver`] keeps
//! the decoded entries by pid, following exec, fork and exit.

pub mod config;
pub mod decode;
pub mod entry;
pub mod events;
mod resolver;

pub use config::Config;
pub use decode::{ContainerContext, DecodeError, FileIdentity, Unmarshal};
pub use entry::{Frame, ProcessCacheEntry, TtyName};
pub use events::{ExecEvent, ExitEvent};
pub use resolver::ProcessResolver;
