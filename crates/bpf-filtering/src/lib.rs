//! # Kernel filters
//!
//! Most kernel events are of no interest to the active rules. Sending them
//! to userspace only to drop them there is expensive, so the eBPF programs
//! consult a few maps before emitting anything:
//!
//! - **discarders** (`inode_discarders`): a key `(event type, mount id, inode)`
//!   means events of that type on that inode must be dropped in kernel.
//! - **basename approvers**: a zero-padded file name means events on files
//!   with that name must always be forwarded.
//! - **flags approvers**: a single `u32` mask; events whose flags intersect
//!   it must always be forwarded.
//!
//! Approvers take precedence over discarders on the kernel side.
//!
//! # Parent discarders
//!
//! When no rule could ever match a file in a directory, the discarder is
//! installed on the directory instead of the file. That decision belongs to
//! the rule set (see [`ParentDiscarderCheck`]): [`Filters`] only resolves
//! the parent through the [`dentry_resolver::DentryResolver`] and writes the
//! key. Nothing is ever installed if resolution or rule evaluation fails.

pub mod config;
pub mod event_type;
mod filters;
pub mod maps;
pub mod rules;

pub use config::Config;
pub use event_type::EventType;
pub use filters::{FilterError, Filters};
pub use rules::ParentDiscarderCheck;
