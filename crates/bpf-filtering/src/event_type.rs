use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Kind of kernel event a discarder applies to. The discriminant is the
/// value the eBPF programs use as the first 8 bytes of discarder keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
#[repr(u64)]
pub enum EventType {
    Open = 1,
    Mkdir,
    Link,
    Rename,
    Unlink,
    Rmdir,
    Chmod,
    Chown,
    Utimes,
    Setxattr,
    Removexattr,
    Mount,
    Umount,
    Exec,
    Exit,
}

impl EventType {
    /// Exclusive upper bound of the raw values.
    pub const MAX: u64 = EventType::Exit as u64 + 1;

    pub fn as_raw(self) -> u64 {
        self as u64
    }

    pub fn iter() -> impl Iterator<Item = EventType> {
        <Self as IntoEnumIterator>::iter()
    }
}
