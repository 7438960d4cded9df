//! StringArray is a zero terminated string shared with eBPF C code, stored in
//! an array of a fixed length. Kernel records use it for dentry names and tty
//! names.
//!
//! This struct:
//! - simplifies equality checks, while ignoring garbage after the terminator
//! - allows conversion from &str when the string fits with its terminator
//! - allows conversion to String using String::from_utf8_lossy
use core::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StringArrayError {
    #[error("string of {len} bytes doesn't fit in {capacity} bytes with its terminator")]
    TooLong { len: usize, capacity: usize },
    #[error("expected {expected} bytes, got {got}")]
    Size { expected: usize, got: usize },
}

#[derive(Clone, Eq)]
#[repr(C)]
pub struct StringArray<const N: usize> {
    data: [u8; N],
}

#[allow(clippy::len_without_is_empty)]
impl<const N: usize> StringArray<N> {
    /// Wrap raw bytes read from a kernel record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StringArrayError> {
        let data = bytes.try_into().map_err(|_| StringArrayError::Size {
            expected: N,
            got: bytes.len(),
        })?;
        Ok(Self { data })
    }

    // if no 0 is contained in the string, it's all garbage
    pub fn len(&self) -> Option<usize> {
        self.data.iter().position(|c| *c == 0)
    }

    pub fn first_byte(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// Bytes up to the first terminator, or the whole array when the kernel
    /// filled it completely.
    pub fn c_str(&self) -> &[u8] {
        let len = self.len().unwrap_or(N);
        &self.data[..len]
    }

    /// All bytes with leading and trailing zeros removed.
    pub fn trim_zeros(&self) -> &[u8] {
        let start = self.data.iter().position(|c| *c != 0).unwrap_or(N);
        let end = self.data.iter().rposition(|c| *c != 0).map_or(start, |i| i + 1);
        &self.data[start..end]
    }
}

impl<const N: usize> Default for StringArray<N> {
    fn default() -> Self {
        Self { data: [0; N] }
    }
}

impl<const N: usize> PartialEq for StringArray<N> {
    fn eq(&self, other: &Self) -> bool {
        match self.len() {
            Some(len) => self.data[..len + 1] == other.data[..len + 1],
            None => false,
        }
    }
}

impl<const N: usize> TryFrom<&str> for StringArray<N> {
    type Error = StringArrayError;

    fn try_from(slice: &str) -> Result<Self, Self::Error> {
        let data = zero_padded(slice, N)?;
        Self::from_bytes(&data)
    }
}

/// Copy `value` into a zero-padded buffer of `size` bytes, keeping room for
/// the terminator. Used for map keys whose size is only known at runtime.
pub fn zero_padded(value: &str, size: usize) -> Result<Vec<u8>, StringArrayError> {
    let len = value.len();
    if len >= size {
        return Err(StringArrayError::TooLong {
            len,
            capacity: size,
        });
    }
    let mut data = vec![0; size];
    data[..len].copy_from_slice(value.as_bytes());
    Ok(data)
}

impl<const N: usize> fmt::Display for StringArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.iter().position(|&r| r == 0) {
            Some(zero_pos) => write!(f, "{}", String::from_utf8_lossy(&self.data[..zero_pos])),
            None => Ok(()),
        }
    }
}

impl<const N: usize> fmt::Debug for StringArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringArray")
            .field("data", &self.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality() {
        let a: StringArray<100> = "hello".try_into().unwrap();
        let b: StringArray<100> = "hello".try_into().unwrap();
        let c: StringArray<100> = "hellow".try_into().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(c, a);
    }

    #[test]
    fn too_long() {
        assert_eq!(
            StringArray::<4>::try_from("abcd"),
            Err(StringArrayError::TooLong {
                len: 4,
                capacity: 4
            })
        );
        assert!(StringArray::<4>::try_from("abc").is_ok());
    }

    #[test]
    fn c_str_stops_at_terminator() {
        let mut raw = [0u8; 8];
        raw[..3].copy_from_slice(b"tmp");
        raw[4..6].copy_from_slice(b"xx");
        let array = StringArray::<8>::from_bytes(&raw).unwrap();
        assert_eq!(array.c_str(), b"tmp");
        assert_eq!(array.to_string(), "tmp");
    }

    #[test]
    fn unterminated_c_str_uses_whole_array() {
        let array = StringArray::<4>::from_bytes(b"abcd").unwrap();
        assert_eq!(array.c_str(), b"abcd");
    }

    #[test]
    fn trim_zeros_both_ends() {
        let mut raw = [0u8; 8];
        raw[2..7].copy_from_slice(b"pts/0");
        let array = StringArray::<8>::from_bytes(&raw).unwrap();
        assert_eq!(array.trim_zeros(), b"pts/0");
        assert_eq!(StringArray::<8>::default().trim_zeros(), b"");
    }

    #[test]
    fn wrong_size() {
        assert_eq!(
            StringArray::<8>::from_bytes(b"abc"),
            Err(StringArrayError::Size {
                expected: 8,
                got: 3
            })
        );
    }

    #[test]
    fn zero_padded_key() {
        assert_eq!(zero_padded("ls", 4).unwrap(), vec![b'l', b's', 0, 0]);
    }
}
