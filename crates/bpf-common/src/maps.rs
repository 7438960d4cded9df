//! Access to kernel-resident eBPF maps through byte keys and values.
//!
//! Components never talk to [`aya`] directly: they receive a [`MapRegistry`]
//! and ask it for a [`KernelMap`] by name. This keeps the binary layout of
//! every key and value in the component owning it, and lets tests swap the
//! kernel for an in-memory map.
//!
//! The maps are shared with the eBPF programs, which keep mutating them
//! concurrently. Nothing here assumes exclusive access: a lookup can miss
//! a record which was present a moment before.

use std::{
    collections::HashMap as StdHashMap,
    sync::{Arc, Mutex},
};

use aya::{
    Ebpf,
    maps::{HashMap, MapData},
};
use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error(transparent)]
    Bpf(#[from] aya::maps::MapError),
    #[error("map {name} not found in eBPF object")]
    NotFound { name: String },
    #[error("map {name} already registered")]
    AlreadyRegistered { name: String },
    #[error("invalid key size: expected {expected} bytes, got {got}")]
    KeySize { expected: usize, got: usize },
    #[error("invalid value size: expected {expected} bytes, got {got}")]
    ValueSize { expected: usize, got: usize },
    #[error("map {name} is full")]
    Full { name: String },
    #[error("map {name} lock poisoned")]
    Poisoned { name: String },
}

/// A kernel-resident key-value map addressed with raw bytes.
///
/// A missing key is reported as `Ok(None)` (or `Ok(false)` on delete), never
/// as an error: records legitimately disappear while user-space reads them.
pub trait KernelMap: Send + Sync {
    fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MapError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), MapError>;

    /// Remove `key`, returning whether it was present.
    fn delete(&self, key: &[u8]) -> Result<bool, MapError>;
}

/// Lookup of kernel maps by name.
pub trait MapRegistry {
    fn get_map(&self, name: &str) -> Result<Option<Arc<dyn KernelMap>>, MapError>;
}

impl<R: MapRegistry + ?Sized> MapRegistry for Arc<R> {
    fn get_map(&self, name: &str) -> Result<Option<Arc<dyn KernelMap>>, MapError> {
        (**self).get_map(name)
    }
}

/// A `BPF_MAP_TYPE_HASH` (or LRU hash) with a `K` bytes key and a `V` bytes value.
///
/// aya requires `&mut` access for updates, so the map sits behind a mutex.
/// The kernel serializes single-key updates on its side anyway.
pub struct BpfHashMap<const K: usize, const V: usize> {
    name: String,
    map: Mutex<HashMap<MapData, [u8; K], [u8; V]>>,
}

impl<const K: usize, const V: usize> BpfHashMap<K, V> {
    /// Take the map `name` out of the loaded eBPF object.
    pub fn load(bpf: &mut Ebpf, name: &str) -> Result<Self, MapError> {
        let map = bpf.take_map(name).ok_or_else(|| MapError::NotFound {
            name: name.to_string(),
        })?;
        let map = HashMap::try_from(map)?;
        Ok(Self {
            name: name.to_string(),
            map: Mutex::new(map),
        })
    }

    fn key(key: &[u8]) -> Result<[u8; K], MapError> {
        key.try_into().map_err(|_| MapError::KeySize {
            expected: K,
            got: key.len(),
        })
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut HashMap<MapData, [u8; K], [u8; V]>) -> Result<T, MapError>,
    ) -> Result<T, MapError> {
        let mut map = self.map.lock().map_err(|_| MapError::Poisoned {
            name: self.name.clone(),
        })?;
        f(&mut map)
    }
}

impl<const K: usize, const V: usize> KernelMap for BpfHashMap<K, V> {
    fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MapError> {
        let key = Self::key(key)?;
        self.with_map(|map| match map.get(&key, 0) {
            Ok(value) => Ok(Some(value.to_vec())),
            Err(aya::maps::MapError::KeyNotFound) => Ok(None),
            Err(err) => Err(err.into()),
        })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), MapError> {
        let key = Self::key(key)?;
        let value: [u8; V] = value.try_into().map_err(|_| MapError::ValueSize {
            expected: V,
            got: value.len(),
        })?;
        // bpf_map_update_elem reports a full map as E2BIG
        self.with_map(|map| match map.insert(key, value, 0) {
            Ok(()) => Ok(()),
            Err(aya::maps::MapError::SyscallError(err))
                if err.io_error.raw_os_error() == Some(Errno::E2BIG as i32) =>
            {
                Err(MapError::Full {
                    name: self.name.clone(),
                })
            }
            Err(err) => Err(err.into()),
        })
    }

    fn delete(&self, key: &[u8]) -> Result<bool, MapError> {
        let key = Self::key(key)?;
        // bpf_map_delete_elem reports a missing key as a plain ENOENT
        self.with_map(|map| match map.remove(&key) {
            Ok(()) => Ok(true),
            Err(aya::maps::MapError::KeyNotFound) => Ok(false),
            Err(aya::maps::MapError::SyscallError(err))
                if err.io_error.raw_os_error() == Some(Errno::ENOENT as i32) =>
            {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        })
    }
}

/// [`MapRegistry`] over maps taken out of a loaded eBPF object.
///
/// Every map must be registered with the key and value sizes of its
/// kernel definition before components can find it.
#[derive(Default)]
pub struct BpfMapRegistry {
    maps: StdHashMap<String, Arc<dyn KernelMap>>,
}

impl BpfMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<const K: usize, const V: usize>(
        &mut self,
        bpf: &mut Ebpf,
        name: &str,
    ) -> Result<(), MapError> {
        if self.maps.contains_key(name) {
            return Err(MapError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        let map = BpfHashMap::<K, V>::load(bpf, name)?;
        log::debug!("registered map {name} (key {K} bytes, value {V} bytes)");
        self.maps.insert(name.to_string(), Arc::new(map));
        Ok(())
    }
}

impl MapRegistry for BpfMapRegistry {
    fn get_map(&self, name: &str) -> Result<Option<Arc<dyn KernelMap>>, MapError> {
        Ok(self.maps.get(name).cloned())
    }
}
