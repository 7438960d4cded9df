//! In-memory stand-ins for kernel maps, used by unit tests of the
//! components built on [`crate::maps`].

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::maps::{KernelMap, MapError, MapRegistry};

/// A [`KernelMap`] backed by a `HashMap`, counting every access.
#[derive(Default)]
pub struct MemoryMap {
    entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    lookups: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    fail_puts: bool,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map rejecting every write as if it were full.
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Default::default()
        }
    }

    /// Insert directly, without counting it as a put.
    pub fn seed(&self, key: &[u8], value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
    }

    /// Read directly, without counting it as a lookup.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn remove(&self, key: &[u8]) {
        self.entries.lock().unwrap().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl KernelMap for MemoryMap {
    fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MapError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), MapError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(MapError::Full {
                name: "memory map".to_string(),
            });
        }
        self.seed(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool, MapError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

/// A [`MapRegistry`] holding [`MemoryMap`]s by name.
#[derive(Default)]
pub struct MemoryRegistry {
    maps: HashMap<String, Arc<MemoryMap>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty map and return a handle to inspect it.
    pub fn add(&mut self, name: &str) -> Arc<MemoryMap> {
        self.add_map(name, MemoryMap::new())
    }

    pub fn add_map(&mut self, name: &str, map: MemoryMap) -> Arc<MemoryMap> {
        let map = Arc::new(map);
        self.maps.insert(name.to_string(), map.clone());
        map
    }
}

impl MapRegistry for MemoryRegistry {
    fn get_map(&self, name: &str) -> Result<Option<Arc<dyn KernelMap>>, MapError> {
        Ok(self
            .maps
            .get(name)
            .map(|map| map.clone() as Arc<dyn KernelMap>))
    }
}
