use std::sync::Arc;

use bpf_common::{
    cache::BoundedCache,
    maps::{KernelMap, MapError, MapRegistry},
};
use thiserror::Error;

use crate::{
    config::{Config, PathIdPolicy},
    key::{KeyError, PathKey, PathValue},
};

/// Path returned in place of a full path when the chain is broken.
pub const DENTRY_PATH_KEY_NOT_FOUND: &str = "error: dentry path key not found";

/// Upper bound on the records walked for a single path. A longer chain means the
/// kernel records loop on themselves.
pub const MAX_PATH_DEPTH: usize = 1024;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("map {0} not found")]
    MapNotFound(String),
    #[error("opening map {name}")]
    Registry {
        name: String,
        #[source]
        source: MapError,
    },
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("path key {key} not found")]
    LookupMiss {
        key: PathKey,
        /// Path to report for this miss: always the not-found sentinel.
        path: String,
    },
    #[error("looking up path key {key}")]
    Map {
        key: PathKey,
        #[source]
        source: MapError,
    },
    #[error("path chain of {key} is longer than {} records", MAX_PATH_DEPTH)]
    TooDeep { key: PathKey },
}

/// Cache key: the path id is left out on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    mount_id: u32,
    inode: u64,
}

impl From<&PathKey> for CacheKey {
    fn from(key: &PathKey) -> Self {
        Self {
            mount_id: key.mount_id,
            inode: key.inode,
        }
    }
}

#[derive(Clone, Debug)]
struct CachedRecord {
    /// Path id of the key this record was fetched with.
    path_id: u32,
    value: PathValue,
}

/// Resolves `(mount_id, inode, path_id)` triples into absolute paths by
/// walking the parent chain stored in the kernel `pathnames` map.
///
/// Two tiers of accessors are exposed:
/// - best-effort ([`DentryResolver::resolve`], [`DentryResolver::get_last_segment`])
///   never fail, they are meant for enriching events;
/// - strict ([`DentryResolver::try_resolve`], [`DentryResolver::get_parent`])
///   always report errors, their callers decide whether a kernel filter gets
///   installed.
pub struct DentryResolver {
    pathnames: Arc<dyn KernelMap>,
    cache: BoundedCache<CacheKey, CachedRecord>,
    pathid_policy: PathIdPolicy,
}

impl DentryResolver {
    /// Bind to the pathnames map and start with an empty cache.
    pub fn start(
        registry: &(impl MapRegistry + ?Sized),
        config: &Config,
    ) -> Result<Self, ResolverError> {
        let pathnames = registry
            .get_map(&config.pathnames_map)
            .map_err(|source| ResolverError::Registry {
                name: config.pathnames_map.clone(),
                source,
            })?
            .ok_or_else(|| ResolverError::MapNotFound(config.pathnames_map.clone()))?;
        log::debug!(
            "dentry resolver started on {} (cache size {}, path id policy {})",
            config.pathnames_map,
            config.cache_size,
            config.pathid_policy
        );
        Ok(Self {
            pathnames,
            cache: BoundedCache::new(config.cache_size),
            pathid_policy: config.pathid_policy,
        })
    }

    fn lookup(&self, key: &PathKey) -> Result<PathValue, ResolverError> {
        let buffer = key.encode()?;
        let value = self
            .pathnames
            .lookup(&buffer)
            .map_err(|source| ResolverError::Map { key: *key, source })?
            .ok_or_else(|| ResolverError::LookupMiss {
                key: *key,
                path: DENTRY_PATH_KEY_NOT_FOUND.to_string(),
            })?;
        Ok(PathValue::decode(&value)?)
    }

    fn cached_lookup(&self, key: &PathKey) -> Result<PathValue, ResolverError> {
        let cache_key = CacheKey::from(key);
        if let Some(record) = self.cache.get(&cache_key) {
            match self.pathid_policy {
                PathIdPolicy::Ignore => return Ok(record.value),
                PathIdPolicy::Invalidate if record.path_id == key.path_id => {
                    return Ok(record.value);
                }
                PathIdPolicy::Invalidate => {
                    log::trace!(
                        "path id of {key} changed ({} -> {}), refetching",
                        record.path_id,
                        key.path_id
                    );
                    self.cache.remove(&cache_key);
                }
            }
        }
        let value = self.lookup(key)?;
        self.cache.insert(
            cache_key,
            CachedRecord {
                path_id: key.path_id,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    /// Name of the last path segment only, or an empty string on failure.
    pub fn get_last_segment(&self, mount_id: u32, inode: u64, path_id: u32) -> String {
        let key = PathKey::new(mount_id, inode, path_id);
        match self.lookup(&key) {
            Ok(value) => value.name(),
            Err(err) => {
                log::trace!("no last segment for {key}: {err}");
                String::new()
            }
        }
    }

    /// Resolve the full path, reporting any failure.
    ///
    /// A broken chain ends with [`ResolverError::LookupMiss`], whose `path`
    /// holds [`DENTRY_PATH_KEY_NOT_FOUND`].
    pub fn try_resolve(
        &self,
        mount_id: u32,
        inode: u64,
        path_id: u32,
    ) -> Result<String, ResolverError> {
        let target = PathKey::new(mount_id, inode, path_id);
        if target.is_null() {
            return Err(KeyError::InvalidKey { inode, mount_id }.into());
        }

        let mut segments: Vec<String> = Vec::new();
        let mut cursor = target;
        let mut reached_root = false;
        // Root-named records push no segment, so count records, not segments
        for _ in 0..MAX_PATH_DEPTH {
            let value = self.cached_lookup(&cursor)?;

            // Don't append the root dentry name
            if !value.has_root_name() {
                segments.push(value.name());
            }

            if value.parent.inode == 0 {
                reached_root = true;
                break;
            }
            cursor = value.parent;
        }
        if !reached_root {
            return Err(ResolverError::TooDeep { key: target });
        }

        if segments.is_empty() {
            return Ok("/".to_string());
        }
        let mut path = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
        for segment in segments.iter().rev() {
            path.push('/');
            path.push_str(segment);
        }
        Ok(path)
    }

    /// Resolve the full path, never failing.
    ///
    /// Broken chains resolve to [`DENTRY_PATH_KEY_NOT_FOUND`], null keys to
    /// an empty string.
    pub fn resolve(&self, mount_id: u32, inode: u64, path_id: u32) -> String {
        match self.try_resolve(mount_id, inode, path_id) {
            Ok(path) => path,
            Err(ResolverError::LookupMiss { key, path }) => {
                log::trace!("broken path chain at {key}");
                path
            }
            Err(ResolverError::Key(err @ KeyError::InvalidKey { .. })) => {
                log::debug!("not resolving path: {err}");
                String::new()
            }
            Err(err) => {
                log::debug!("resolving {mount_id:x}/{inode:x}: {err}");
                DENTRY_PATH_KEY_NOT_FOUND.to_string()
            }
        }
    }

    /// Mount id and inode of the immediate parent, read from the kernel map
    /// and not from the cache.
    pub fn get_parent(
        &self,
        mount_id: u32,
        inode: u64,
        path_id: u32,
    ) -> Result<(u32, u64), ResolverError> {
        let value = self.lookup(&PathKey::new(mount_id, inode, path_id))?;
        Ok((value.parent.mount_id, value.parent.inode))
    }

    /// Number of records currently cached.
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use bpf_common::{
        parsing::StringArray,
        test_utils::{MemoryMap, MemoryRegistry},
    };

    use super::*;
    use crate::config::PATHNAMES_MAP;

    fn record(map: &MemoryMap, key: PathKey, parent: PathKey, name: &str) {
        let value = PathValue::new(parent, StringArray::try_from(name).unwrap());
        map.seed(&key.encode().unwrap(), &value.encode());
    }

    /// `/file.txt` and `/etc/passwd` on mount 1
    fn setup(config: Config) -> (DentryResolver, Arc<MemoryMap>) {
        let mut registry = MemoryRegistry::new();
        let map = registry.add(PATHNAMES_MAP);
        record(&map, PathKey::new(1, 1, 0), PathKey::new(1, 0, 0), "/");
        record(&map, PathKey::new(1, 10, 0), PathKey::new(1, 1, 0), "file.txt");
        record(&map, PathKey::new(1, 20, 0), PathKey::new(1, 1, 0), "etc");
        record(&map, PathKey::new(1, 21, 0), PathKey::new(1, 20, 0), "passwd");
        let resolver = DentryResolver::start(&registry, &config).unwrap();
        (resolver, map)
    }

    #[test]
    fn missing_map() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            DentryResolver::start(&registry, &Config::default()),
            Err(ResolverError::MapNotFound(name)) if name == "pathnames"
        ));
    }

    #[test]
    fn resolve_chain() {
        let (resolver, _) = setup(Config::default());
        assert_eq!(resolver.resolve(1, 10, 0), "/file.txt");
        assert_eq!(resolver.try_resolve(1, 21, 0).unwrap(), "/etc/passwd");
        assert_eq!(resolver.resolve(1, 1, 0), "/");
    }

    #[test]
    fn resolve_is_idempotent() {
        let (resolver, _) = setup(Config::default());
        let first = resolver.resolve(1, 21, 0);
        let second = resolver.resolve(1, 21, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn cache_ignores_path_id() {
        let (resolver, map) = setup(Config::default());
        // (1,10) is stored under path id 7, the second call uses 99
        record(&map, PathKey::new(1, 10, 7), PathKey::new(1, 1, 0), "file.txt");
        assert_eq!(resolver.resolve(1, 10, 7), "/file.txt");
        let lookups = map.lookups();
        assert_eq!(resolver.resolve(1, 10, 99), "/file.txt");
        assert_eq!(map.lookups(), lookups);
    }

    #[test]
    fn cache_invalidates_on_path_id_change() {
        let (resolver, map) = setup(Config {
            pathid_policy: PathIdPolicy::Invalidate,
            ..Default::default()
        });
        record(&map, PathKey::new(1, 10, 7), PathKey::new(1, 1, 0), "file.txt");
        record(&map, PathKey::new(1, 10, 99), PathKey::new(1, 1, 0), "moved.txt");
        assert_eq!(resolver.resolve(1, 10, 7), "/file.txt");
        let lookups = map.lookups();
        assert_eq!(resolver.resolve(1, 10, 99), "/moved.txt");
        // only (1,10) is fetched again, the parent is still valid
        assert_eq!(map.lookups(), lookups + 1);
    }

    #[test]
    fn missing_entry() {
        let (resolver, _) = setup(Config::default());
        match resolver.try_resolve(1, 999, 0) {
            Err(ResolverError::LookupMiss { key, path }) => {
                assert_eq!(key, PathKey::new(1, 999, 0));
                assert_eq!(path, DENTRY_PATH_KEY_NOT_FOUND);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(resolver.resolve(1, 999, 0), DENTRY_PATH_KEY_NOT_FOUND);
    }

    #[test]
    fn broken_chain() {
        let (resolver, map) = setup(Config::default());
        record(&map, PathKey::new(1, 30, 0), PathKey::new(1, 31, 0), "orphan");
        assert_eq!(resolver.resolve(1, 30, 0), DENTRY_PATH_KEY_NOT_FOUND);
        // the segments fetched before the break stay cached
        assert_eq!(resolver.cached_records(), 1);
    }

    #[test]
    fn null_key() {
        let (resolver, map) = setup(Config::default());
        assert!(matches!(
            resolver.try_resolve(0, 0, 5),
            Err(ResolverError::Key(KeyError::InvalidKey { .. }))
        ));
        assert_eq!(resolver.resolve(0, 0, 5), "");
        assert_eq!(resolver.get_last_segment(0, 0, 0), "");
        assert_eq!(map.lookups(), 0);
    }

    #[test]
    fn self_referencing_chain() {
        let (resolver, map) = setup(Config::default());
        record(&map, PathKey::new(1, 40, 0), PathKey::new(1, 40, 0), "loop");
        assert!(matches!(
            resolver.try_resolve(1, 40, 0),
            Err(ResolverError::TooDeep { .. })
        ));
        assert_eq!(resolver.resolve(1, 40, 0), DENTRY_PATH_KEY_NOT_FOUND);
    }

    #[test]
    fn self_referencing_root_names() {
        let (resolver, map) = setup(Config::default());
        record(&map, PathKey::new(1, 40, 0), PathKey::new(1, 40, 0), "/");
        record(&map, PathKey::new(1, 50, 0), PathKey::new(1, 51, 0), "");
        record(&map, PathKey::new(1, 51, 0), PathKey::new(1, 50, 0), "/");
        for inode in [40, 50] {
            assert!(matches!(
                resolver.try_resolve(1, inode, 0),
                Err(ResolverError::TooDeep { .. })
            ));
            assert_eq!(resolver.resolve(1, inode, 0), DENTRY_PATH_KEY_NOT_FOUND);
        }
        // the walk is served from the cache after the first pass
        assert_eq!(map.lookups(), 3);
    }

    #[test]
    fn last_segment() {
        let (resolver, _) = setup(Config::default());
        assert_eq!(resolver.get_last_segment(1, 21, 0), "passwd");
        assert_eq!(resolver.get_last_segment(1, 999, 0), "");
    }

    #[test]
    fn parent() {
        let (resolver, _) = setup(Config::default());
        assert_eq!(resolver.get_parent(1, 21, 0).unwrap(), (1, 20));
        assert!(matches!(
            resolver.get_parent(1, 999, 0),
            Err(ResolverError::LookupMiss { .. })
        ));
    }

    #[test]
    fn bounded_cache() {
        let (resolver, _) = setup(Config {
            cache_size: NonZeroUsize::new(2).unwrap(),
            ..Default::default()
        });
        resolver.resolve(1, 21, 0);
        resolver.resolve(1, 10, 0);
        assert_eq!(resolver.cached_records(), 2);
    }

    #[test]
    fn concurrent_resolution() {
        let (resolver, _) = setup(Config::default());
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        assert_eq!(resolver.resolve(1, 21, 0), "/etc/passwd");
                        assert_eq!(resolver.resolve(1, 10, 0), "/file.txt");
                    }
                });
            }
        });
    }
}
