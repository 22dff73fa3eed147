//! Tracks open file handles and deals with handle allocation.
//!
//! Unlike a content-addressed store's inode tracker, handles here are never
//! deduplicated: every `open` gets its own buffer, even for the same path,
//! per the contents-adapter contract in §4.2.

use std::collections::HashMap;

/// An open file's buffered contents plus the path it was opened from, so
/// `truncate` can broadcast updates to every handle on that path.
#[derive(Clone, Debug)]
pub struct HandleEntry {
    pub path: String,
    pub buf: Vec<u8>,
}

/// Allocates and tracks handles. Handle ids are never reused within a
/// session: `next_handle` only ever increases.
pub struct HandleRegistry {
    handles: HashMap<u64, HandleEntry>,
    next_handle: u64,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self {
            handles: HashMap::default(),
            // handle 0 is reserved to mean "no handle" on the wire.
            next_handle: 1,
        }
    }
}

impl HandleRegistry {
    /// Allocates a fresh handle for `path` with the given initial buffer.
    pub fn insert(&mut self, path: String, buf: Vec<u8>) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, HandleEntry { path, buf });
        handle
    }

    pub fn get(&self, handle: u64) -> Option<&HandleEntry> {
        self.handles.get(&handle)
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut HandleEntry> {
        self.handles.get_mut(&handle)
    }

    /// Drops the buffered contents and frees the handle.
    pub fn remove(&mut self, handle: u64) -> Option<HandleEntry> {
        self.handles.remove(&handle)
    }

    /// All handles currently open against `path`, used by `truncate` to
    /// broadcast an updated buffer to every concurrent open of the same
    /// file.
    pub fn handles_for_path<'a>(&'a mut self, path: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.handles
            .iter()
            .filter(move |(_, entry)| entry.path == path)
            .map(|(handle, _)| *handle)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_nonexistent() {
        let registry = HandleRegistry::default();
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn insert_allocates_increasing_handles() {
        let mut registry = HandleRegistry::default();
        let h1 = registry.insert("/a".into(), b"one".to_vec());
        let h2 = registry.insert("/a".into(), b"two".to_vec());
        assert_ne!(h1, h2);
        assert_eq!(registry.get(h1).unwrap().buf, b"one");
        assert_eq!(registry.get(h2).unwrap().buf, b"two");
    }

    #[test]
    fn concurrent_opens_of_same_path_are_independent() {
        let mut registry = HandleRegistry::default();
        let h1 = registry.insert("/a".into(), b"x".to_vec());
        let h2 = registry.insert("/a".into(), b"x".to_vec());

        registry.get_mut(h1).unwrap().buf = b"changed".to_vec();
        assert_eq!(registry.get(h2).unwrap().buf, b"x");
    }

    #[test]
    fn remove_frees_the_handle() {
        let mut registry = HandleRegistry::default();
        let h1 = registry.insert("/a".into(), b"x".to_vec());
        assert!(registry.remove(h1).is_some());
        assert!(registry.get(h1).is_none());
    }

    #[test]
    fn handles_for_path_finds_all_concurrent_opens() {
        let mut registry = HandleRegistry::default();
        let h1 = registry.insert("/a".into(), b"x".to_vec());
        let h2 = registry.insert("/a".into(), b"y".to_vec());
        let _h3 = registry.insert("/b".into(), b"z".to_vec());

        let mut found: Vec<u64> = registry.handles_for_path("/a").collect();
        found.sort_unstable();
        let mut expected = vec![h1, h2];
        expected.sort_unstable();
        assert_eq!(found, expected);
    }
}
