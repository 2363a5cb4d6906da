use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::*;

/// An object store held entirely in memory.
///
/// Handy for tests: it counts (and remembers) every ranged fetch,
/// and can be told to fail every call as if the network went away.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Container name -> object name -> contents
    containers: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    failing: AtomicBool,
    fetch_count: AtomicUsize,
    fetches: Mutex<Vec<(ByteRange, FetchOptions)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object, creating its container as needed.
    pub fn with_object(mut self, container: &str, name: &str, contents: Vec<u8>) -> Self {
        self.containers
            .entry(container.to_owned())
            .or_default()
            .insert(name.to_owned(), contents);
        self
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// How many ranged fetches have been served
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Every fetched range (and the options it came with), oldest first
    pub fn fetches(&self) -> Vec<(ByteRange, FetchOptions)> {
        match self.fetches.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn check_failing(&self) -> Result<(), TransportError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err("store is unreachable".into());
        }
        Ok(())
    }

    fn object(&self, object_id: &str) -> Option<&Vec<u8>> {
        let (container, name) = object_id.split_once('/')?;
        self.containers.get(container)?.get(name)
    }
}

impl ObjectStore for MemoryStore {
    fn list_containers(&self) -> Result<Vec<Container>, TransportError> {
        self.check_failing()?;
        Ok(self
            .containers
            .keys()
            .map(|name| Container {
                id: name.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn list_object_versions(
        &self,
        container_id: &str,
    ) -> Result<Vec<ObjectVersion>, TransportError> {
        self.check_failing()?;
        let objects = self
            .containers
            .get(container_id)
            .ok_or_else(|| format!("no container {container_id}"))?;
        Ok(objects
            .iter()
            .map(|(name, contents)| ObjectVersion {
                id: format!("{container_id}/{name}"),
                name: name.clone(),
                length: contents.len() as u64,
            })
            .collect())
    }

    fn fetch_range(
        &self,
        object_id: &str,
        range: ByteRange,
        options: &FetchOptions,
    ) -> Result<Vec<u8>, TransportError> {
        self.check_failing()?;
        let contents = self
            .object(object_id)
            .ok_or_else(|| format!("no object {object_id}"))?;
        let start = usize::try_from(range.start)?;
        let end = usize::try_from(range.end)?;
        let bytes = contents
            .get(start..=end)
            .ok_or_else(|| format!("{range} is past the end of {object_id}"))?;

        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.fetches
            .lock()
            .map_err(|_| "fetch log poisoned")?
            .push((range, options.clone()));
        Ok(bytes.to_vec())
    }
}
