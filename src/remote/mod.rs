//! The narrow slice of an object store we need:
//! listing (to check that an object exists) and ranged fetches.
//!
//! Anything that can list containers, list the object versions in them,
//! and return an inclusive byte range of an object can back a
//! [`BlockCachedReader`](crate::reader::BlockCachedReader).
//! Two stores ship with the crate: [`MemoryStore`] for tests and fixtures,
//! and [`LocalStore`], which treats a directory as a bucket of objects.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::*;

use crate::result::*;

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// An inclusive range of bytes in a remote object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Creates the range `start..=end`.
    ///
    /// Returns `None` if `end < start`.
    pub fn between(start: u64, end: u64) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// The number of bytes in the range (never zero).
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Fails with [`ZipError::OutOfBounds`] unless the whole range
    /// lies inside an object of `length` bytes.
    pub fn check_within(&self, length: u64) -> ZipResult<()> {
        if self.end >= length {
            return Err(ZipError::OutOfBounds {
                start: self.start,
                end: self.end,
                length,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

/// Per-fetch knobs handed straight to the store.
///
/// We don't enforce any of these ourselves;
/// each store honors them (or doesn't) as its client allows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
}

/// A bucket (or whatever the store calls it) holding objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// One immutable version of an object in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub id: String,
    pub name: String,
    pub length: u64,
}

/// The remote object store client.
///
/// Errors are the client's own; callers wrap them in
/// [`ZipError::Transport`] along with the operation that failed.
pub trait ObjectStore {
    fn list_containers(&self) -> Result<Vec<Container>, TransportError>;

    fn list_object_versions(&self, container_id: &str)
        -> Result<Vec<ObjectVersion>, TransportError>;

    /// Returns exactly the bytes in `range` of the given object.
    fn fetch_range(
        &self,
        object_id: &str,
        range: ByteRange,
        options: &FetchOptions,
    ) -> Result<Vec<u8>, TransportError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn list_containers(&self) -> Result<Vec<Container>, TransportError> {
        (**self).list_containers()
    }

    fn list_object_versions(
        &self,
        container_id: &str,
    ) -> Result<Vec<ObjectVersion>, TransportError> {
        (**self).list_object_versions(container_id)
    }

    fn fetch_range(
        &self,
        object_id: &str,
        range: ByteRange,
        options: &FetchOptions,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_range(object_id, range, options)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn list_containers(&self) -> Result<Vec<Container>, TransportError> {
        (**self).list_containers()
    }

    fn list_object_versions(
        &self,
        container_id: &str,
    ) -> Result<Vec<ObjectVersion>, TransportError> {
        (**self).list_object_versions(container_id)
    }

    fn fetch_range(
        &self,
        object_id: &str,
        range: ByteRange,
        options: &FetchOptions,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_range(object_id, range, options)
    }
}

/// A handle to a single immutable object in a store.
///
/// This is just a value: it doesn't talk to the store until asked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    container: Container,
    version: ObjectVersion,
}

impl RemoteObject {
    pub fn new(container: Container, version: ObjectVersion) -> Self {
        Self { container, version }
    }

    /// Finds the first version named `object_name`
    /// in the container named `container_name`.
    pub fn locate<S: ObjectStore + ?Sized>(
        store: &S,
        container_name: &str,
        object_name: &str,
    ) -> ZipResult<Self> {
        let container = store
            .list_containers()
            .map_err(|e| ZipError::transport(TransportOperation::ListContainers, e))?
            .into_iter()
            .find(|c| c.name == container_name)
            .ok_or_else(|| {
                ZipError::ObjectNotFound(format!("No container named {container_name}"))
            })?;

        let version = store
            .list_object_versions(&container.id)
            .map_err(|e| ZipError::transport(TransportOperation::ListObjectVersions, e))?
            .into_iter()
            .find(|v| v.name == object_name)
            .ok_or_else(|| {
                ZipError::ObjectNotFound(format!("{container_name}/{object_name}"))
            })?;

        debug!(
            "Located {}/{} ({} bytes) as {}",
            container.name, version.name, version.length, version.id
        );
        Ok(Self::new(container, version))
    }

    /// Asks the store whether this object (still) exists.
    pub fn exists<S: ObjectStore + ?Sized>(&self, store: &S) -> ZipResult<bool> {
        let containers = store
            .list_containers()
            .map_err(|e| ZipError::transport(TransportOperation::ListContainers, e))?;
        if !containers.iter().any(|c| c.id == self.container.id) {
            return Ok(false);
        }

        let versions = store
            .list_object_versions(&self.container.id)
            .map_err(|e| ZipError::transport(TransportOperation::ListObjectVersions, e))?;
        Ok(versions.iter().any(|v| v.id == self.version.id))
    }

    /// The object's size in bytes, as recorded when it was listed.
    pub fn length(&self) -> u64 {
        self.version.length
    }

    /// Objects are never directories.
    pub fn is_directory(&self) -> bool {
        false
    }

    pub fn object_id(&self) -> &str {
        &self.version.id
    }

    pub fn name(&self) -> &str {
        &self.version.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container.name, self.version.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_ranges() {
        assert!(ByteRange::between(5, 4).is_none());
        let r = ByteRange::between(4, 4).unwrap();
        assert_eq!(r.len(), 1);
        assert!(r.check_within(5).is_ok());
        match r.check_within(4) {
            Err(ZipError::OutOfBounds { start, end, length }) => {
                assert_eq!((start, end, length), (4, 4, 4));
            }
            other => panic!("Expected OutOfBounds, got {:?}", other),
        }
        assert_eq!(r.to_string(), "bytes=4-4");
    }

    #[test]
    fn locate_and_exists() {
        let store = MemoryStore::new().with_object("bucket", "a.zip", vec![0u8; 10]);
        let object = RemoteObject::locate(&store, "bucket", "a.zip").unwrap();
        assert_eq!(object.length(), 10);
        assert!(!object.is_directory());
        assert!(object.exists(&store).unwrap());
        assert_eq!(object.to_string(), "bucket/a.zip");

        let empty = MemoryStore::new();
        assert!(!object.exists(&empty).unwrap());

        match RemoteObject::locate(&store, "bucket", "b.zip") {
            Err(ZipError::ObjectNotFound(what)) => assert_eq!(what, "bucket/b.zip"),
            other => panic!("Expected ObjectNotFound, got {:?}", other),
        }
    }

    #[test]
    fn listing_failures_name_the_operation() {
        let store = MemoryStore::new().with_object("bucket", "a.zip", vec![0u8; 10]);
        let object = RemoteObject::locate(&store, "bucket", "a.zip").unwrap();
        store.set_failing(true);
        match object.exists(&store) {
            Err(ZipError::Transport { operation, .. }) => {
                assert_eq!(operation, TransportOperation::ListContainers)
            }
            other => panic!("Expected a transport error, got {:?}", other),
        }
    }
}
