use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::*;

/// A directory on disk posing as an object store.
///
/// Each subdirectory of the root is a container,
/// and each regular file directly inside one is an object
/// (with a single version, whose id is `container/file`).
/// Timeouts in [`FetchOptions`] are ignored; local reads don't have any.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Maps an object id back to a path, refusing anything that
    /// would climb out of the root.
    fn object_path(&self, object_id: &str) -> Result<PathBuf, TransportError> {
        let (container, name) = object_id
            .split_once('/')
            .ok_or_else(|| format!("malformed object id {object_id}"))?;
        let plain =
            |s: &str| !s.is_empty() && s != "." && s != ".." && !s.contains(&['/', '\\'][..]);
        if !plain(container) || !plain(name) {
            return Err(format!("malformed object id {object_id}").into());
        }
        Ok(self.root.join(container).join(name))
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_owned)
}

impl ObjectStore for LocalStore {
    fn list_containers(&self) -> Result<Vec<Container>, TransportError> {
        let mut containers = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = file_name(&entry.path()) {
                containers.push(Container {
                    id: name.clone(),
                    name,
                });
            }
        }
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    fn list_object_versions(
        &self,
        container_id: &str,
    ) -> Result<Vec<ObjectVersion>, TransportError> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(self.root.join(container_id))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = file_name(&entry.path()) {
                versions.push(ObjectVersion {
                    id: format!("{container_id}/{name}"),
                    name,
                    length: metadata.len(),
                });
            }
        }
        versions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(versions)
    }

    fn fetch_range(
        &self,
        object_id: &str,
        range: ByteRange,
        _options: &FetchOptions,
    ) -> Result<Vec<u8>, TransportError> {
        let mut file = File::open(self.object_path(object_id)?)?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; usize::try_from(range.len())?];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
