//! Seekable readers over a remote (or in-memory) object.
//!
//! The ZIP parser only needs to seek around and read exact byte counts,
//! so that's all [`RandomAccess`] asks for.
//! [`BlockCachedReader`] satisfies it by turning reads into ranged fetches
//! against an [`ObjectStore`] and keeping recently fetched blocks around;
//! [`SliceReader`] satisfies it with a plain byte slice.
//!
//! Readers keep a cursor and (for the cached one) a cache, both mutated by
//! every call, so they take `&mut self` and each belongs to a single owner.
//! To read an archive from several threads, give each its own reader.

use std::io;

use log::*;

use crate::cache::{BlockCache, CacheConfig};
use crate::remote::{ByteRange, FetchOptions, ObjectStore, RemoteObject};
use crate::result::*;

/// A cursor over a fixed-length run of bytes.
///
/// After a seek, the cursor is always in `[0, length - 1]`.
/// A read that consumes the final byte leaves it at `length`,
/// where further reads return nothing.
pub trait RandomAccess {
    /// Total length in bytes; never changes.
    fn length(&self) -> u64;

    fn position(&self) -> u64;

    /// Moves the cursor to `pos`, clamped to `[0, length - 1]`.
    fn seek(&mut self, pos: i64) -> ZipResult<()>;

    /// Reads exactly `buf.len()` bytes from the cursor and advances past them.
    ///
    /// Fails with [`ZipError::OutOfBounds`] (without reading anything)
    /// if that runs past the end.
    fn read_fully(&mut self, buf: &mut [u8]) -> ZipResult<()>;

    /// Reads up to `buf.len()` bytes, stopping at the end of the object.
    ///
    /// Returns the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> ZipResult<usize> {
        let available = self.length().saturating_sub(self.position());
        let count = usize::try_from(available).map_or(buf.len(), |a| a.min(buf.len()));
        self.read_fully(&mut buf[..count])?;
        Ok(count)
    }

    /// Moves the cursor forward by up to `n` bytes,
    /// stopping at the last byte. Returns how far it moved.
    fn skip_bytes(&mut self, n: u64) -> ZipResult<u64> {
        skip_forward(self, n)
    }
}

fn skip_forward<R: RandomAccess + ?Sized>(reader: &mut R, n: u64) -> ZipResult<u64> {
    let from = reader.position();
    let last = reader.length().saturating_sub(1);
    let to = from.saturating_add(n).min(last);
    if to <= from {
        return Ok(0);
    }
    reader.seek(i64::try_from(to).unwrap_or(i64::MAX))?;
    Ok(reader.position() - from)
}

/// Where a seek to `pos` lands in an object of `length` bytes
fn clamp_position(pos: i64, length: u64) -> u64 {
    u64::try_from(pos)
        .unwrap_or(0)
        .min(length.saturating_sub(1))
}

fn range_from(position: u64, len: usize) -> Option<ByteRange> {
    let len = u64::try_from(len).ok()?.checked_sub(1)?;
    ByteRange::between(position, position.checked_add(len)?)
}

/// A [`RandomAccess`] over bytes already in memory
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    position: u64,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }
}

impl RandomAccess for SliceReader<'_> {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, pos: i64) -> ZipResult<()> {
        self.position = clamp_position(pos, self.length());
        Ok(())
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> ZipResult<()> {
        let range = match range_from(self.position, buf.len()) {
            Some(r) => r,
            None => return Ok(()),
        };
        range.check_within(self.length())?;
        // check_within() guarantees both ends fit in the slice.
        let start = range.start as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.position = range.end + 1;
        Ok(())
    }
}

/// A [`RandomAccess`] over a remote object, backed by a block cache.
///
/// Reads touching one or two blocks are served from the cache,
/// fetching whichever blocks are missing. Reads spanning three or more
/// blocks still cache every block they touch, but copy their bytes from
/// one direct fetch of the requested range.
pub struct BlockCachedReader<S: ObjectStore> {
    /// `None` once closed
    store: Option<S>,
    object: RemoteObject,
    length: u64,
    position: u64,
    cache: BlockCache,
    fetch_options: FetchOptions,
    fetch_count: u64,
}

impl<S: ObjectStore> BlockCachedReader<S> {
    /// Opens a reader with the default cache configuration.
    pub fn new(store: S, object: RemoteObject) -> ZipResult<Self> {
        Self::with_config(store, object, CacheConfig::default(), FetchOptions::default())
    }

    /// Opens a reader, checking first that the object exists.
    ///
    /// The object's length is taken from its handle once, here;
    /// it's immutable, so we never ask again.
    pub fn with_config(
        store: S,
        object: RemoteObject,
        config: CacheConfig,
        fetch_options: FetchOptions,
    ) -> ZipResult<Self> {
        // The fields are public, so someone may have built one by hand.
        let config = CacheConfig::new(
            config.block_size,
            config.max_blocks,
            config.block_spill_amount,
        )?;

        if object.is_directory() || !object.exists(&store)? {
            return Err(ZipError::ObjectNotFound(object.to_string()));
        }
        let length = object.length();
        debug!("Opened {} ({} bytes) with {:?}", object, length, config);

        Ok(Self {
            store: Some(store),
            object,
            length,
            position: 0,
            cache: BlockCache::new(config),
            fetch_options,
            fetch_count: 0,
        })
    }

    pub fn object(&self) -> &RemoteObject {
        &self.object
    }

    /// The number of ranged fetches this reader has made
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    /// The number of blocks currently cached
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Indices of the cached blocks, most recently used first
    pub fn cached_block_indices(&self) -> Vec<u64> {
        self.cache.recency().collect()
    }

    pub fn cache_config(&self) -> &CacheConfig {
        self.cache.config()
    }

    /// Releases the store. Calling this more than once is fine;
    /// anything else after the first call fails with [`ZipError::Closed`].
    pub fn close(&mut self) {
        if self.store.take().is_some() {
            debug!(
                "Closed {} after {} fetches",
                self.object, self.fetch_count
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    fn check_open(&self) -> ZipResult<()> {
        if self.store.is_none() {
            return Err(ZipError::Closed);
        }
        Ok(())
    }

    /// Fetches `range` from the store, bounds-checking it first.
    fn fetch(&mut self, range: ByteRange) -> ZipResult<Vec<u8>> {
        range.check_within(self.length)?;
        let store = self.store.as_ref().ok_or(ZipError::Closed)?;

        debug!("Fetching {} of {}", range, self.object);
        let bytes = store
            .fetch_range(self.object.object_id(), range, &self.fetch_options)
            .map_err(|e| ZipError::transport(TransportOperation::FetchRange, e))?;
        self.fetch_count += 1;

        if bytes.len() as u64 != range.len() {
            return Err(ZipError::transport(
                TransportOperation::FetchRange,
                format!(
                    "asked for {} bytes ({}), got {}",
                    range.len(),
                    range,
                    bytes.len()
                ),
            ));
        }
        Ok(bytes)
    }

    /// Makes sure every block `range` touches is cached
    /// (and marked as recently used).
    fn cache_blocks(&mut self, range: ByteRange) -> ZipResult<()> {
        let blocks = self.cache.blocks_containing(range);
        // Bump what we have first so fetching the rest doesn't evict it.
        for block in blocks.clone() {
            self.cache.touch(block);
        }
        for block in blocks {
            if self.cache.contains(block) {
                continue;
            }
            let block_range = self.cache.block_range(block, self.length)?;
            let bytes = self.fetch(block_range)?;
            self.cache.insert(block, bytes);
        }
        Ok(())
    }

    /// Copies `range` out of the cache if it touches at most two blocks,
    /// all of which are (still) cached.
    ///
    /// Returns false if the caller needs to fetch the range directly.
    fn copy_from_cache(&self, range: ByteRange, buf: &mut [u8]) -> bool {
        let block_size = self.cache.config().block_size;
        let blocks = self.cache.blocks_containing(range);
        let (first, last) = (*blocks.start(), *blocks.end());
        // Offsets within a block are always less than block_size,
        // and blocks are in memory, so these fit in a usize.
        let start_offset = (range.start % block_size) as usize;

        if first == last {
            let block = match self.cache.get(first) {
                Some(b) => b,
                None => return false,
            };
            return match block.get(start_offset..start_offset + buf.len()) {
                Some(bytes) => {
                    buf.copy_from_slice(bytes);
                    true
                }
                None => false,
            };
        }

        if last == first + 1 {
            let (head, tail) = match (self.cache.get(first), self.cache.get(last)) {
                (Some(h), Some(t)) => (h, t),
                // A tiny cache might have spilled one of them while fetching the other.
                _ => return false,
            };
            let head = match head.get(start_offset..) {
                Some(h) => h,
                None => return false,
            };
            let tail_len = buf.len() - head.len();
            let tail = match tail.get(..tail_len) {
                Some(t) => t,
                None => return false,
            };
            buf[..head.len()].copy_from_slice(head);
            buf[head.len()..].copy_from_slice(tail);
            return true;
        }

        // TODO: assemble 3+ block reads from the cache now that every block is in it,
        // instead of fetching the whole range again.
        false
    }
}

impl<S: ObjectStore> RandomAccess for BlockCachedReader<S> {
    fn length(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, pos: i64) -> ZipResult<()> {
        self.check_open()?;
        self.position = clamp_position(pos, self.length);
        trace!("Seeked to {} (asked for {})", self.position, pos);
        Ok(())
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> ZipResult<()> {
        self.check_open()?;
        let range = match range_from(self.position, buf.len()) {
            Some(r) => r,
            None => return Ok(()),
        };
        range.check_within(self.length)?;

        self.cache_blocks(range)?;
        if !self.copy_from_cache(range, buf) {
            let blocks = self.cache.blocks_containing(range);
            debug!(
                "Direct read of {} spanning blocks {}..={}",
                range,
                blocks.start(),
                blocks.end()
            );
            let bytes = self.fetch(range)?;
            buf.copy_from_slice(&bytes);
        }
        self.position = range.end + 1;
        Ok(())
    }

    fn skip_bytes(&mut self, n: u64) -> ZipResult<u64> {
        self.check_open()?;
        skip_forward(self, n)
    }
}

impl<S: ObjectStore> io::Read for BlockCachedReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(RandomAccess::read(self, buf)?)
    }
}

/// Unlike [`RandomAccess::seek()`], seeking to (or past) the end leaves
/// the cursor at `length`, so the next [`io::Read::read()`] returns 0.
impl<S: ObjectStore> io::Seek for BlockCachedReader<S> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(p) => i64::try_from(p).unwrap_or(i64::MAX),
            io::SeekFrom::End(p) => i64::try_from(self.length)
                .unwrap_or(i64::MAX)
                .saturating_add(p),
            io::SeekFrom::Current(p) => i64::try_from(self.position)
                .unwrap_or(i64::MAX)
                .saturating_add(p),
        };
        if u64::try_from(target).map_or(false, |t| t >= self.length) {
            self.check_open()?;
            self.position = self.length;
            trace!("Seeked to the end ({})", self.length);
        } else {
            RandomAccess::seek(self, target)?;
        }
        Ok(self.position)
    }
}

impl<S: ObjectStore> Drop for BlockCachedReader<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;

    fn contents(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn reader(
        store: &MemoryStore,
        block_size: u64,
        max_blocks: usize,
        spill: usize,
    ) -> BlockCachedReader<&MemoryStore> {
        let object = RemoteObject::locate(store, "bucket", "object").unwrap();
        let config = CacheConfig::new(block_size, max_blocks, spill).unwrap();
        BlockCachedReader::with_config(store, object, config, FetchOptions::default()).unwrap()
    }

    #[test]
    fn seeks_are_clamped() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let mut r = reader(&store, 16, 4, 1);
        r.seek(-5).unwrap();
        assert_eq!(r.position(), 0);
        r.seek(100).unwrap();
        assert_eq!(r.position(), 99);
        r.seek(i64::MAX).unwrap();
        assert_eq!(r.position(), 99);
        r.seek(42).unwrap();
        assert_eq!(r.position(), 42);
        assert_eq!(store.fetch_count(), 0);
    }

    #[test]
    fn single_block_reads() {
        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());
        let mut r = reader(&store, 16, 4, 1);

        r.seek(18).unwrap();
        let mut buf = [0u8; 10];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[18..28]);
        assert_eq!(r.position(), 28);
        // Whole block 1 was fetched, once.
        assert_eq!(store.fetches()[0].0, ByteRange::between(16, 31).unwrap());

        r.seek(16).unwrap();
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[16..26]);
        assert_eq!(r.fetch_count(), 1);
    }

    #[test]
    fn two_block_reads() {
        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());
        let mut r = reader(&store, 16, 4, 1);

        r.seek(10).unwrap();
        let mut buf = [0u8; 12];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[10..22]);
        assert_eq!(r.fetch_count(), 2);
        assert_eq!(r.cached_blocks(), 2);
    }

    #[test]
    fn three_block_reads_fetch_directly() {
        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());
        let mut r = reader(&store, 8, 8, 2);

        r.seek(5).unwrap();
        let mut buf = [0u8; 20];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[5..25]);
        // Four blocks cached, then the range itself.
        assert_eq!(r.fetch_count(), 5);
        assert_eq!(
            store.fetches().last().unwrap().0,
            ByteRange::between(5, 24).unwrap()
        );
        assert_eq!(r.cached_block_indices(), vec![3, 2, 1, 0]);
        assert_eq!(r.position(), 25);
    }

    #[test]
    fn reads_bigger_than_the_cache() {
        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());

        // Fetching the second block spills the first.
        let mut r = reader(&store, 8, 1, 1);
        r.seek(4).unwrap();
        let mut buf = [0u8; 8];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[4..12]);
        assert_eq!(r.cached_block_indices(), vec![1]);
        assert_eq!(
            store.fetches().last().unwrap().0,
            ByteRange::between(4, 11).unwrap()
        );

        // Five blocks through a two-block cache
        let mut r = reader(&store, 4, 2, 1);
        let mut buf = [0u8; 20];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[..20]);
        assert!(r.cached_blocks() <= 2);
        assert_eq!(r.cached_block_indices(), vec![4, 3]);
    }

    #[test]
    fn fetch_options_are_passed_through() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let object = RemoteObject::locate(&store, "bucket", "object").unwrap();
        let options = FetchOptions {
            timeout: Some(std::time::Duration::from_secs(3)),
        };
        let mut r =
            BlockCachedReader::with_config(&store, object, CacheConfig::default(), options.clone())
                .unwrap();
        let mut buf = [0u8; 4];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(store.fetches()[0].1, options);
        // The whole (short) object is one block.
        assert_eq!(store.fetches()[0].0, ByteRange::between(0, 99).unwrap());
    }

    #[test]
    fn reads_past_the_end_fail_without_fetching() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let mut r = reader(&store, 16, 4, 1);
        r.seek(95).unwrap();
        let mut buf = [0u8; 10];
        match r.read_fully(&mut buf) {
            Err(ZipError::OutOfBounds { start, end, length }) => {
                assert_eq!((start, end, length), (95, 104, 100));
            }
            other => panic!("Expected OutOfBounds, got {:?}", other),
        }
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(r.position(), 95);
    }

    #[test]
    fn short_reads_stop_at_the_end() {
        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());
        let mut r = reader(&store, 16, 4, 1);
        r.seek(95).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(RandomAccess::read(&mut r, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &data[95..]);
        assert_eq!(r.position(), 100);
        assert_eq!(RandomAccess::read(&mut r, &mut buf).unwrap(), 0);
    }

    #[test]
    fn skipping() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let mut r = reader(&store, 16, 4, 1);
        assert_eq!(r.skip_bytes(10).unwrap(), 10);
        assert_eq!(r.skip_bytes(1000).unwrap(), 89);
        assert_eq!(r.position(), 99);
        assert_eq!(r.skip_bytes(1).unwrap(), 0);
    }

    #[test]
    fn closing() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let mut r = reader(&store, 16, 4, 1);
        r.close();
        r.close();
        assert!(r.is_closed());
        assert!(matches!(r.seek(0), Err(ZipError::Closed)));
        let mut buf = [0u8; 1];
        assert!(matches!(r.read_fully(&mut buf), Err(ZipError::Closed)));
        assert!(matches!(r.skip_bytes(1), Err(ZipError::Closed)));
        assert!(matches!(r.skip_bytes(0), Err(ZipError::Closed)));
        assert_eq!(store.fetch_count(), 0);

        // Skipping from the last byte goes nowhere, but still needs an open reader.
        let mut r = reader(&store, 16, 4, 1);
        r.seek(99).unwrap();
        assert_eq!(r.skip_bytes(5).unwrap(), 0);
        r.close();
        assert!(matches!(r.skip_bytes(5), Err(ZipError::Closed)));
        assert!(matches!(
            io::Seek::seek(&mut r, io::SeekFrom::End(0)),
            Err(e) if e.kind() == io::ErrorKind::NotConnected
        ));
    }

    #[test]
    fn std_io_adapters() {
        use std::io::{Read, Seek, SeekFrom};

        let data = contents(100);
        let store = MemoryStore::new().with_object("bucket", "object", data.clone());
        let mut r = reader(&store, 16, 4, 1);

        assert_eq!(Seek::seek(&mut r, SeekFrom::End(-4)).unwrap(), 96);
        let mut tail = Vec::new();
        r.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, &data[96..]);

        // The end is a valid place to stand; nothing is re-read from there.
        assert_eq!(Seek::seek(&mut r, SeekFrom::End(0)).unwrap(), 100);
        let mut buf = [0u8; 4];
        assert_eq!(Read::read(&mut r, &mut buf).unwrap(), 0);
        assert_eq!(Seek::seek(&mut r, SeekFrom::Start(500)).unwrap(), 100);
        assert_eq!(Read::read(&mut r, &mut buf).unwrap(), 0);

        assert_eq!(Seek::seek(&mut r, SeekFrom::Current(-100)).unwrap(), 0);
        assert_eq!(Read::read(&mut r, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..], &data[..4]);
        assert_eq!(Seek::seek(&mut r, SeekFrom::Current(-50)).unwrap(), 0);
    }

    #[test]
    fn missing_objects() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let object = RemoteObject::locate(&store, "bucket", "object").unwrap();
        let elsewhere = MemoryStore::new();
        match BlockCachedReader::new(&elsewhere, object) {
            Err(ZipError::ObjectNotFound(what)) => assert_eq!(what, "bucket/object"),
            Err(other) => panic!("Expected ObjectNotFound, got {:?}", other),
            Ok(_) => panic!("Opened a missing object"),
        };
    }

    #[test]
    fn transport_failures_are_wrapped() {
        let store = MemoryStore::new().with_object("bucket", "object", contents(100));
        let mut r = reader(&store, 16, 4, 1);
        store.set_failing(true);
        let mut buf = [0u8; 4];
        match r.read_fully(&mut buf) {
            Err(ZipError::Transport { operation, .. }) => {
                assert_eq!(operation, TransportOperation::FetchRange)
            }
            other => panic!("Expected a transport error, got {:?}", other),
        }
    }

    #[test]
    fn slice_reader() {
        let data = contents(10);
        let mut r = SliceReader::new(&data);
        r.seek(-1).unwrap();
        let mut buf = [0u8; 4];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[..4]);
        r.seek(8).unwrap();
        assert!(matches!(
            r.read_fully(&mut buf),
            Err(ZipError::OutOfBounds { .. })
        ));
        assert_eq!(RandomAccess::read(&mut r, &mut buf).unwrap(), 2);
    }
}
