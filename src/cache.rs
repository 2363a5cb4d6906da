//! A bounded cache of fixed-size blocks of a remote object.
//!
//! Blocks are keyed by their index (`offset / block_size`).
//! Each covers `block_size` bytes, except the object's last block,
//! which may be shorter.
//!
//! Eviction is a batched LRU: once the cache holds more than `max_blocks`,
//! the `block_spill_amount` least recently used blocks are dropped in one go.
//! That lets the cache briefly hold one block more than its capacity,
//! but means we aren't evicting on every single insert.

use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;

use log::*;

use crate::remote::ByteRange;
use crate::result::*;

/// Sizing for a [`BlockCache`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Size of each block, in bytes
    pub block_size: u64,
    /// How many blocks to keep before spilling
    pub max_blocks: usize,
    /// How many blocks to drop each time we spill
    pub block_spill_amount: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024 * 1024,
            max_blocks: 16,
            block_spill_amount: 4,
        }
    }
}

impl CacheConfig {
    pub fn new(block_size: u64, max_blocks: usize, block_spill_amount: usize) -> ZipResult<Self> {
        if block_size == 0 {
            return Err(ZipError::InvalidConfiguration("block size must be positive"));
        }
        if max_blocks == 0 {
            return Err(ZipError::InvalidConfiguration(
                "cache must hold at least one block",
            ));
        }
        // Spilling more than max_blocks would evict the block we just fetched.
        if block_spill_amount == 0 || block_spill_amount > max_blocks {
            return Err(ZipError::InvalidConfiguration(
                "spill amount must be between 1 and max_blocks",
            ));
        }
        Ok(Self {
            block_size,
            max_blocks,
            block_spill_amount,
        })
    }
}

#[derive(Debug)]
pub(crate) struct BlockCache {
    config: CacheConfig,
    blocks: HashMap<u64, Vec<u8>>,
    /// Block indices, most recently used first.
    /// Always holds exactly the keys of `blocks`.
    recency: VecDeque<u64>,
}

impl BlockCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            blocks: HashMap::with_capacity(config.max_blocks + 1),
            recency: VecDeque::with_capacity(config.max_blocks + 1),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, block: u64) -> bool {
        self.blocks.contains_key(&block)
    }

    pub fn get(&self, block: u64) -> Option<&[u8]> {
        self.blocks.get(&block).map(Vec::as_slice)
    }

    /// The indices of every block `range` touches
    pub fn blocks_containing(&self, range: ByteRange) -> RangeInclusive<u64> {
        (range.start / self.config.block_size)..=(range.end / self.config.block_size)
    }

    /// The bytes `block` covers in an object of `object_length` bytes
    pub fn block_range(&self, block: u64, object_length: u64) -> ZipResult<ByteRange> {
        let start = block * self.config.block_size;
        let end = (start + self.config.block_size - 1).min(object_length.saturating_sub(1));
        let range = ByteRange::between(start, end).ok_or(ZipError::OutOfBounds {
            start,
            end: start,
            length: object_length,
        })?;
        range.check_within(object_length)?;
        Ok(range)
    }

    /// Moves a cached block to the front of the recency queue.
    /// Blocks we don't have are ignored.
    pub fn touch(&mut self, block: u64) {
        if !self.contains(block) {
            return;
        }
        if let Some(i) = self.recency.iter().position(|&b| b == block) {
            self.recency.remove(i);
        }
        self.recency.push_front(block);
    }

    /// Caches a block as the most recently used one,
    /// then spills the cache if it's over capacity.
    ///
    /// Returns how many blocks were evicted.
    pub fn insert(&mut self, block: u64, bytes: Vec<u8>) -> usize {
        if self.blocks.insert(block, bytes).is_some() {
            self.touch(block);
            return 0;
        }
        self.recency.push_front(block);

        if self.blocks.len() <= self.config.max_blocks {
            return 0;
        }

        let mut evicted = 0;
        for _ in 0..self.config.block_spill_amount {
            match self.recency.pop_back() {
                Some(lru) => {
                    self.blocks.remove(&lru);
                    evicted += 1;
                }
                None => break,
            }
        }
        info!(
            "Spilled {} blocks from cache: {} left ({} bytes)",
            evicted,
            self.blocks.len(),
            self.cached_bytes()
        );
        evicted
    }

    fn cached_bytes(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Cached block indices, most recently used first
    pub fn recency(&self) -> impl Iterator<Item = u64> + '_ {
        self.recency.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_blocks: usize, spill: usize) -> CacheConfig {
        CacheConfig::new(4, max_blocks, spill).unwrap()
    }

    #[test]
    fn bad_configs() {
        assert!(CacheConfig::new(0, 4, 1).is_err());
        assert!(CacheConfig::new(4, 0, 1).is_err());
        assert!(CacheConfig::new(4, 4, 0).is_err());
        assert!(CacheConfig::new(4, 4, 5).is_err());
        assert!(CacheConfig::new(4, 4, 4).is_ok());
    }

    #[test]
    fn block_math() {
        let cache = BlockCache::new(config(4, 1));
        let range = ByteRange::between(3, 9).unwrap();
        assert_eq!(cache.blocks_containing(range), 0..=2);
        let range = ByteRange::between(4, 7).unwrap();
        assert_eq!(cache.blocks_containing(range), 1..=1);

        // The last block is short.
        assert_eq!(
            cache.block_range(2, 10).unwrap(),
            ByteRange::between(8, 9).unwrap()
        );
        assert_eq!(
            cache.block_range(1, 10).unwrap(),
            ByteRange::between(4, 7).unwrap()
        );
        assert!(matches!(
            cache.block_range(3, 10),
            Err(ZipError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn spills_in_batches() {
        let mut cache = BlockCache::new(config(4, 3));
        for block in 0..4 {
            assert_eq!(cache.insert(block, vec![block as u8; 4]), 0);
        }
        assert_eq!(cache.len(), 4);

        // The fifth block pushes us over; the three oldest go.
        assert_eq!(cache.insert(4, vec![4; 4]), 3);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(0));
        assert!(!cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert!(cache.contains(4));
        assert_eq!(cache.recency().collect::<Vec<_>>(), vec![4, 3]);
    }

    #[test]
    fn never_over_capacity_after_insert() {
        for (max_blocks, spill) in [(1, 1), (3, 1), (3, 3), (16, 4)] {
            let mut cache = BlockCache::new(config(max_blocks, spill));
            for block in 0..100u64 {
                let evicted = cache.insert(block % 37, vec![0; 4]);
                assert!(evicted == 0 || evicted == spill);
                assert!(cache.contains(block % 37), "just-inserted block was evicted");
                assert!(cache.len() <= max_blocks);
            }
        }
    }

    #[test]
    fn touching_protects_blocks() {
        let mut cache = BlockCache::new(config(3, 1));
        cache.insert(0, vec![0; 4]);
        cache.insert(1, vec![1; 4]);
        cache.insert(2, vec![2; 4]);
        cache.touch(0);
        // Touching a block we don't have does nothing.
        cache.touch(42);
        assert_eq!(cache.recency().collect::<Vec<_>>(), vec![0, 2, 1]);

        assert_eq!(cache.insert(3, vec![3; 4]), 1);
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert_eq!(cache.get(0), Some(&[0u8; 4][..]));
    }
}
