//! rangezip reads a ZIP archive's structure straight out of an object store,
//! fetching only the bytes it needs:
//!
//! ```no_run
//! # use rangezip::*;
//! # use rangezip::remote::*;
//! let store = LocalStore::new("/srv/buckets");
//! let object = RemoteObject::locate(&store, "backups", "photos.zip")?;
//!
//! // Reads become ranged fetches of whole blocks, which are cached.
//! let mut reader = BlockCachedReader::new(&store, object)?;
//! let archive = ZipArchive::read(&mut reader, &ParseOptions::default())?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name, entry.uncompressed_size);
//! }
//!
//! // Entries can be read out too, though decompressing them is up to you.
//! if let Some(readme) = archive.by_name("README.txt") {
//!     let mut contents = archive.entry_reader(&mut reader, readme)?;
//!     std::io::copy(&mut contents, &mut std::io::stdout())?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Zip puts its table of contents (the central directory) at the back of the
//! archive, with a small record at the very end saying where to find it.
//! Reading one is a handful of small reads at computed offsets, then one long
//! walk through the central directory. The [`BlockCachedReader`] turns those
//! into fetches of fixed-size blocks and keeps the most recently used ones
//! around, so an archive with a huge payload costs a few requests
//! instead of a full download.
//!
//! Readers own their cursor and cache, so they're used by one owner at a time.
//! To work on an archive from several threads, open a reader per thread;
//! the parsed [`ZipArchive`] can be shared freely.
//!
//! Anything implementing [`RandomAccess`] can be parsed,
//! including [`SliceReader`] for bytes already in memory.
//! Likewise, anything implementing [`ObjectStore`](remote::ObjectStore)
//! can back a [`BlockCachedReader`].
//!
//! Logging goes through the [`log`](https://docs.rs/log) facade,
//! and is silent unless your application installs a logger.

mod arch;
pub mod cache;
mod crc_reader;
pub mod entry;
pub mod read;
pub mod reader;
pub mod remote;
pub mod result;
mod spec;

pub use cache::CacheConfig;
pub use entry::EntryReader;
pub use read::{CompressionMethod, EncryptionMethod, FileHeader, ParseOptions, ZipArchive};
pub use reader::{BlockCachedReader, RandomAccess, SliceReader};
pub use remote::{FetchOptions, RemoteObject};
pub use result::{ZipError, ZipResult};
