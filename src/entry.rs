//! Streaming an entry's contents out of the archive.
//!
//! Once the central directory tells us where a file's local header is,
//! reading the file is mostly sequential: check the header, skip past its
//! name and extra field, then read `compressed_size` bytes.
//! We hand those bytes back as they're stored; decompressing or decrypting
//! them is up to the caller.

use std::io::{self, Read};

use log::*;

use crate::crc_reader::Crc32Reader;
use crate::read::{CompressionMethod, FileHeader};
use crate::reader::RandomAccess;
use crate::result::*;
use crate::spec::{self, LocalFileHeader};

/// The raw bytes of one entry, read through a [`RandomAccess`]
struct RawPayload<'r, R: RandomAccess + ?Sized> {
    reader: &'r mut R,
    remaining: u64,
}

impl<R: RandomAccess + ?Sized> io::Read for RawPayload<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let count = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        self.reader.read_fully(&mut buf[..count])?;
        self.remaining -= count as u64;
        Ok(count)
    }
}

enum Payload<'r, R: RandomAccess + ?Sized> {
    Raw(RawPayload<'r, R>),
    Checked(Crc32Reader<RawPayload<'r, R>>),
}

/// Reads one entry's stored bytes, as an [`io::Read`].
///
/// Made by [`ZipArchive::entry_reader()`](crate::ZipArchive::entry_reader).
pub struct EntryReader<'r, R: RandomAccess + ?Sized> {
    payload: Payload<'r, R>,
}

impl<'r, R: RandomAccess + ?Sized> EntryReader<'r, R> {
    pub(crate) fn new(reader: &'r mut R, header: &FileHeader) -> ZipResult<Self> {
        if header.disk_number_start != 0 {
            return Err(ZipError::UnsupportedArchive(format!(
                "{} starts on disk {}; split archives can't be read",
                header.name, header.disk_number_start
            )));
        }

        let local = LocalFileHeader::parse(reader, header.header_offset)?;
        trace!("{:?}", local);
        if cfg!(feature = "check-local-metadata") {
            check_local_header(&local, header)?;
        }

        let data_start = header.header_offset
            + LocalFileHeader::FIXED_SIZE
            + local.path.len() as u64
            + u64::from(local.extra_field_length);
        let data_end = data_start.saturating_add(header.compressed_size);
        if data_end > reader.length() {
            return Err(ZipError::OutOfBounds {
                start: data_start,
                end: data_end.saturating_sub(1),
                length: reader.length(),
            });
        }
        if header.compressed_size > 0 {
            spec::seek_to(reader, data_start)?;
        }
        debug!(
            "Reading {} ({} bytes at offset {})",
            header.name, header.compressed_size, data_start
        );

        let raw = RawPayload {
            reader,
            remaining: header.compressed_size,
        };
        // Anything compressed or encrypted would need decoding
        // before there's something to checksum.
        let payload =
            if header.compression_method == CompressionMethod::None && !header.encrypted {
                Payload::Checked(Crc32Reader::new(raw, header.crc32, &header.name))
            } else {
                Payload::Raw(raw)
            };
        Ok(Self { payload })
    }

    /// How many bytes are left to read
    pub fn remaining(&self) -> u64 {
        match &self.payload {
            Payload::Raw(raw) => raw.remaining,
            Payload::Checked(checked) => checked.get_ref().remaining,
        }
    }

    /// Is the CRC being checked as we read?
    pub fn is_checked(&self) -> bool {
        matches!(self.payload, Payload::Checked(_))
    }
}

impl<R: RandomAccess + ?Sized> io::Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.payload {
            Payload::Raw(raw) => raw.read(buf),
            Payload::Checked(checked) => checked.read(buf),
        }
    }
}

/// Makes sure the local header agrees with the central directory.
fn check_local_header(local: &LocalFileHeader, header: &FileHeader) -> ZipResult<()> {
    let mismatch = |what: &str| {
        Err(ZipError::CorruptHeaders(format!(
            "Local file header of {} doesn't match its central directory entry ({})",
            header.name, what
        )))
    };

    if CompressionMethod::from(local.compression_method) != header.compression_method {
        return mismatch("compression method");
    }
    // We can only compare names byte-for-byte if we know they're UTF-8.
    if header.utf8 && local.path != header.name.as_bytes() {
        return mismatch("name");
    }
    // With a data descriptor, the local CRC is zero; the real one follows the data.
    if !spec::has_data_descriptor(local.flags) && local.crc32 != header.crc32 {
        return mismatch("CRC-32");
    }
    Ok(())
}
