//! Code specific to the ZIP file format specification.
//!
//! We try to keep the nitty gritty here,
//! and the parse pipeline in the [`read`] module.
//! Records are read through a [`RandomAccess`] cursor, so the same code
//! works against a remote object or a slice of bytes.
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! [`read`]: ../read/index.html
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use codepage_437::*;
use log::*;

use crate::arch::usize;
use crate::reader::RandomAccess;
use crate::result::*;

// Magic numbers denoting various sections of a ZIP archive

/// End of central directory magic number
pub(crate) const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
/// Zip64 end of central directory magic number
pub(crate) const ZIP64_EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 6, 6];
/// Zip64 end of central directory locator magic number
pub(crate) const ZIP64_EOCDR_LOCATOR_MAGIC: [u8; 4] = [b'P', b'K', 6, 7];
/// Central directory magic number
pub(crate) const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
/// Local file header magic number
pub(crate) const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];
/// Central directory digital signature magic number
pub(crate) const DIGITAL_SIGNATURE_MAGIC: [u8; 4] = [b'P', b'K', 5, 5];

/// Size of the End of central directory record, sans comment
pub const EOCDR_SIZE: u64 = 22;
/// Size of the Zip64 end of central directory locator
pub const ZIP64_EOCDR_LOCATOR_SIZE: u64 = 20;
/// The largest comment a ZIP archive can end with
pub const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Extra field header ID for Zip64 extended information
pub const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;
/// Extra field header ID for WinZip AES encryption
pub const AES_EXTRA_FIELD_ID: u16 = 0x9901;

/// Character set for names and comments without the UTF-8 flag
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Charset {
    /// Decode as UTF-8, replacing invalid sequences
    #[default]
    Utf8,
    /// IBM Code Page 437, the original DOS character set
    Cp437,
}

/// Decodes a name or comment.
/// The UTF-8 flag, when set, overrides the given charset.
pub(crate) fn decode_text(bytes: &[u8], utf8_flag: bool, charset: Charset) -> String {
    if utf8_flag || charset == Charset::Utf8 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let decoded: Cow<str> = Cow::borrow_from_cp437(bytes, &CP437_CONTROL);
    decoded.into_owned()
}

// Little-endian readers for the front of a slice.
// Each returns None (leaving the slice alone) if it's too short.

fn take<const N: usize>(input: &mut &[u8]) -> Option<[u8; N]> {
    let bytes: [u8; N] = input.get(..N)?.try_into().ok()?;
    *input = &input[N..];
    Some(bytes)
}

/// Reads a little-endian u64 from the front of the provided slice, shrinking it.
fn read_u64(input: &mut &[u8]) -> Option<u64> {
    take(input).map(u64::from_le_bytes)
}

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
fn read_u32(input: &mut &[u8]) -> Option<u32> {
    take(input).map(u32::from_le_bytes)
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
fn read_u16(input: &mut &[u8]) -> Option<u16> {
    take(input).map(u16::from_le_bytes)
}

fn read_u8(input: &mut &[u8]) -> Option<u8> {
    take::<1>(input).map(|[b]| b)
}

/// Reads `len` bytes from the cursor into a fresh buffer.
///
/// `len` usually comes straight from the archive, so it's checked against
/// what's left of the object before anything is allocated.
pub(crate) fn read_bytes<R: RandomAccess + ?Sized>(reader: &mut R, len: u64) -> ZipResult<Vec<u8>> {
    let start = reader.position();
    let length = reader.length();
    if len > length.saturating_sub(start) {
        return Err(ZipError::OutOfBounds {
            start,
            end: start.saturating_add(len - 1),
            length,
        });
    }
    let mut buf = vec![0u8; usize(len)?];
    reader.read_fully(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_magic<R: RandomAccess + ?Sized>(reader: &mut R) -> ZipResult<[u8; 4]> {
    let mut magic = [0u8; 4];
    reader.read_fully(&mut magic)?;
    Ok(magic)
}

/// The fixed-size part of a record (after its signature) was cut short.
/// Only possible if the reader hands back less than we asked for.
fn truncated(record: &str) -> ZipError {
    ZipError::CorruptHeaders(format!("Truncated {record}"))
}

/// Seeks to `offset`, which the archive told us about.
pub(crate) fn seek_to<R: RandomAccess + ?Sized>(reader: &mut R, offset: u64) -> ZipResult<()> {
    reader.seek(i64::try_from(offset).map_err(|_| ZipError::InvalidOffset(offset))?)
}

/// Data from the End of central directory record
///
/// Found at the back of the ZIP archive and provides offsets for finding
/// its central directory, along with lots of stuff that stopped being relevant
/// when we stopped breaking ZIP archives onto multiple floppies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Where the record starts in the archive
    pub offset: u64,
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    /// `None` if there isn't one, or if it couldn't be read
    pub comment: Option<String>,
}

impl EndOfCentralDirectory {
    /// Reads the record starting at `offset`,
    /// whose signature [`find_eocdr`] already checked.
    pub fn parse<R: RandomAccess + ?Sized>(
        reader: &mut R,
        offset: u64,
        charset: Charset,
    ) -> ZipResult<Self> {
        // 4.3.16  End of central directory record:
        //
        // end of central dir signature    4 bytes  (0x06054b50)
        // number of this disk             2 bytes
        // number of the disk with the
        // start of the central directory  2 bytes
        // total number of entries in
        // the central dir on this disk    2 bytes
        // total number of entries in
        // the central dir                 2 bytes
        // size of the central directory   4 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        4 bytes
        // zipfile comment length          2 bytes
        // .ZIP file comment       (variable size)
        seek_to(reader, offset + 4)?;
        let fixed = read_bytes(reader, EOCDR_SIZE - 4)?;
        let mut eocdr = fixed.as_slice();
        let mut parse = || -> Option<(Self, u16)> {
            let record = Self {
                offset,
                disk_number: read_u16(&mut eocdr)?,
                disk_with_central_directory: read_u16(&mut eocdr)?,
                entries_on_this_disk: read_u16(&mut eocdr)?,
                entries: read_u16(&mut eocdr)?,
                central_directory_size: read_u32(&mut eocdr)?,
                central_directory_offset: read_u32(&mut eocdr)?,
                comment: None,
            };
            Some((record, read_u16(&mut eocdr)?))
        };
        let (mut record, comment_length) =
            parse().ok_or_else(|| truncated("End Of Central Directory Record"))?;

        // A broken comment doesn't make a broken archive.
        if comment_length > 0 {
            match read_bytes(reader, comment_length.into()) {
                Ok(bytes) => record.comment = Some(decode_text(&bytes, false, charset)),
                Err(e) => debug!("Couldn't read {} byte archive comment: {}", comment_length, e),
            }
        }
        Ok(record)
    }
}

/// Finds the End of central directory record, searching backwards
/// (one byte at a time) from where it would be if the archive had no comment.
///
/// Gives up after `max_scan` bytes.
pub fn find_eocdr<R: RandomAccess + ?Sized>(reader: &mut R, max_scan: u64) -> ZipResult<u64> {
    let length = reader.length();
    if length < EOCDR_SIZE {
        return Err(ZipError::NotAZipFile(format!(
            "{length} bytes is smaller than an End Of Central Directory Record"
        )));
    }

    let mut position = length - EOCDR_SIZE;
    seek_to(reader, position)?;
    if read_magic(reader)? == EOCDR_MAGIC {
        return Ok(position);
    }

    // It's not right at the end, so there's a comment after it
    // (or this isn't a ZIP file at all).
    let mut remaining = length.min(max_scan);
    while remaining > 0 && position > 0 {
        position -= 1;
        seek_to(reader, position)?;
        if read_magic(reader)? == EOCDR_MAGIC {
            trace!("Found End Of Central Directory Record at {}", position);
            return Ok(position);
        }
        remaining -= 1;
    }

    Err(ZipError::NotAZipFile(String::from(
        "Couldn't find End Of Central Directory Record",
    )))
}

/// Data from the Zip64 end of central directory locator
///
/// This should immediately precede the End of central directory record
/// on Zip64 files and tell us where to find the Zip64 end of central directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_zip64_eocdr: u32,
    pub zip64_eocdr_offset: u64,
    pub disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    /// Looks for the locator right before the End of central directory record
    /// at `eocdr_offset`. Returns `None` if it isn't there,
    /// i.e., this isn't a Zip64 archive.
    pub fn parse<R: RandomAccess + ?Sized>(
        reader: &mut R,
        eocdr_offset: u64,
    ) -> ZipResult<Option<Self>> {
        // 4.3.15 Zip64 end of central directory locator
        //
        // zip64 end of central dir locator
        // signature                       4 bytes  (0x07064b50)
        // number of the disk with the
        // start of the zip64 end of
        // central directory               4 bytes
        // relative offset of the zip64
        // end of central directory record 8 bytes
        // total number of disks           4 bytes
        //
        // Seeks clamp at zero, so an archive too small to have a locator
        // just checks its first bytes (which won't match).
        let locator_offset = eocdr_offset as i64 - ZIP64_EOCDR_LOCATOR_SIZE as i64;
        reader.seek(locator_offset)?;
        if read_magic(reader)? != ZIP64_EOCDR_LOCATOR_MAGIC {
            return Ok(None);
        }

        let fixed = read_bytes(reader, ZIP64_EOCDR_LOCATOR_SIZE - 4)?;
        let mut locator = fixed.as_slice();
        let mut parse = || {
            Some(Self {
                disk_with_zip64_eocdr: read_u32(&mut locator)?,
                zip64_eocdr_offset: read_u64(&mut locator)?,
                disks: read_u32(&mut locator)?,
            })
        };
        parse()
            .map(Some)
            .ok_or_else(|| truncated("Zip64 End Of Central Directory Locator"))
    }
}

/// Data from the Zip64 end of central directory record
///
/// Pointed to by the Zip64 end of central directory locator,
/// and supplies 64-bit versions of the End of central directory record's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    /// Size of the record, not counting its signature and this field
    pub record_size: u64,
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub entries_on_this_disk: u64,
    pub entries: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub extensible_data: Vec<u8>,
}

impl Zip64EndOfCentralDirectory {
    /// Bytes of fixed fields counted by `record_size`
    const FIXED_FIELDS_SIZE: u64 = 44;

    pub fn parse<R: RandomAccess + ?Sized>(
        reader: &mut R,
        locator: &Zip64EndOfCentralDirectoryLocator,
    ) -> ZipResult<Self> {
        // 4.3.14  Zip64 end of central directory record
        //
        // zip64 end of central dir
        // signature                       4 bytes  (0x06064b50)
        // size of zip64 end of central
        // directory record                8 bytes
        // version made by                 2 bytes
        // version needed to extract       2 bytes
        // number of this disk             4 bytes
        // number of the disk with the
        // start of the central directory  4 bytes
        // total number of entries in the
        // central directory on this disk  8 bytes
        // total number of entries in the
        // central directory               8 bytes
        // size of the central directory   8 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        8 bytes
        // zip64 extensible data sector    (variable size)
        let offset = locator.zip64_eocdr_offset;
        if i64::try_from(offset).is_err() || offset.saturating_add(4) > reader.length() {
            return Err(ZipError::InvalidOffset(offset));
        }
        seek_to(reader, offset)?;
        if read_magic(reader)? != ZIP64_EOCDR_MAGIC {
            return Err(ZipError::CorruptHeaders(format!(
                "Invalid signature for Zip64 End Of Central Directory Record at offset {offset}"
            )));
        }

        let fixed = read_bytes(reader, 8 + Self::FIXED_FIELDS_SIZE)?;
        let mut eocdr = fixed.as_slice();
        let mut parse = || {
            Some(Self {
                record_size: read_u64(&mut eocdr)?,
                source_version: read_u16(&mut eocdr)?,
                minimum_extract_version: read_u16(&mut eocdr)?,
                disk_number: read_u32(&mut eocdr)?,
                disk_with_central_directory: read_u32(&mut eocdr)?,
                entries_on_this_disk: read_u64(&mut eocdr)?,
                entries: read_u64(&mut eocdr)?,
                central_directory_size: read_u64(&mut eocdr)?,
                central_directory_offset: read_u64(&mut eocdr)?,
                extensible_data: Vec::new(),
            })
        };
        let mut record =
            parse().ok_or_else(|| truncated("Zip64 End Of Central Directory Record"))?;

        // 4.3.14.1 The value stored into the "size of zip64 end of central
        // directory record" SHOULD be the size of the remaining
        // record and SHOULD NOT include the leading 12 bytes.
        let extensible_data_length = record.record_size.saturating_sub(Self::FIXED_FIELDS_SIZE);
        if extensible_data_length > 0 {
            record.extensible_data = read_bytes(reader, extensible_data_length)?;
        }
        Ok(record)
    }
}

/// The fixed-size fields of a central directory entry,
/// plus the lengths of the variable-size ones that follow.
#[derive(Debug)]
pub(crate) struct CentralDirectoryEntry {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub path_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
}

impl CentralDirectoryEntry {
    /// Reads the fixed-size fields following the entry's signature.
    pub fn parse<R: RandomAccess + ?Sized>(reader: &mut R) -> ZipResult<Self> {
        // 4.3.12  Central directory structure:
        //
        //   central file header signature   4 bytes  (0x02014b50)
        //   version made by                 2 bytes
        //   version needed to extract       2 bytes
        //   general purpose bit flag        2 bytes
        //   compression method              2 bytes
        //   last mod file time              2 bytes
        //   last mod file date              2 bytes
        //   crc-32                          4 bytes
        //   compressed size                 4 bytes
        //   uncompressed size               4 bytes
        //   file name length                2 bytes
        //   extra field length              2 bytes
        //   file comment length             2 bytes
        //   disk number start               2 bytes
        //   internal file attributes        2 bytes
        //   external file attributes        4 bytes
        //   relative offset of local header 4 bytes
        //
        //   file name (variable size)
        //   extra field (variable size)
        //   file comment (variable size)
        let fixed = read_bytes(reader, 42)?;
        let mut entry = fixed.as_slice();
        let mut parse = || {
            Some(Self {
                source_version: read_u16(&mut entry)?,
                minimum_extract_version: read_u16(&mut entry)?,
                flags: read_u16(&mut entry)?,
                compression_method: read_u16(&mut entry)?,
                last_modified_time: read_u16(&mut entry)?,
                last_modified_date: read_u16(&mut entry)?,
                crc32: read_u32(&mut entry)?,
                compressed_size: read_u32(&mut entry)?,
                uncompressed_size: read_u32(&mut entry)?,
                path_length: read_u16(&mut entry)?,
                extra_field_length: read_u16(&mut entry)?,
                file_comment_length: read_u16(&mut entry)?,
                disk_number: read_u16(&mut entry)?,
                internal_file_attributes: read_u16(&mut entry)?,
                external_file_attributes: read_u32(&mut entry)?,
                header_offset: read_u32(&mut entry)?,
            })
        };
        parse().ok_or_else(|| truncated("central directory entry"))
    }
}

/// Data from a local file header
///
/// Each files' actual contents is preceded by this header.
/// We only read it to find where the contents start
/// (and to sanity-check it against the central directory).
#[derive(Debug)]
pub(crate) struct LocalFileHeader {
    pub flags: u16,
    pub compression_method: u16,
    pub crc32: u32,
    pub path: Vec<u8>,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Size of the fixed-length fields, signature included
    pub const FIXED_SIZE: u64 = 30;

    /// Reads the header at `offset`, leaving the cursor
    /// at the start of its extra field.
    pub fn parse<R: RandomAccess + ?Sized>(reader: &mut R, offset: u64) -> ZipResult<Self> {
        // 4.3.7  Local file header:
        //
        // local file header signature     4 bytes  (0x04034b50)
        // version needed to extract       2 bytes
        // general purpose bit flag        2 bytes
        // compression method              2 bytes
        // last mod file time              2 bytes
        // last mod file date              2 bytes
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        // file name length                2 bytes
        // extra field length              2 bytes
        //
        // file name (variable size)
        // extra field (variable size)
        seek_to(reader, offset)?;
        if read_magic(reader)? != LOCAL_FILE_HEADER_MAGIC {
            return Err(ZipError::CorruptHeaders(format!(
                "No local file header at offset {offset}"
            )));
        }
        let fixed = read_bytes(reader, Self::FIXED_SIZE - 4)?;
        let mut header = fixed.as_slice();
        // We only care about what we can check against the central directory
        // and what tells us where the file's data starts.
        let mut parse = || {
            let _minimum_extract_version = read_u16(&mut header)?;
            let flags = read_u16(&mut header)?;
            let compression_method = read_u16(&mut header)?;
            let _last_modified = read_u32(&mut header)?;
            let crc32 = read_u32(&mut header)?;
            let _sizes = read_u64(&mut header)?;
            Some((
                Self {
                    flags,
                    compression_method,
                    crc32,
                    path: Vec::new(),
                    extra_field_length: 0,
                },
                read_u16(&mut header)?,
                read_u16(&mut header)?,
            ))
        };
        let (mut local, path_length, extra_field_length) =
            parse().ok_or_else(|| truncated("local file header"))?;
        local.path = read_bytes(reader, path_length.into())?;
        local.extra_field_length = extra_field_length;
        Ok(local)
    }
}

/// Extracts the "is this text UTF-8?" bit from the 16-bit flags field.
///
/// If false, text is decoded with the configured [`Charset`].
pub(crate) fn is_utf8(flags: u16) -> bool {
    // Bit 11: Language encoding flag (EFS).  If this bit is set,
    //         the filename and comment fields for this file
    //         MUST be encoded using UTF-8. (see APPENDIX D)
    flags & (1 << 11) != 0
}

/// Extracts the "is this file encrypted?" bit from the 16-bit flags field.
pub(crate) fn is_encrypted(flags: u16) -> bool {
    // Bit 0: If set, indicates that the file is encrypted
    flags & 1 != 0
}

/// Extracts the "sizes and CRC follow the data" bit from the 16-bit flags field.
pub(crate) fn has_data_descriptor(flags: u16) -> bool {
    // Bit 3: If this bit is set, the fields crc-32, compressed
    //        size and uncompressed size are set to zero in the
    //        local header.  The correct values are put in the
    //        data descriptor immediately following the compressed
    //        data.
    flags & (1 << 3) != 0
}

/// Is this entry a directory, going by its external attributes or name?
pub(crate) fn is_directory(external_file_attributes: u32, name: &str) -> bool {
    // The low byte holds MS-DOS attributes, where 0x10 is "directory".
    // The high two bytes hold Unix mode bits when made on Unix,
    // where S_IFDIR (0o040000) lands on bit 6 of the top byte.
    const DOS_DIRECTORY: u32 = 0x10;
    const UNIX_DIRECTORY: u32 = 0x4000 << 16;
    external_file_attributes & DOS_DIRECTORY != 0
        || external_file_attributes & UNIX_DIRECTORY != 0
        || name.ends_with('/')
        || name.ends_with('\\')
}

pub(crate) fn parse_msdos(time: u16, date: u16) -> Option<NaiveDateTime> {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; Always interpreted as a positive value
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)?.and_hms_opt(hours, minutes, seconds)
}

/// One `{id, length, data}` record from an extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDataRecord {
    pub header_id: u16,
    pub data: Vec<u8>,
}

/// Splits an extra field into its records.
///
/// A malformed field isn't worth failing the archive over:
/// we stop at the first record that doesn't fit and keep the ones before it.
pub(crate) fn parse_extra_field(mut extra_field: &[u8]) -> Vec<ExtraDataRecord> {
    // 4.5.1 In order to allow different programs and different types
    // of information to be stored in the 'extra' field in .ZIP
    // files, the following structure MUST be used for all
    // programs storing data in this field:
    //
    //     header1+data1 + header2+data2 . . .
    //
    // Each header MUST consist of:
    //
    //     Header ID - 2 bytes
    //     Data Size - 2 bytes
    let mut records = Vec::new();
    while !extra_field.is_empty() {
        let mut next = || {
            let header_id = read_u16(&mut extra_field)?;
            let size = read_u16(&mut extra_field)? as usize;
            let data = extra_field.get(..size)?.to_vec();
            extra_field = &extra_field[size..];
            Some(ExtraDataRecord { header_id, data })
        };
        match next() {
            Some(record) => records.push(record),
            None => {
                debug!(
                    "Malformed extra field after {} records; ignoring the rest",
                    records.len()
                );
                break;
            }
        }
    }
    records
}

/// 64-bit values from a Zip64 extended information extra field.
///
/// Each is only present if the entry's 32-bit (or 16-bit) field
/// holds the all-ones placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInfo {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub header_offset: Option<u64>,
    pub disk_number: Option<u32>,
}

impl Zip64ExtendedInfo {
    pub(crate) fn parse(record: &ExtraDataRecord, cde: &CentralDirectoryEntry) -> Self {
        // 4.5.3 -Zip64 Extended Information Extra Field (0x0001):
        //
        // Value      Size       Description
        // -----      ----       -----------
        // Original
        // Size       8 bytes    Original uncompressed file size
        // Compressed
        // Size       8 bytes    Size of compressed data
        // Relative Header
        // Offset     8 bytes    Offset of local header record
        // Disk Start
        // Number     4 bytes    Number of the disk on which
        //                       this file starts
        //
        // The order of the fields in the zip64 extended
        // information record is fixed, but the fields MUST
        // only appear if the corresponding Local or Central
        // directory record field is set to 0xFFFF or 0xFFFFFFFF.
        let mut data = record.data.as_slice();
        let mut info = Self::default();
        if cde.uncompressed_size == u32::MAX {
            info.uncompressed_size = read_u64(&mut data);
        }
        if cde.compressed_size == u32::MAX {
            info.compressed_size = read_u64(&mut data);
        }
        if cde.header_offset == u32::MAX {
            info.header_offset = read_u64(&mut data);
        }
        if cde.disk_number == u16::MAX {
            info.disk_number = read_u32(&mut data);
        }
        info
    }
}

/// The strength of a WinZip AES key
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AesKeyStrength {
    Aes128,
    Aes192,
    Aes256,
    Unknown(u8),
}

/// Data from a WinZip AES extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesExtraDataRecord {
    /// 1 for AE-1, 2 for AE-2
    pub version: u16,
    /// Always `AE`
    pub vendor_id: [u8; 2],
    pub key_strength: AesKeyStrength,
    /// The compression method actually used
    /// (the entry's own says 99, "AES encrypted")
    pub compression_method: u16,
}

impl AesExtraDataRecord {
    /// Returns `None` if the record is too short.
    pub(crate) fn parse(record: &ExtraDataRecord) -> Option<Self> {
        // Offset  Size  Content
        // 0       2     Vendor version
        // 2       2     Vendor ID ("AE")
        // 4       1     Encryption strength
        // 5       2     Actual compression method
        let mut data = record.data.as_slice();
        let version = read_u16(&mut data)?;
        let vendor_id = take::<2>(&mut data)?;
        let key_strength = match read_u8(&mut data)? {
            1 => AesKeyStrength::Aes128,
            2 => AesKeyStrength::Aes192,
            3 => AesKeyStrength::Aes256,
            other => AesKeyStrength::Unknown(other),
        };
        let compression_method = read_u16(&mut data)?;
        Some(Self {
            version,
            vendor_id,
            key_strength,
            compression_method,
        })
    }
}

/// The digital signature block that can follow the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalSignature {
    pub data: Vec<u8>,
}

impl DigitalSignature {
    /// Checks for a signature block at the cursor.
    ///
    /// Anything else (including running off the end of the archive)
    /// means there isn't one.
    pub fn parse<R: RandomAccess + ?Sized>(reader: &mut R) -> ZipResult<Option<Self>> {
        // 4.3.13 Digital signature:
        //
        //   header signature                4 bytes  (0x05054b50)
        //   size of data                    2 bytes
        //   signature data (variable size)
        match read_magic(reader) {
            Ok(magic) if magic == DIGITAL_SIGNATURE_MAGIC => {}
            Ok(_) => return Ok(None),
            Err(ZipError::OutOfBounds { .. }) => return Ok(None),
            Err(e) => return Err(e),
        }
        let size = read_bytes(reader, 2)?;
        let size = read_u16(&mut size.as_slice()).ok_or_else(|| truncated("digital signature"))?;
        let data = read_bytes(reader, size.into())?;
        Ok(Some(Self { data }))
    }
}
