//! Tools for reading a ZIP archive's metadata.
//!
//! To start reading an archive, open a [`RandomAccess`] reader over it
//! (usually a [`BlockCachedReader`]) and hand it to [`ZipArchive::read()`].
//!
//! Only the archive's structure is read: its End of central directory record,
//! Zip64 records if it has them, and every central directory entry.
//! Entry contents stay where they are until you ask for them with
//! [`ZipArchive::entry_reader()`].
//!
//! [`BlockCachedReader`]: crate::reader::BlockCachedReader

use camino::Utf8Path;
use chrono::NaiveDateTime;
use log::*;

use crate::entry::EntryReader;
use crate::reader::RandomAccess;
use crate::result::*;
use crate::spec::{self, *};

pub use crate::spec::{
    AesExtraDataRecord, AesKeyStrength, Charset, DigitalSignature, EndOfCentralDirectory,
    ExtraDataRecord, Zip64EndOfCentralDirectory, Zip64EndOfCentralDirectoryLocator,
    Zip64ExtendedInfo,
};

/// The compression method used to store a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed
    None,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    /// This is the most common format used by ZIP archives.
    Deflate,
    /// The file is WinZip AES encrypted; the actual compression method
    /// is in its [`AesExtraDataRecord`].
    AesEncrypted,
    /// Some other format. (The u16 indicates the internal format code.)
    Other(u16),
}

impl From<u16> for CompressionMethod {
    fn from(code: u16) -> Self {
        match code {
            0 => CompressionMethod::None,
            8 => CompressionMethod::Deflate,
            99 => CompressionMethod::AesEncrypted,
            other => CompressionMethod::Other(other),
        }
    }
}

/// How an entry is encrypted, if at all
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncryptionMethod {
    None,
    /// Traditional PKWARE encryption
    ZipStandard,
    /// WinZip AES
    Aes,
}

/// Knobs for [`ZipArchive::read()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// How to decode names and comments that aren't flagged as UTF-8
    pub charset: Charset,
    /// How far back from the end of the archive to look for the
    /// End of central directory record (i.e., the longest comment we'll find)
    pub max_comment_scan: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            charset: Charset::default(),
            max_comment_scan: MAX_COMMENT_SIZE,
        }
    }
}

/// Metadata for a file or directory in the archive,
/// retrieved from its central directory entry
///
/// Sizes and offsets are the 64-bit ones; if the entry stored Zip64
/// placeholders in its 32-bit fields, they've been replaced with the real
/// values from its Zip64 extended information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// The provided name of the file, decoded
    pub name: String,

    pub source_version: u16,
    pub minimum_extract_version: u16,

    /// The raw general purpose bit flags
    pub flags: u16,
    pub encrypted: bool,
    /// Sizes and CRC come after the file's data instead of in its local header.
    pub data_descriptor: bool,
    /// The name and comment were flagged as UTF-8.
    pub utf8: bool,

    pub compression_method: CompressionMethod,
    pub encryption_method: EncryptionMethod,

    /// Last modified time, in MS-DOS format
    pub last_modified_time: u16,
    /// Last modified date, in MS-DOS format
    pub last_modified_date: u16,

    /// The CRC-32 of the decompressed file
    pub crc32: u32,
    /// Compressed size of the file in bytes
    pub compressed_size: u64,
    /// Uncompressed size of the file in bytes
    pub uncompressed_size: u64,

    /// The disk this file starts on
    pub disk_number_start: u32,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    /// The offset to the local file header in the archive
    pub header_offset: u64,

    pub is_directory: bool,
    pub comment: Option<String>,

    /// Every record from the extra field, including the ones parsed below
    pub extra_data_records: Vec<ExtraDataRecord>,
    pub zip64_extended_info: Option<Zip64ExtendedInfo>,
    pub aes_extra_data_record: Option<AesExtraDataRecord>,
}

impl FileHeader {
    pub fn path(&self) -> &Utf8Path {
        Utf8Path::new(&self.name)
    }

    /// The date and time the file was last modified,
    /// or `None` if the stored one is nonsense
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        parse_msdos(self.last_modified_time, self.last_modified_date)
    }

    /// Returns true if the given entry is a file
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Unix mode bits, if the file was archived on a Unix OS.
    pub fn unix_mode(&self) -> Option<u16> {
        // 4.4.2.2 The current mappings are:
        //   0 - MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems)
        //   3 - UNIX
        //   ...
        let made_on_unix = self.source_version >> 8 == 3;
        made_on_unix.then(|| (self.external_file_attributes >> 16) as u16)
    }

    /// `index` is the entry's 1-based position in the central directory,
    /// for error messages.
    fn from_cde(
        cde: &CentralDirectoryEntry,
        index: u64,
        name: String,
        extra_data_records: Vec<ExtraDataRecord>,
        comment: Option<String>,
    ) -> ZipResult<Self> {
        let zip64_extended_info = extra_data_records
            .iter()
            .find(|r| r.header_id == ZIP64_EXTRA_FIELD_ID)
            .map(|r| Zip64ExtendedInfo::parse(r, cde));
        let aes_extra_data_record = extra_data_records
            .iter()
            .find(|r| r.header_id == AES_EXTRA_FIELD_ID)
            .and_then(AesExtraDataRecord::parse);

        let info = zip64_extended_info.clone().unwrap_or_default();
        let compressed_size = resolve_placeholder(
            index,
            "compressed size",
            cde.compressed_size,
            info.compressed_size,
        )?;
        let uncompressed_size = resolve_placeholder(
            index,
            "uncompressed size",
            cde.uncompressed_size,
            info.uncompressed_size,
        )?;
        let header_offset = resolve_placeholder(
            index,
            "local header offset",
            cde.header_offset,
            info.header_offset,
        )?;
        let disk_number_start = info.disk_number.unwrap_or(cde.disk_number.into());

        let encrypted = is_encrypted(cde.flags);
        let encryption_method = match (encrypted, &aes_extra_data_record) {
            (true, Some(_)) => EncryptionMethod::Aes,
            (true, None) => EncryptionMethod::ZipStandard,
            (false, _) => EncryptionMethod::None,
        };

        Ok(Self {
            is_directory: is_directory(cde.external_file_attributes, &name),
            name,
            source_version: cde.source_version,
            minimum_extract_version: cde.minimum_extract_version,
            flags: cde.flags,
            encrypted,
            data_descriptor: has_data_descriptor(cde.flags),
            utf8: is_utf8(cde.flags),
            compression_method: cde.compression_method.into(),
            encryption_method,
            last_modified_time: cde.last_modified_time,
            last_modified_date: cde.last_modified_date,
            crc32: cde.crc32,
            compressed_size,
            uncompressed_size,
            disk_number_start,
            internal_file_attributes: cde.internal_file_attributes,
            external_file_attributes: cde.external_file_attributes,
            header_offset,
            comment,
            extra_data_records,
            zip64_extended_info,
            aes_extra_data_record,
        })
    }
}

/// Swaps a Zip64 placeholder for the real value.
///
/// A placeholder with no Zip64 value to replace it is an error;
/// we never hand out 0xFFFFFFFF as a size or offset.
fn resolve_placeholder(
    index: u64,
    field: &str,
    value: u32,
    zip64_value: Option<u64>,
) -> ZipResult<u64> {
    if value != u32::MAX {
        return Ok(value.into());
    }
    zip64_value.ok_or_else(|| {
        ZipError::CorruptHeaders(format!(
            "Central directory entry #{} has a Zip64 placeholder {} but no Zip64 value for it",
            index, field
        ))
    })
}

/// A ZIP archive's structure, read from its end and central directory
#[derive(Debug, Clone)]
pub struct ZipArchive {
    end_of_central_directory: EndOfCentralDirectory,
    zip64_locator: Option<Zip64EndOfCentralDirectoryLocator>,
    zip64_end_of_central_directory: Option<Zip64EndOfCentralDirectory>,
    /// Entries from the central directory, in the order they appear there
    entries: Vec<FileHeader>,
    digital_signature: Option<DigitalSignature>,
}

impl ZipArchive {
    /// Reads an archive's metadata through the given reader.
    ///
    /// ```no_run
    /// # use rangezip::*;
    /// # use rangezip::remote::*;
    /// let store = LocalStore::new("/srv/buckets");
    /// let object = RemoteObject::locate(&store, "backups", "photos.zip")?;
    /// let mut reader = BlockCachedReader::new(&store, object)?;
    /// let archive = ZipArchive::read(&mut reader, &ParseOptions::default())?;
    /// for entry in archive.entries() {
    ///     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read<R: RandomAccess + ?Sized>(
        reader: &mut R,
        options: &ParseOptions,
    ) -> ZipResult<Self> {
        let eocdr_offset = spec::find_eocdr(reader, options.max_comment_scan)?;
        let end_of_central_directory =
            EndOfCentralDirectory::parse(reader, eocdr_offset, options.charset)?;
        trace!("{:?}", end_of_central_directory);

        let mut archive = Self {
            end_of_central_directory,
            zip64_locator: None,
            zip64_end_of_central_directory: None,
            entries: Vec::new(),
            digital_signature: None,
        };

        if archive.end_of_central_directory.entries == 0 {
            debug!("Archive is empty");
            return Ok(archive);
        }

        archive.zip64_locator = Zip64EndOfCentralDirectoryLocator::parse(reader, eocdr_offset)?;
        if let Some(locator) = &archive.zip64_locator {
            trace!("{:?}", locator);
            let zip64_eocdr = Zip64EndOfCentralDirectory::parse(reader, locator)?;
            trace!("{:?}", zip64_eocdr);
            archive.zip64_end_of_central_directory = Some(zip64_eocdr);
        }

        let central_directory_offset = archive.central_directory_offset();
        let entry_count = archive.entry_count();
        trace!(
            "{} entries at offset {}",
            entry_count,
            central_directory_offset
        );
        if central_directory_offset >= reader.length() {
            return Err(ZipError::CorruptHeaders(format!(
                "Central directory offset {} is past the end of the archive",
                central_directory_offset
            )));
        }
        spec::seek_to(reader, central_directory_offset)?;

        // Don't trust the count with a huge allocation up front.
        let mut entries = Vec::with_capacity(crate::arch::usize(entry_count.min(1024))?);
        for index in 1..=entry_count {
            let entry = read_entry(reader, index, options.charset)?;
            debug!("{:?}", entry);
            entries.push(entry);
        }
        archive.entries = entries;

        archive.digital_signature = DigitalSignature::parse(reader)?;
        if let Some(signature) = &archive.digital_signature {
            trace!("{} byte digital signature", signature.data.len());
        }
        Ok(archive)
    }

    /// Returns the entries found in the ZIP archive's central directory,
    /// in the order they appear there.
    ///
    /// No effort is made to deduplicate or otherwise validate these entries.
    pub fn entries(&self) -> &[FileHeader] {
        &self.entries
    }

    /// Returns the first entry with the given path, if any.
    pub fn by_name<P: AsRef<Utf8Path>>(&self, path: P) -> Option<&FileHeader> {
        let path = path.as_ref();
        self.entries.iter().find(|e| e.path() == path)
    }

    pub fn end_of_central_directory(&self) -> &EndOfCentralDirectory {
        &self.end_of_central_directory
    }

    pub fn zip64_locator(&self) -> Option<&Zip64EndOfCentralDirectoryLocator> {
        self.zip64_locator.as_ref()
    }

    pub fn zip64_end_of_central_directory(&self) -> Option<&Zip64EndOfCentralDirectory> {
        self.zip64_end_of_central_directory.as_ref()
    }

    pub fn digital_signature(&self) -> Option<&DigitalSignature> {
        self.digital_signature.as_ref()
    }

    /// The archive comment, if it had one we could read
    pub fn comment(&self) -> Option<&str> {
        self.end_of_central_directory.comment.as_deref()
    }

    pub fn is_zip64(&self) -> bool {
        self.zip64_locator.is_some()
    }

    /// Was this archive split across several files ("disks")?
    pub fn is_split_archive(&self) -> bool {
        self.end_of_central_directory.disk_number > 0
            || self
                .zip64_end_of_central_directory
                .as_ref()
                .map_or(false, |z| z.disk_number > 0)
    }

    /// Where the central directory starts,
    /// preferring the Zip64 record's value when there is one
    pub fn central_directory_offset(&self) -> u64 {
        match &self.zip64_end_of_central_directory {
            Some(zip64) => zip64.central_directory_offset,
            None => self.end_of_central_directory.central_directory_offset.into(),
        }
    }

    /// How many entries the central directory holds,
    /// preferring the Zip64 record's count when there is one
    pub fn entry_count(&self) -> u64 {
        match &self.zip64_end_of_central_directory {
            Some(zip64) => zip64.entries,
            None => self.end_of_central_directory.entries.into(),
        }
    }

    /// Reads the raw (still compressed, possibly encrypted) contents
    /// of the given entry.
    ///
    /// Stored, unencrypted entries have their CRC checked as they're read.
    /// Each reader needs its own [`RandomAccess`]; to read entries in parallel,
    /// open one reader per thread.
    pub fn entry_reader<'r, R: RandomAccess + ?Sized>(
        &self,
        reader: &'r mut R,
        header: &FileHeader,
    ) -> ZipResult<EntryReader<'r, R>> {
        EntryReader::new(reader, header)
    }
}

/// Reads the central directory entry at the cursor.
/// `index` is 1-based, for error messages.
fn read_entry<R: RandomAccess + ?Sized>(
    reader: &mut R,
    index: u64,
    charset: Charset,
) -> ZipResult<FileHeader> {
    let entry_offset = reader.position();
    if read_magic(reader)? != CENTRAL_DIRECTORY_MAGIC {
        return Err(ZipError::CorruptHeaders(format!(
            "Expected central directory entry #{} at offset {}",
            index, entry_offset
        )));
    }
    let cde = CentralDirectoryEntry::parse(reader)?;
    trace!("{:?}", cde);

    if cde.path_length == 0 {
        return Err(ZipError::CorruptHeaders(format!(
            "Invalid entry name in central directory entry #{}",
            index
        )));
    }
    let raw_name = read_bytes(reader, cde.path_length.into())?;
    let name = decode_text(&raw_name, is_utf8(cde.flags), charset);

    let extra_data_records = read_extra_field(reader, cde.extra_field_length)?;

    let comment = if cde.file_comment_length > 0 {
        let raw_comment = read_bytes(reader, cde.file_comment_length.into())?;
        Some(decode_text(&raw_comment, is_utf8(cde.flags), charset))
    } else {
        None
    };

    FileHeader::from_cde(&cde, index, name, extra_data_records, comment)
}

/// Reads (and splits up) an entry's extra field.
///
/// Fields too short to hold a record are skipped,
/// and a field cut short by the end of the archive is parsed as far as it goes.
fn read_extra_field<R: RandomAccess + ?Sized>(
    reader: &mut R,
    length: u16,
) -> ZipResult<Vec<ExtraDataRecord>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    if length < 4 {
        reader.skip_bytes(length.into())?;
        return Ok(Vec::new());
    }
    let mut extra_field = vec![0u8; length as usize];
    let read = reader.read(&mut extra_field)?;
    Ok(parse_extra_field(&extra_field[..read]))
}
