//! Builds ZIP archives byte by byte, so tests can make them as odd as they like.

#![allow(dead_code)]

pub const UNIX_FILE: u32 = 0o100644 << 16;
pub const UNIX_DIRECTORY: u32 = 0o040755 << 16;
pub const UTF8_NAME: u16 = 1 << 11;

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: Vec<u8>,
    pub contents: Vec<u8>,
    pub flags: u16,
    pub compression_method: u16,
    pub external_attributes: u32,
    /// Extra field bytes for the central directory entry
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
    /// Store 0xFFFFFFFF sizes and offset, with a Zip64 extra field holding the real ones.
    pub zip64_placeholders: bool,
}

impl Entry {
    pub fn file(name: &str, contents: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            contents: contents.to_vec(),
            flags: UTF8_NAME,
            compression_method: 0,
            external_attributes: UNIX_FILE,
            extra: Vec::new(),
            comment: Vec::new(),
            zip64_placeholders: false,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            external_attributes: UNIX_DIRECTORY,
            ..Self::file(name, b"")
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    pub entries: Vec<Entry>,
    pub comment: Vec<u8>,
    pub zip64: bool,
    pub zip64_extensible_data: Vec<u8>,
    pub digital_signature: Option<Vec<u8>>,
    /// Bytes in front of the first local file header
    pub preamble: Vec<u8>,
}

/// Where things ended up in a built archive
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub local_headers: Vec<u64>,
    pub central_directory: u64,
    pub zip64_eocdr: Option<u64>,
    pub eocdr: u64,
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        let mut out = self.preamble.clone();
        let mut layout = Layout::default();

        for entry in &self.entries {
            layout.local_headers.push(out.len() as u64);
            out.extend_from_slice(b"PK\x03\x04");
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.compression_method);
            put_u16(&mut out, 0); // time
            put_u16(&mut out, 0x21); // 1980-01-01
            put_u32(&mut out, crc32fast::hash(&entry.contents));
            put_u32(&mut out, entry.contents.len() as u32);
            put_u32(&mut out, entry.contents.len() as u32);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.contents);
        }

        layout.central_directory = out.len() as u64;
        for (entry, &offset) in self.entries.iter().zip(&layout.local_headers) {
            let size = entry.contents.len() as u64;
            let mut extra = Vec::new();
            if entry.zip64_placeholders {
                put_u16(&mut extra, 0x0001);
                put_u16(&mut extra, 24);
                put_u64(&mut extra, size);
                put_u64(&mut extra, size);
                put_u64(&mut extra, offset);
            }
            extra.extend_from_slice(&entry.extra);
            let (size32, offset32) = if entry.zip64_placeholders {
                (u32::MAX, u32::MAX)
            } else {
                (size as u32, offset as u32)
            };

            out.extend_from_slice(b"PK\x01\x02");
            put_u16(&mut out, (3 << 8) | 45);
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.compression_method);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0x21);
            put_u32(&mut out, crc32fast::hash(&entry.contents));
            put_u32(&mut out, size32);
            put_u32(&mut out, size32);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, extra.len() as u16);
            put_u16(&mut out, entry.comment.len() as u16);
            put_u16(&mut out, 0); // disk
            put_u16(&mut out, 0); // internal attributes
            put_u32(&mut out, entry.external_attributes);
            put_u32(&mut out, offset32);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&extra);
            out.extend_from_slice(&entry.comment);
        }

        if let Some(signature) = &self.digital_signature {
            out.extend_from_slice(b"PK\x05\x05");
            put_u16(&mut out, signature.len() as u16);
            out.extend_from_slice(signature);
        }
        let central_directory_size = out.len() as u64 - layout.central_directory;
        let entries = self.entries.len() as u64;

        if self.zip64 {
            let zip64_eocdr = out.len() as u64;
            layout.zip64_eocdr = Some(zip64_eocdr);
            out.extend_from_slice(b"PK\x06\x06");
            put_u64(&mut out, 44 + self.zip64_extensible_data.len() as u64);
            put_u16(&mut out, (3 << 8) | 45);
            put_u16(&mut out, 45);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u64(&mut out, entries);
            put_u64(&mut out, entries);
            put_u64(&mut out, central_directory_size);
            put_u64(&mut out, layout.central_directory);
            out.extend_from_slice(&self.zip64_extensible_data);

            out.extend_from_slice(b"PK\x06\x07");
            put_u32(&mut out, 0);
            put_u64(&mut out, zip64_eocdr);
            put_u32(&mut out, 1);
        }

        layout.eocdr = out.len() as u64;
        out.extend_from_slice(b"PK\x05\x06");
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        if self.zip64 {
            put_u16(&mut out, u16::MAX);
            put_u16(&mut out, u16::MAX);
            put_u32(&mut out, u32::MAX);
            put_u32(&mut out, u32::MAX);
        } else {
            put_u16(&mut out, entries as u16);
            put_u16(&mut out, entries as u16);
            put_u32(&mut out, central_directory_size as u32);
            put_u32(&mut out, layout.central_directory as u32);
        }
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        (out, layout)
    }
}
