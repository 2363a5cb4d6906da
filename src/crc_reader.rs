//! Checks a stored entry's CRC-32 as its bytes stream past.

use std::io;
use std::io::prelude::*;

use crc32fast::Hasher;
use log::*;

/// Reader that validates the CRC-32 of everything read through it
/// once the inner reader runs dry.
pub(crate) struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    expected: u32,
    /// What we're checking, for error messages
    name: String,
    verified: bool,
}

impl<R> Crc32Reader<R> {
    pub fn new(inner: R, expected: u32, name: &str) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            expected,
            name: name.to_owned(),
            verified: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    fn verify(&mut self) -> io::Result<()> {
        let actual = self.hasher.clone().finalize();
        if actual != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "CRC-32 mismatch for {}: expected {:08x}, got {:08x}",
                    self.name, self.expected, actual
                ),
            ));
        }
        trace!("CRC-32 of {} checks out ({:08x})", self.name, actual);
        self.verified = true;
        Ok(())
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        if count == 0 && !buf.is_empty() && !self.verified {
            self.verify()?;
        }
        self.hasher.update(&buf[..count]);
        Ok(count)
    }
}
